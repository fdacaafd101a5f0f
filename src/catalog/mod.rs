//! # Catalog tables
//!
//! CSV input and output of the pipelines.
//!
//! ## Inputs
//! -----------------
//! * **Observation table**: one row per measurement, columns `id`, `hjd` (or `time`), `mag`
//!   (or `magnitude`) and `err` (or `error`). Rows are grouped per star into a
//!   [`LightCurveSet`]; the row order within a star is preserved.
//! * **Feature table**: one row per star with at least `id` and `period_catalog` (or
//!   `PeriodLS`), optionally `period_fit` (or `Period_fit`) and `min_obs`. Every other column is
//!   carried through untouched: the table is kept as raw string records so that new columns can
//!   be appended before writing it back.
//!
//! ## Outputs
//! -----------------
//! Any `Serialize` row type can be written with [`write_rows`]; the crate uses it for the
//! augmented table ([`ExportRow`](crate::observations::ExportRow)), the period trace and the
//! reconstruction table.
//!
//! Every reader and writer works on a generic [`Read`]/[`Write`]; the `*_path` variants open the
//! file from a [`Utf8Path`].
use std::{
    fs::File,
    io::{Read, Write},
};

use ahash::RandomState;
use camino::Utf8Path;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{Hjd, LightCurveSet, Magnitude, Period, StarId},
    lcaugment_errors::LcAugmentError,
    observations::Observation,
};

const ID_COLUMNS: &[&str] = &["id"];
const TIME_COLUMNS: &[&str] = &["hjd", "time"];
const MAG_COLUMNS: &[&str] = &["mag", "magnitude"];
const ERR_COLUMNS: &[&str] = &["err", "error"];
const PERIOD_COLUMNS: &[&str] = &["period_catalog", "PeriodLS"];
const PERIOD_FIT_COLUMNS: &[&str] = &["period_fit", "Period_fit"];

/// Name of the column appended by the minimum-observation search.
pub const MIN_OBS_COLUMN: &str = "min_obs";

#[derive(Debug, Deserialize)]
struct ObservationRecord {
    id: StarId,
    #[serde(alias = "time")]
    hjd: Hjd,
    #[serde(alias = "magnitude")]
    mag: Magnitude,
    #[serde(alias = "error")]
    err: Magnitude,
}

/// Index of the first header matching one of `names`.
fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|name| headers.iter().position(|h| h.trim() == *name))
}

fn require_column(headers: &StringRecord, names: &[&str]) -> Result<usize, LcAugmentError> {
    find_column(headers, names).ok_or_else(|| LcAugmentError::MissingColumn(names.join("|")))
}

/// Read an observation table and group it per star.
pub fn read_light_curves<R: Read>(reader: R) -> Result<LightCurveSet, LcAugmentError> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    for names in [ID_COLUMNS, TIME_COLUMNS, MAG_COLUMNS, ERR_COLUMNS] {
        require_column(&headers, names)?;
    }

    let mut set = LightCurveSet::with_hasher(RandomState::default());
    for record in rdr.deserialize::<ObservationRecord>() {
        let record = record?;
        set.entry(record.id)
            .or_default()
            .push(Observation::new(record.hjd, record.mag, record.err));
    }
    Ok(set)
}

pub fn read_light_curves_path(path: &Utf8Path) -> Result<LightCurveSet, LcAugmentError> {
    let set = read_light_curves(File::open(path)?)?;
    info!("Loaded {} light curves from {path}", set.len());
    Ok(set)
}

/// Catalog attributes of one star, as read from the feature table.
#[derive(Debug, Clone, PartialEq)]
pub struct StarFeatures {
    pub id: StarId,
    pub period_catalog: Period,
    pub period_fit: Option<f64>,
    pub min_obs: Option<usize>,
}

/// Feature table kept as raw records.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    headers: StringRecord,
    records: Vec<StringRecord>,
    id_col: usize,
    period_col: usize,
    period_fit_col: Option<usize>,
}

impl FeatureTable {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LcAugmentError> {
        let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let id_col = require_column(&headers, ID_COLUMNS)?;
        let period_col = require_column(&headers, PERIOD_COLUMNS)?;
        let period_fit_col = find_column(&headers, PERIOD_FIT_COLUMNS);
        let records = rdr.records().collect::<Result<Vec<_>, _>>()?;

        Ok(FeatureTable {
            headers,
            records,
            id_col,
            period_col,
            period_fit_col,
        })
    }

    pub fn from_path(path: &Utf8Path) -> Result<Self, LcAugmentError> {
        let table = Self::from_reader(File::open(path)?)?;
        info!("Loaded {} feature rows from {path}", table.len());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn has_column(&self, name: &str) -> bool {
        find_column(&self.headers, &[name]).is_some()
    }

    /// Parse the identifier and period columns of every row.
    ///
    /// An empty `period_fit` or `min_obs` cell reads as `None`.
    pub fn stars(&self) -> Result<Vec<StarFeatures>, LcAugmentError> {
        let min_obs_col = find_column(&self.headers, &[MIN_OBS_COLUMN]);
        self.records
            .iter()
            .enumerate()
            .map(|(row, record)| {
                let cell = |col: usize| record.get(col).unwrap_or("").trim();
                let invalid = |col: usize| {
                    LcAugmentError::InvalidParameter(format!(
                        "row {}: cannot parse {} value '{}'",
                        row + 1,
                        self.headers.get(col).unwrap_or("?"),
                        cell(col)
                    ))
                };

                let id: StarId = cell(self.id_col)
                    .parse()
                    .map_err(|_| invalid(self.id_col))?;
                let period_catalog = cell(self.period_col)
                    .parse::<f64>()
                    .map_err(|_| invalid(self.period_col))?;
                let period_fit = match self.period_fit_col {
                    Some(col) if !cell(col).is_empty() => {
                        Some(cell(col).parse::<f64>().map_err(|_| invalid(col))?)
                    }
                    _ => None,
                };
                let min_obs = match min_obs_col {
                    Some(col) if !cell(col).is_empty() => {
                        Some(cell(col).parse::<usize>().map_err(|_| invalid(col))?)
                    }
                    _ => None,
                };

                Ok(StarFeatures {
                    id,
                    period_catalog,
                    period_fit,
                    min_obs,
                })
            })
            .collect()
    }

    /// Append (or overwrite) a column; `value` is called with each row's star id.
    ///
    /// Rows whose id cannot be parsed, or for which `value` returns `None`, get an empty cell.
    pub fn set_column<F>(&mut self, name: &str, mut value: F)
    where
        F: FnMut(&StarId) -> Option<String>,
    {
        let existing = find_column(&self.headers, &[name]);
        if existing.is_none() {
            self.headers.push_field(name);
        }

        let id_col = self.id_col;
        for record in self.records.iter_mut() {
            let cell = record
                .get(id_col)
                .and_then(|id| id.trim().parse::<StarId>().ok())
                .and_then(|id| value(&id))
                .unwrap_or_default();

            match existing {
                None => record.push_field(&cell),
                Some(col) => {
                    let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
                    if col < fields.len() {
                        fields[col] = cell;
                    } else {
                        fields.resize(col, String::new());
                        fields.push(cell);
                    }
                    *record = StringRecord::from(fields);
                }
            }
        }
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), LcAugmentError> {
        let mut wtr = WriterBuilder::new().flexible(true).from_writer(writer);
        wtr.write_record(&self.headers)?;
        for record in &self.records {
            wtr.write_record(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_path(&self, path: &Utf8Path) -> Result<(), LcAugmentError> {
        self.to_writer(File::create(path)?)?;
        info!("Wrote {} feature rows to {path}", self.len());
        Ok(())
    }
}

/// Write serializable rows as CSV, header first.
pub fn write_rows<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<(), LcAugmentError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_rows_path<T: Serialize>(path: &Utf8Path, rows: &[T]) -> Result<(), LcAugmentError> {
    write_rows(File::create(path)?, rows)?;
    info!("Wrote {} rows to {path}", rows.len());
    Ok(())
}

//! # Photometric observations
//!
//! An [`Observation`] is one brightness measurement of one star: a time, a magnitude and the
//! magnitude uncertainty. Synthetic points produced by augmentation carry a `synthetic` tag that
//! travels with the point through every append, filter and subsample.
//!
//! This module also provides the flat export row ([`ExportRow`]) and the column helpers used when
//! observations are handed to a [`PeriodEstimator`](crate::period::PeriodEstimator).
use itertools::{izip, Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{Hjd, Magnitude, StarId},
    lcaugment_errors::LcAugmentError,
};

/// A single measurement of a light curve.
///
/// # Fields
///
/// * `time` - Heliocentric Julian Date of the measurement
/// * `mag` - Apparent magnitude
/// * `err` - Magnitude uncertainty (must be positive for SNR filtering)
/// * `synthetic` - `true` if the point was generated by a regression model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub time: Hjd,
    pub mag: Magnitude,
    pub err: Magnitude,
    pub synthetic: bool,
}

impl Observation {
    /// Create a new real (non-synthetic) observation.
    pub fn new(time: Hjd, mag: Magnitude, err: Magnitude) -> Self {
        Observation {
            time,
            mag,
            err,
            synthetic: false,
        }
    }

    /// Create a synthetic observation.
    pub fn synthetic(time: Hjd, mag: Magnitude, err: Magnitude) -> Self {
        Observation {
            time,
            mag,
            err,
            synthetic: true,
        }
    }

    /// Signal-to-noise ratio, defined as the reciprocal of the magnitude uncertainty.
    #[inline]
    pub fn snr(&self) -> f64 {
        1.0 / self.err
    }
}

/// Build an observation set from three parallel columns.
///
/// Arguments
/// -----------------
/// * `time`, `mag`, `err`: columns of equal length.
///
/// Return
/// ----------
/// * The observations in column order, or [`LcAugmentError::MismatchedColumns`] if the
///   lengths differ.
pub fn observations_from_columns(
    time: &[Hjd],
    mag: &[Magnitude],
    err: &[Magnitude],
) -> Result<Vec<Observation>, LcAugmentError> {
    if time.len() != mag.len() || time.len() != err.len() {
        return Err(LcAugmentError::MismatchedColumns {
            time: time.len(),
            mag: mag.len(),
            err: err.len(),
        });
    }

    Ok(izip!(time, mag, err)
        .map(|(&t, &m, &e)| Observation::new(t, m, e))
        .collect())
}

/// Column view of an observation set, as consumed by period estimators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns {
    pub time: Vec<Hjd>,
    pub mag: Vec<Magnitude>,
    pub err: Vec<Magnitude>,
}

impl Columns {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

impl FromIterator<Observation> for Columns {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        let mut cols = Columns::default();
        for obs in iter {
            cols.time.push(obs.time);
            cols.mag.push(obs.mag);
            cols.err.push(obs.err);
        }
        cols
    }
}

/// Split observations into `(time, mag, err)` columns.
pub fn to_columns(observations: &[Observation]) -> Columns {
    observations.iter().copied().collect()
}

/// Time span `(min, max)` of an observation set, `None` if empty.
pub fn time_range(observations: &[Observation]) -> Option<(Hjd, Hjd)> {
    match observations
        .iter()
        .map(|obs| obs.time)
        .minmax_by(|a, b| a.total_cmp(b))
    {
        MinMaxResult::NoElements => None,
        MinMaxResult::OneElement(t) => Some((t, t)),
        MinMaxResult::MinMax(lo, hi) => Some((lo, hi)),
    }
}

/// Keep only the observations with `1/err >= threshold`.
///
/// Return
/// ----------
/// * The number of removed observations.
pub fn retain_snr(observations: &mut Vec<Observation>, threshold: f64) -> usize {
    let before = observations.len();
    observations.retain(|obs| obs.snr() >= threshold);
    before - observations.len()
}

/// One row of the exported (augmented) observation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub id: StarId,
    pub hjd: Hjd,
    pub mag: Magnitude,
    pub err: Magnitude,
    pub synthetic: bool,
}

impl ExportRow {
    pub fn new(id: &StarId, obs: &Observation) -> Self {
        ExportRow {
            id: id.clone(),
            hjd: obs.time,
            mag: obs.mag,
            err: obs.err,
            synthetic: obs.synthetic,
        }
    }
}

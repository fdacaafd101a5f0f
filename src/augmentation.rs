//! # Augmentation engine
//!
//! Drives the synthetic-point generation of a [`PeriodicLightCurve`] for a fixed number of
//! rounds. Each round retrains the model and appends `points_per_round` synthetic observations.
//!
//! With period tracking enabled, the period is re-estimated after every round and a
//! [`PeriodTrace`] row is recorded, so the drift of the estimated period can be followed as the
//! synthetic fraction grows. A [`LcAugmentError::DegenerateEstimate`] ends the loop for that star
//! without failing it; any other error is returned to the caller.
//!
//! ```rust,no_run
//! use lcaugment::augmentation::{AugmentParams, AugmentationEngine};
//! use lcaugment::constants::StarId;
//! use lcaugment::light_curve::PeriodicLightCurve;
//! use lcaugment::period::lomb_scargle::LombScargle;
//! # fn main() -> Result<(), lcaugment::lcaugment_errors::LcAugmentError> {
//! # let observations = vec![];
//! let mut lc = PeriodicLightCurve::new(StarId::Int(42), observations, 0.57)?;
//! let params = AugmentParams::builder().rounds(5).points_per_round(2).build()?;
//! let engine = AugmentationEngine::new(params, LombScargle::default());
//! let outcome = engine.augment(&mut lc, None)?;
//! println!("{} rows", outcome.table.len());
//! # Ok(())
//! # }
//! ```
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{Period, StarId},
    lcaugment_errors::LcAugmentError,
    light_curve::PeriodicLightCurve,
    observations::ExportRow,
    period::PeriodEstimator,
    regression::RegressionModel,
};

/// Configuration of an augmentation run.
///
/// Defaults
/// -----------------
/// * `rounds`: 5
/// * `points_per_round`: 2
/// * `track_period`: false
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentParams {
    pub rounds: usize,
    pub points_per_round: usize,
    pub track_period: bool,
}

impl Default for AugmentParams {
    fn default() -> Self {
        AugmentParams {
            rounds: 5,
            points_per_round: 2,
            track_period: false,
        }
    }
}

impl AugmentParams {
    pub fn builder() -> AugmentParamsBuilder {
        AugmentParamsBuilder::default()
    }

    /// Total number of synthetic points a full run appends.
    pub fn total_synthetic(&self) -> usize {
        self.rounds * self.points_per_round
    }
}

#[derive(Debug, Clone, Default)]
pub struct AugmentParamsBuilder {
    params: AugmentParams,
}

impl AugmentParamsBuilder {
    pub fn rounds(mut self, v: usize) -> Self {
        self.params.rounds = v;
        self
    }
    pub fn points_per_round(mut self, v: usize) -> Self {
        self.params.points_per_round = v;
        self
    }
    pub fn track_period(mut self, v: bool) -> Self {
        self.params.track_period = v;
        self
    }

    /// `points_per_round` must be at least one.
    pub fn build(self) -> Result<AugmentParams, LcAugmentError> {
        if self.params.points_per_round == 0 {
            return Err(LcAugmentError::InvalidParameter(
                "points_per_round must be >= 1".into(),
            ));
        }
        Ok(self.params)
    }
}

/// One row of the period trace.
///
/// The first row of a run describes the light curve before augmentation (catalog period and,
/// when known, the catalog fit quality); each subsequent row follows one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTrace {
    pub id: StarId,
    pub n_obs: usize,
    pub n_synth: usize,
    pub period: Period,
    pub period_fit: Option<f64>,
}

/// Result of augmenting one star.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentationOutcome {
    pub table: Vec<ExportRow>,
    pub trace: Vec<PeriodTrace>,
    pub rounds_completed: usize,
    pub stopped_early: bool,
}

#[derive(Debug, Clone)]
pub struct AugmentationEngine<E> {
    params: AugmentParams,
    estimator: E,
}

impl<E: PeriodEstimator> AugmentationEngine<E> {
    pub fn new(params: AugmentParams, estimator: E) -> Self {
        AugmentationEngine { params, estimator }
    }

    pub fn params(&self) -> &AugmentParams {
        &self.params
    }

    /// Run every round on one light curve.
    ///
    /// Arguments
    /// -----------------
    /// * `lc`: The light curve to augment, modified in place.
    /// * `catalog_fit`: Fit quality of the catalog period, written in the first trace row.
    ///
    /// Return
    /// ----------
    /// * The exported table of the augmented curve together with the period trace.
    pub fn augment<M: RegressionModel>(
        &self,
        lc: &mut PeriodicLightCurve<M>,
        catalog_fit: Option<f64>,
    ) -> Result<AugmentationOutcome, LcAugmentError> {
        let mut trace = Vec::new();
        if self.params.track_period {
            trace.push(PeriodTrace {
                id: lc.id().clone(),
                n_obs: lc.len(),
                n_synth: lc.n_synthetic(),
                period: lc.period(),
                period_fit: catalog_fit,
            });
        }

        let mut rounds_completed = 0;
        let mut stopped_early = false;
        for round in 0..self.params.rounds {
            lc.add_synthetic(self.params.points_per_round)?;
            rounds_completed += 1;

            if !self.params.track_period {
                continue;
            }
            match lc.reestimate_period(&self.estimator) {
                Ok(estimate) => trace.push(PeriodTrace {
                    id: lc.id().clone(),
                    n_obs: lc.len(),
                    n_synth: lc.n_synthetic(),
                    period: estimate.period,
                    period_fit: Some(estimate.fit_quality),
                }),
                Err(e) if e.is_degenerate_estimate() => {
                    debug!("{}: stopping after round {}: {e}", lc.id(), round + 1);
                    stopped_early = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(AugmentationOutcome {
            table: lc.export_table(),
            trace,
            rounds_completed,
            stopped_early,
        })
    }
}

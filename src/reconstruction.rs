//! # Period reconstruction from augmented subsamples
//!
//! Checks whether synthetic observations can restore a period that subsampling has destroyed.
//! A light curve is cut down to a few points below its minimum observation count, then grown
//! back with synthetic points drawn with the catalog period, and the period is finally
//! re-estimated from the mixed set.
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{Period, StarId, PERIOD_REL_TOL},
    lcaugment_errors::LcAugmentError,
    light_curve::PeriodicLightCurve,
    period::PeriodEstimator,
    phase::periods_match,
    regression::RegressionModel,
};

/// Light curves with at most this many points are not reconstructed.
pub const MIN_RECONSTRUCTION_POINTS: usize = 5;

/// Configuration of the reconstruction experiment.
///
/// Defaults
/// -----------------
/// * `iterations`: 20
/// * `synthetic_per_iteration`: 1
/// * `rel_tol`: 1e-5
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconstructionParams {
    pub iterations: usize,
    pub synthetic_per_iteration: usize,
    pub rel_tol: f64,
}

impl Default for ReconstructionParams {
    fn default() -> Self {
        ReconstructionParams {
            iterations: 20,
            synthetic_per_iteration: 1,
            rel_tol: PERIOD_REL_TOL,
        }
    }
}

impl ReconstructionParams {
    pub fn builder() -> ReconstructionParamsBuilder {
        ReconstructionParamsBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconstructionParamsBuilder {
    params: ReconstructionParams,
}

impl ReconstructionParamsBuilder {
    pub fn iterations(mut self, v: usize) -> Self {
        self.params.iterations = v;
        self
    }
    pub fn synthetic_per_iteration(mut self, v: usize) -> Self {
        self.params.synthetic_per_iteration = v;
        self
    }
    pub fn rel_tol(mut self, v: f64) -> Self {
        self.params.rel_tol = v;
        self
    }

    pub fn build(self) -> Result<ReconstructionParams, LcAugmentError> {
        let p = &self.params;
        if p.synthetic_per_iteration == 0 {
            return Err(LcAugmentError::InvalidParameter(
                "synthetic_per_iteration must be >= 1".into(),
            ));
        }
        if !(p.rel_tol.is_finite() && p.rel_tol >= 0.0) {
            return Err(LcAugmentError::InvalidParameter(
                "rel_tol must be finite and >= 0".into(),
            ));
        }
        Ok(self.params)
    }
}

/// One row of the reconstruction table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionOutcome {
    pub id: StarId,
    pub period_catalog: Period,
    pub period: Period,
    pub period_fit: f64,
    pub recovered: bool,
}

/// Subsample a light curve, augment it back and re-estimate its period.
///
/// Arguments
/// -----------------
/// * `lc`: Light curve to process, modified in place.
/// * `min_obs`: Minimum observation count previously found for the star.
/// * `estimator`: Period estimator used for the final estimate.
/// * `params`: Iteration count, synthetic points per iteration and tolerance.
///
/// Return
/// ----------
/// * `Ok(None)` when the light curve has too few points to be reconstructed,
///   otherwise the final estimate and whether it matches the catalog period.
///
/// See also
/// ------------
/// * [`min_observations`](crate::min_observations::min_observations) – produces `min_obs`.
pub fn reconstruct_period<M, E>(
    lc: &mut PeriodicLightCurve<M>,
    min_obs: usize,
    estimator: &E,
    params: &ReconstructionParams,
) -> Result<Option<ReconstructionOutcome>, LcAugmentError>
where
    M: RegressionModel,
    E: PeriodEstimator + ?Sized,
{
    if lc.len() <= MIN_RECONSTRUCTION_POINTS {
        debug!("{}: {} points, not reconstructed", lc.id(), lc.len());
        return Ok(None);
    }

    let target = min_obs
        .saturating_sub(MIN_RECONSTRUCTION_POINTS)
        .max(MIN_RECONSTRUCTION_POINTS);
    lc.subsample(target);

    for _ in 0..params.iterations {
        lc.reset_period();
        lc.add_synthetic(params.synthetic_per_iteration)?;
    }

    let estimate = lc.reestimate_period(estimator)?;
    let recovered = periods_match(estimate.period, lc.period_catalog(), params.rel_tol);
    Ok(Some(ReconstructionOutcome {
        id: lc.id().clone(),
        period_catalog: lc.period_catalog(),
        period: estimate.period,
        period_fit: estimate.fit_quality,
        recovered,
    }))
}

#[cfg(test)]
mod reconstruction_tests {
    use super::*;
    use crate::{
        constants::{Magnitude, Phase},
        observations::Observation,
        period::PeriodEstimate,
        regression::Prediction,
    };

    #[derive(Debug, Default)]
    struct FlatModel;

    impl RegressionModel for FlatModel {
        fn fit(&mut self, _: &[Phase], _: &[Magnitude], _: &[Magnitude]) -> Result<(), LcAugmentError> {
            Ok(())
        }

        fn predict(&self, phase: &[Phase], _: bool) -> Result<Prediction, LcAugmentError> {
            Ok(Prediction {
                mean: vec![0.0; phase.len()],
                std: Some(vec![0.05; phase.len()]),
            })
        }
    }

    fn light_curve(n: usize) -> PeriodicLightCurve<FlatModel> {
        let obs = (0..n)
            .map(|i| Observation::new(i as f64 * 1.3, 16.0 + 0.2 * (i % 2) as f64, 0.04))
            .collect();
        PeriodicLightCurve::with_model(StarId::Int(5), obs, 0.8, FlatModel, 999).unwrap()
    }

    fn returns(period: f64) -> impl Fn(&[f64], &[f64], &[f64]) -> Result<PeriodEstimate, LcAugmentError> + Sync {
        move |_: &[f64], _: &[f64], _: &[f64]| {
            Ok(PeriodEstimate {
                period,
                fit_quality: 0.01,
            })
        }
    }

    #[test]
    fn test_reconstruction_counts() {
        let mut lc = light_curve(40);
        let out = reconstruct_period(&mut lc, 25, &returns(0.8), &ReconstructionParams::default())
            .unwrap()
            .unwrap();
        assert!(out.recovered);
        assert_eq!(lc.len(), 20 + 20);
        assert_eq!(lc.n_synthetic(), 20);
        assert_eq!(lc.discarded().len(), 20);
        assert_eq!(out.period_catalog, 0.8);
    }

    #[test]
    fn test_subsample_floor() {
        let mut lc = light_curve(12);
        let params = ReconstructionParams::builder().iterations(2).build().unwrap();
        let out = reconstruct_period(&mut lc, 3, &returns(0.41), &params)
            .unwrap()
            .unwrap();
        assert!(!out.recovered);
        assert_eq!(lc.len(), 5 + 2);
    }

    #[test]
    fn test_too_small_is_skipped() {
        let mut lc = light_curve(5);
        let out = reconstruct_period(&mut lc, 5, &returns(0.8), &ReconstructionParams::default())
            .unwrap();
        assert!(out.is_none());
        assert_eq!(lc.len(), 5);
    }
}

//! # Periodic light curve
//!
//! [`PeriodicLightCurve`] holds one star's observation set together with two representations of
//! it:
//!
//! * the **time domain** (`time`, `mag`, `err`), the canonical storage,
//! * the **phase domain**, a folded view derived from the time domain and the live period.
//!
//! The folded view (`t_ref`, per-point phases and the background level) is cached and guarded
//! by an explicit dirty flag. Every mutation of the period or of the observation set raises the
//! flag; every read of the view goes through [`PeriodicLightCurve::folded`], which refolds when
//! needed.
//!
//! ## Augmentation
//! -----------------
//! [`train`](PeriodicLightCurve::train) fits the owned [`RegressionModel`] on the folded curve,
//! duplicated over `[0, 2)` so the model sees both sides of the fold boundary, with the
//! background level subtracted from the magnitudes. A snapshot of the fold parameters used for
//! training is kept; [`add_synthetic_observation`](PeriodicLightCurve::add_synthetic_observation)
//! draws a time uniformly over the observed span, folds it with that snapshot and appends the
//! model prediction as a synthetic point.
//!
//! ## Randomness
//! -----------------
//! Each light curve owns a [`StdRng`] seeded at construction; it is the only randomness source
//! used for time draws and subsampling, so two curves built with the same seed and inputs evolve
//! identically.
use log::trace;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use rand_distr::Uniform;

use crate::{
    constants::{Hjd, Magnitude, Period, Phase, StarId, DEFAULT_SEED},
    lcaugment_errors::LcAugmentError,
    observations::{observations_from_columns, retain_snr, time_range, to_columns, ExportRow, Observation},
    period::{PeriodEstimate, PeriodEstimator},
    phase::{biweight_location, double_phase, fold_phase, interior_phase, mean_std, reference_epoch},
    regression::{gaussian_process::GaussianProcess, RegressionModel},
};

/// Folded view of a light curve, valid for one period and one observation set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoldView {
    t_ref: Hjd,
    phase: Vec<Phase>,
    background_level: Magnitude,
}

impl FoldView {
    /// Epoch of phase zero, the time of the minimum-magnitude point.
    pub fn t_ref(&self) -> Hjd {
        self.t_ref
    }

    /// Phase of each observation, in observation order.
    pub fn phase(&self) -> &[Phase] {
        &self.phase
    }

    pub fn background_level(&self) -> Magnitude {
        self.background_level
    }
}

/// Fold parameters in effect when the model was last trained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSnapshot {
    pub t_ref: Hjd,
    pub period: Period,
    pub background_level: Magnitude,
}

#[derive(Debug)]
pub struct PeriodicLightCurve<M: RegressionModel = GaussianProcess> {
    id: StarId,
    period_catalog: Period,
    period: Period,
    observations: Vec<Observation>,
    discarded: Vec<Observation>,
    view: FoldView,
    dirty: bool,
    model: M,
    snapshot: Option<TrainingSnapshot>,
    rng: StdRng,
}

fn check_period(period: Period) -> Result<Period, LcAugmentError> {
    if period.is_finite() && period > 0.0 {
        Ok(period)
    } else {
        Err(LcAugmentError::InvalidPeriod(period))
    }
}

impl PeriodicLightCurve<GaussianProcess> {
    /// Build a light curve with the default Gaussian-process model and seed.
    pub fn new(
        id: StarId,
        observations: Vec<Observation>,
        period_catalog: Period,
    ) -> Result<Self, LcAugmentError> {
        Self::with_model(
            id,
            observations,
            period_catalog,
            GaussianProcess::default(),
            DEFAULT_SEED,
        )
    }

    /// Build a light curve from three parallel columns, with the default model and seed.
    pub fn from_columns(
        id: StarId,
        time: &[Hjd],
        mag: &[Magnitude],
        err: &[Magnitude],
        period_catalog: Period,
    ) -> Result<Self, LcAugmentError> {
        Self::new(id, observations_from_columns(time, mag, err)?, period_catalog)
    }
}

impl<M: RegressionModel> PeriodicLightCurve<M> {
    /// Build a light curve around an explicit regression model.
    ///
    /// Arguments
    /// -----------------
    /// * `id`: Star identifier, carried into exported rows.
    /// * `observations`: The real observations of the star.
    /// * `period_catalog`: Reference period; also the initial live period.
    /// * `model`: Regression back-end, exclusively owned by the light curve.
    /// * `seed`: Seed of the owned random generator.
    ///
    /// Return
    /// ----------
    /// * A light curve folded with `period_catalog`, or
    ///   [`LcAugmentError::EmptyObservationSet`] / [`LcAugmentError::InvalidPeriod`].
    pub fn with_model(
        id: StarId,
        observations: Vec<Observation>,
        period_catalog: Period,
        model: M,
        seed: u64,
    ) -> Result<Self, LcAugmentError> {
        let period = check_period(period_catalog)?;
        if observations.is_empty() {
            return Err(LcAugmentError::EmptyObservationSet);
        }

        let mut lc = PeriodicLightCurve {
            id,
            period_catalog: period,
            period,
            observations,
            discarded: Vec::new(),
            view: FoldView::default(),
            dirty: true,
            model,
            snapshot: None,
            rng: StdRng::seed_from_u64(seed),
        };
        lc.fold()?;
        Ok(lc)
    }

    /// Recompute the folded view from the current observations and period.
    ///
    /// The view is always rebuilt, dirty or not; the background level is refreshed with it.
    pub fn fold(&mut self) -> Result<(), LcAugmentError> {
        let t_ref =
            reference_epoch(&self.observations).ok_or(LcAugmentError::EmptyObservationSet)?;
        let phase = self
            .observations
            .iter()
            .map(|obs| fold_phase(obs.time, t_ref, self.period))
            .collect();
        let mags: Vec<Magnitude> = self.observations.iter().map(|obs| obs.mag).collect();
        let background_level =
            biweight_location(&mags).ok_or(LcAugmentError::EmptyObservationSet)?;

        self.view = FoldView {
            t_ref,
            phase,
            background_level,
        };
        self.dirty = false;
        Ok(())
    }

    /// The folded view, refolded first if the cache is stale.
    pub fn folded(&mut self) -> Result<&FoldView, LcAugmentError> {
        if self.dirty {
            self.fold()?;
        }
        Ok(&self.view)
    }

    /// Phases of the current observations, refolded if needed.
    pub fn phases(&mut self) -> Result<&[Phase], LcAugmentError> {
        Ok(self.folded()?.phase())
    }

    /// Fit the owned model on the doubled, background-subtracted folded curve.
    pub fn train(&mut self) -> Result<(), LcAugmentError> {
        if self.dirty {
            self.fold()?;
        }
        let background = self.view.background_level;
        let residual: Vec<Magnitude> = self
            .observations
            .iter()
            .map(|obs| obs.mag - background)
            .collect();
        let err: Vec<Magnitude> = self.observations.iter().map(|obs| obs.err).collect();
        let (x, y, e) = double_phase(&self.view.phase, &residual, &err);

        self.snapshot = None;
        self.model.fit(&x, &y, &e)?;
        self.snapshot = Some(TrainingSnapshot {
            t_ref: self.view.t_ref,
            period: self.period,
            background_level: background,
        });
        Ok(())
    }

    /// Draw one synthetic observation from the trained model and append it.
    ///
    /// The time is uniform over `[min(t), max(t)]` of the current set. The model is queried at
    /// [`interior_phase`] of the folded phase `p`, i.e. at `p + 1` when `p < 0.5`: the training
    /// set covers `[0, 2)`, and that copy of the phase sits away from both edges, where the
    /// prediction carries no boundary effect. Both copies map to the same point of the cycle.
    ///
    /// Return
    /// ----------
    /// * The appended observation, or [`LcAugmentError::ModelNotFitted`] without a prior
    ///   [`train`](Self::train).
    pub fn add_synthetic_observation(&mut self) -> Result<Observation, LcAugmentError> {
        let snapshot = self.snapshot.ok_or(LcAugmentError::ModelNotFitted)?;
        let (lo, hi) =
            time_range(&self.observations).ok_or(LcAugmentError::EmptyObservationSet)?;
        let dist = Uniform::new_inclusive(lo, hi)
            .map_err(|e| LcAugmentError::InvalidSamplingRange(format!("[{lo}, {hi}]: {e}")))?;
        let time = self.rng.sample(dist);

        let phase = fold_phase(time, snapshot.t_ref, snapshot.period);
        let prediction = self.model.predict(&[interior_phase(phase)], true)?;
        let mean = prediction.mean.first().copied();
        let std = prediction.std.as_ref().and_then(|s| s.first().copied());

        let (Some(mean), Some(std)) = (mean, std) else {
            return Err(LcAugmentError::ModelFitFailure(
                "model returned no prediction".into(),
            ));
        };
        if !mean.is_finite() || !std.is_finite() {
            return Err(LcAugmentError::ModelFitFailure(format!(
                "non-finite prediction at phase {phase}: mean={mean}, std={std}"
            )));
        }

        let obs = Observation::synthetic(time, mean + snapshot.background_level, std);
        trace!("{}: synthetic point {:?}", self.id, obs);
        self.observations.push(obs);
        self.dirty = true;
        Ok(obs)
    }

    /// Train once, then append `n` synthetic observations.
    pub fn add_synthetic(&mut self, n: usize) -> Result<Vec<Observation>, LcAugmentError> {
        self.train()?;
        (0..n).map(|_| self.add_synthetic_observation()).collect()
    }

    /// Re-estimate the live period from the time-domain columns.
    ///
    /// Return
    /// ----------
    /// * The estimate, now installed as the live period, or
    ///   [`LcAugmentError::DegenerateEstimate`] if the estimator gave no usable period.
    pub fn reestimate_period<E>(&mut self, estimator: &E) -> Result<PeriodEstimate, LcAugmentError>
    where
        E: PeriodEstimator + ?Sized,
    {
        let cols = to_columns(&self.observations);
        let estimate = estimator.estimate(&cols.time, &cols.mag, &cols.err)?;
        if !estimate.period.is_finite() || estimate.period <= 0.0 {
            return Err(LcAugmentError::DegenerateEstimate(format!(
                "period {} for star {}",
                estimate.period, self.id
            )));
        }
        self.period = estimate.period;
        self.dirty = true;
        Ok(estimate)
    }

    /// Override the live period.
    pub fn set_period(&mut self, period: Period) -> Result<(), LcAugmentError> {
        self.period = check_period(period)?;
        self.dirty = true;
        Ok(())
    }

    /// Restore the catalog period.
    pub fn reset_period(&mut self) {
        self.period = self.period_catalog;
        self.dirty = true;
    }

    fn refresh_background(&mut self) {
        let mags: Vec<Magnitude> = self.observations.iter().map(|obs| obs.mag).collect();
        if let Some(level) = biweight_location(&mags) {
            self.view.background_level = level;
        }
    }

    /// Remove every observation with `1/err < threshold`.
    ///
    /// Return
    /// ----------
    /// * The number of removed observations.
    pub fn filter_by_snr(&mut self, threshold: f64) -> usize {
        let removed = retain_snr(&mut self.observations, threshold);
        self.refresh_background();
        self.dirty = true;
        removed
    }

    /// Drop noisy points and magnitude outliers.
    ///
    /// Keeps the points with `err < error_limit · mean(err)` and
    /// `|mag − mean(mag)| / std(mag) < std_limit`; a zero magnitude spread keeps every
    /// magnitude.
    pub fn filter_sigma_clipping(&mut self, error_limit: f64, std_limit: f64) -> usize {
        let errs: Vec<f64> = self.observations.iter().map(|obs| obs.err).collect();
        let mags: Vec<f64> = self.observations.iter().map(|obs| obs.mag).collect();
        let (Some((mean_err, _)), Some((mean_mag, std_mag))) = (mean_std(&errs), mean_std(&mags))
        else {
            return 0;
        };

        let before = self.observations.len();
        self.observations.retain(|obs| {
            let err_ok = obs.err < error_limit * mean_err;
            let mag_ok = std_mag == 0.0 || (obs.mag - mean_mag).abs() / std_mag < std_limit;
            err_ok && mag_ok
        });
        let removed = before - self.observations.len();
        self.refresh_background();
        self.dirty = true;
        removed
    }

    /// Randomly keep `n` observations; the others move to [`discarded`](Self::discarded).
    ///
    /// Return
    /// ----------
    /// * The number of discarded observations.
    pub fn subsample(&mut self, n: usize) -> usize {
        self.observations.shuffle(&mut self.rng);
        let dropped = if n < self.observations.len() {
            self.observations.split_off(n)
        } else {
            Vec::new()
        };
        let count = dropped.len();
        self.discarded.extend(dropped);
        self.dirty = true;
        count
    }

    /// Rows of the augmented table: real points first, then synthetic ones in append order.
    pub fn export_table(&self) -> Vec<ExportRow> {
        let (real, synthetic): (Vec<&Observation>, Vec<&Observation>) =
            self.observations.iter().partition(|obs| !obs.synthetic);
        real.into_iter()
            .chain(synthetic)
            .map(|obs| ExportRow::new(&self.id, obs))
            .collect()
    }

    pub fn id(&self) -> &StarId {
        &self.id
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn period_catalog(&self) -> Period {
        self.period_catalog
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn discarded(&self) -> &[Observation] {
        &self.discarded
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn n_synthetic(&self) -> usize {
        self.observations.iter().filter(|obs| obs.synthetic).count()
    }

    /// Last computed background level (biweight location of the magnitudes).
    pub fn background_level(&self) -> Magnitude {
        self.view.background_level
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn snapshot(&self) -> Option<TrainingSnapshot> {
        self.snapshot
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

#[cfg(test)]
mod light_curve_tests {
    use super::*;
    use crate::regression::Prediction;
    use approx::assert_relative_eq;

    /// Predicts a constant residual and spread, recording nothing.
    #[derive(Debug, Default)]
    struct ConstantModel {
        fitted: bool,
    }

    impl RegressionModel for ConstantModel {
        fn fit(&mut self, _: &[Phase], _: &[Magnitude], _: &[Magnitude]) -> Result<(), LcAugmentError> {
            self.fitted = true;
            Ok(())
        }

        fn predict(&self, phase: &[Phase], want_std: bool) -> Result<Prediction, LcAugmentError> {
            if !self.fitted {
                return Err(LcAugmentError::ModelNotFitted);
            }
            Ok(Prediction {
                mean: vec![0.1; phase.len()],
                std: want_std.then(|| vec![0.02; phase.len()]),
            })
        }
    }

    fn sample_curve(seed: u64) -> PeriodicLightCurve<ConstantModel> {
        let obs = (0..30)
            .map(|i| {
                let t = 2450000.0 + i as f64 * 0.37;
                let m = 15.0 + 0.4 * (std::f64::consts::TAU * t / 0.6).sin();
                Observation::new(t, m, 0.02 + 0.001 * (i % 5) as f64)
            })
            .collect();
        PeriodicLightCurve::with_model(StarId::Int(7), obs, 0.6, ConstantModel::default(), seed)
            .unwrap()
    }

    #[test]
    fn test_construction_validation() {
        let obs = vec![Observation::new(1.0, 15.0, 0.1)];
        assert_eq!(
            PeriodicLightCurve::new(StarId::Int(1), obs.clone(), 0.0).unwrap_err(),
            LcAugmentError::InvalidPeriod(0.0)
        );
        assert_eq!(
            PeriodicLightCurve::new(StarId::Int(1), vec![], 1.0).unwrap_err(),
            LcAugmentError::EmptyObservationSet
        );
        assert!(matches!(
            PeriodicLightCurve::from_columns(StarId::Int(1), &[1.0, 2.0], &[15.0], &[0.1], 1.0),
            Err(LcAugmentError::MismatchedColumns { .. })
        ));
        let lc = PeriodicLightCurve::new(StarId::Int(1), obs, 1.0).unwrap();
        assert!(!lc.is_dirty());
    }

    #[test]
    fn test_fold_range_and_idempotence() {
        let mut lc = sample_curve(1);
        let first = lc.phases().unwrap().to_vec();
        assert!(first.iter().all(|p| (0.0..1.0).contains(p)));
        lc.fold().unwrap();
        assert_eq!(lc.phases().unwrap(), first.as_slice());

        // reference point sits at phase zero
        let t_ref = lc.folded().unwrap().t_ref();
        let idx = lc.observations().iter().position(|o| o.time == t_ref).unwrap();
        assert_eq!(lc.phases().unwrap()[idx], 0.0);
    }

    #[test]
    fn test_period_change_marks_dirty() {
        let mut lc = sample_curve(1);
        let before = lc.phases().unwrap().to_vec();
        lc.set_period(0.61).unwrap();
        assert!(lc.is_dirty());
        let after = lc.phases().unwrap().to_vec();
        assert!(!lc.is_dirty());
        assert_ne!(before, after);

        lc.reset_period();
        assert_eq!(lc.period(), 0.6);
        assert_eq!(lc.phases().unwrap(), before.as_slice());
        assert!(lc.set_period(f64::NAN).is_err());
    }

    #[test]
    fn test_synthetic_requires_training() {
        let mut lc = sample_curve(1);
        assert_eq!(
            lc.add_synthetic_observation().unwrap_err(),
            LcAugmentError::ModelNotFitted
        );
    }

    #[test]
    fn test_add_synthetic() {
        let mut lc = sample_curve(3);
        let originals = lc.observations().to_vec();
        let (lo, hi) = time_range(&originals).unwrap();

        let added = lc.add_synthetic(4).unwrap();
        assert_eq!(added.len(), 4);
        assert_eq!(lc.len(), 34);
        assert_eq!(lc.n_synthetic(), 4);
        assert_eq!(&lc.observations()[..30], originals.as_slice());
        assert!(lc.is_dirty());

        let background = lc.snapshot().unwrap().background_level;
        for obs in &added {
            assert!(obs.synthetic);
            assert!(obs.time >= lo && obs.time <= hi);
            assert_relative_eq!(obs.mag, background + 0.1, epsilon = 1e-12);
            assert_relative_eq!(obs.err, 0.02);
        }
    }

    #[test]
    fn test_same_seed_same_draws() {
        let mut a = sample_curve(42);
        let mut b = sample_curve(42);
        let mut c = sample_curve(43);
        let da = a.add_synthetic(5).unwrap();
        let db = b.add_synthetic(5).unwrap();
        let dc = c.add_synthetic(5).unwrap();
        assert_eq!(da, db);
        assert_ne!(da, dc);
    }

    #[test]
    fn test_export_order() {
        let mut lc = sample_curve(5);
        lc.add_synthetic(3).unwrap();
        lc.filter_by_snr(0.0);
        let rows = lc.export_table();
        assert_eq!(rows.len(), 33);
        assert!(rows[..30].iter().all(|r| !r.synthetic));
        assert!(rows[30..].iter().all(|r| r.synthetic));
        assert!(rows.iter().all(|r| r.id == StarId::Int(7)));
    }

    #[test]
    fn test_filter_by_snr() {
        let mut lc = sample_curve(1);
        // err in {0.020 .. 0.024}, SNR in (41.6, 50]
        let original = lc.observations().to_vec();
        let removed = lc.filter_by_snr(45.0);
        assert!(removed > 0);
        assert!(lc.observations().iter().all(|o| o.snr() >= 45.0));
        assert_eq!(lc.len() + removed, 30);
        assert!(lc.is_dirty());

        let dropped: Vec<&Observation> = original
            .iter()
            .filter(|o| !lc.observations().contains(o))
            .collect();
        assert_eq!(dropped.len(), removed);
        assert!(dropped.iter().all(|o| o.snr() < 45.0));

        let remaining = lc.len();
        assert_eq!(lc.filter_by_snr(1e6), remaining);
        assert!(lc.is_empty());
        assert_eq!(lc.train().unwrap_err(), LcAugmentError::EmptyObservationSet);
    }

    #[test]
    fn test_sigma_clipping_drops_outlier() {
        let mut obs: Vec<Observation> = (0..40)
            .map(|i| Observation::new(i as f64, 15.0 + 0.01 * (i % 3) as f64, 0.05))
            .collect();
        obs.push(Observation::new(41.0, 25.0, 0.05));
        obs.push(Observation::new(42.0, 15.0, 1.0));
        let mut lc =
            PeriodicLightCurve::with_model(StarId::Int(2), obs, 1.0, ConstantModel::default(), 1)
                .unwrap();
        let removed = lc.filter_sigma_clipping(3.0, 5.0);
        assert_eq!(removed, 2);
        assert!(lc.observations().iter().all(|o| o.mag < 16.0 && o.err < 0.5));
    }

    #[test]
    fn test_subsample_keeps_discarded() {
        let mut lc = sample_curve(9);
        let dropped = lc.subsample(12);
        assert_eq!(dropped, 18);
        assert_eq!(lc.len(), 12);
        assert_eq!(lc.discarded().len(), 18);
        assert_eq!(lc.subsample(100), 0);
        assert_eq!(lc.len(), 12);
    }

    #[test]
    fn test_reestimate_period() {
        let mut lc = sample_curve(1);
        let fixed = |_: &[f64], _: &[f64], _: &[f64]| -> Result<PeriodEstimate, LcAugmentError> {
            Ok(PeriodEstimate {
                period: 0.3,
                fit_quality: 0.01,
            })
        };
        let est = lc.reestimate_period(&fixed).unwrap();
        assert_eq!(est.period, 0.3);
        assert_eq!(lc.period(), 0.3);
        assert_eq!(lc.period_catalog(), 0.6);
        assert!(lc.is_dirty());

        let nan = |_: &[f64], _: &[f64], _: &[f64]| -> Result<PeriodEstimate, LcAugmentError> {
            Ok(PeriodEstimate {
                period: f64::NAN,
                fit_quality: 1.0,
            })
        };
        assert!(lc.reestimate_period(&nan).unwrap_err().is_degenerate_estimate());
        assert_eq!(lc.period(), 0.3);
    }
}

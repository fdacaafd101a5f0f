//! # Period estimation
//!
//! A [`PeriodEstimator`] maps a time series `(time, mag, err)` to a best-fit period and a
//! goodness-of-fit statistic. Estimators are deterministic: identical inputs always give the
//! identical estimate, which the minimum-observation search relies on.
//!
//! The crate ships one implementation, the error-weighted
//! [`LombScargle`](crate::period::lomb_scargle::LombScargle) periodogram. Any closure with the
//! right signature is also an estimator, which keeps tests and alternative back-ends cheap:
//!
//! ```rust
//! use lcaugment::lcaugment_errors::LcAugmentError;
//! use lcaugment::period::{PeriodEstimate, PeriodEstimator};
//!
//! let fixed = |_t: &[f64], _m: &[f64], _e: &[f64]| -> Result<PeriodEstimate, LcAugmentError> {
//!     Ok(PeriodEstimate { period: 0.5, fit_quality: 0.0 })
//! };
//! let est = fixed.estimate(&[0.0, 1.0], &[15.0, 15.2], &[0.1, 0.1]).unwrap();
//! assert_eq!(est.period, 0.5);
//! ```
pub mod lomb_scargle;

use crate::{
    constants::{Hjd, Magnitude, Period},
    lcaugment_errors::LcAugmentError,
};

/// Outcome of a period estimation.
///
/// * `period` – best period, in the time unit of the input.
/// * `fit_quality` – estimator-specific statistic; for Lomb–Scargle the false-alarm
///   probability of the peak (lower is more significant).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodEstimate {
    pub period: Period,
    pub fit_quality: f64,
}

pub trait PeriodEstimator: Sync {
    /// Estimate the dominant period of a time series.
    ///
    /// Arguments
    /// -----------------
    /// * `time`, `mag`, `err`: parallel columns of one light curve.
    ///
    /// Return
    /// ----------
    /// * The estimate, or [`LcAugmentError::DegenerateEstimate`] when the input cannot support
    ///   one (too few points, zero variance, ...).
    fn estimate(
        &self,
        time: &[Hjd],
        mag: &[Magnitude],
        err: &[Magnitude],
    ) -> Result<PeriodEstimate, LcAugmentError>;
}

impl<F> PeriodEstimator for F
where
    F: Fn(&[Hjd], &[Magnitude], &[Magnitude]) -> Result<PeriodEstimate, LcAugmentError> + Sync,
{
    fn estimate(
        &self,
        time: &[Hjd],
        mag: &[Magnitude],
        err: &[Magnitude],
    ) -> Result<PeriodEstimate, LcAugmentError> {
        self(time, mag, err)
    }
}

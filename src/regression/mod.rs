//! # Regression models in phase space
//!
//! A [`RegressionModel`] is trained on a folded light curve (phase → residual magnitude) and then
//! queried for a predictive mean and standard deviation at new phases. The light curve owns its
//! model exclusively; back-ends are interchangeable implementations of this trait and never share
//! mutable state.
//!
//! ## Contract
//!
//! * `fit(phase, residual, err)` – replace the model state with a fit to the given points.
//!   `residual` is the magnitude minus the light curve's background level.
//! * `predict(phase, want_std)` – predictive mean at each query phase and, if requested,
//!   the predictive standard deviation.
//!
//! Calling `predict` before a successful `fit` yields [`LcAugmentError::ModelNotFitted`].
//! Numerical failures of a back-end surface as [`LcAugmentError::ModelFitFailure`].
//!
//! ## Back-ends
//!
//! * [`GaussianProcess`](crate::regression::gaussian_process::GaussianProcess) – Matérn-3/2
//!   Gaussian process with either per-point measurement noise or a fitted white-noise term.
pub mod gaussian_process;
mod nelder_mead;

use crate::{
    constants::{Magnitude, Phase},
    lcaugment_errors::LcAugmentError,
};

/// Output of [`RegressionModel::predict`].
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub mean: Vec<f64>,
    pub std: Option<Vec<f64>>,
}

pub trait RegressionModel: Send {
    fn fit(
        &mut self,
        phase: &[Phase],
        residual: &[Magnitude],
        err: &[Magnitude],
    ) -> Result<(), LcAugmentError>;

    fn predict(&self, phase: &[Phase], want_std: bool) -> Result<Prediction, LcAugmentError>;
}

impl<M: RegressionModel + ?Sized> RegressionModel for Box<M> {
    fn fit(
        &mut self,
        phase: &[Phase],
        residual: &[Magnitude],
        err: &[Magnitude],
    ) -> Result<(), LcAugmentError> {
        (**self).fit(phase, residual, err)
    }

    fn predict(&self, phase: &[Phase], want_std: bool) -> Result<Prediction, LcAugmentError> {
        (**self).predict(phase, want_std)
    }
}

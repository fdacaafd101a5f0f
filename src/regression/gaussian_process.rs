//! # Matérn-3/2 Gaussian process regressor
//!
//! Dense Gaussian-process regression on one input dimension (phase), with the kernel
//!
//! ```text
//! k(r) = σ² · (1 + √3·r/ℓ) · exp(−√3·r/ℓ)
//! ```
//!
//! and a diagonal noise term chosen by [`GpNoise`]:
//!
//! * [`GpNoise::MeasurementError`] – `e_i² + jitter`, the per-point magnitude uncertainties are
//!   trusted as the observation noise.
//! * [`GpNoise::WhiteKernel`] – `σ_w² + jitter`, a single white-noise variance fitted together
//!   with the kernel; the uncertainties are ignored.
//!
//! ## Training
//! -----------------
//! Hyper-parameters (`ln σ²`, `ln ℓ` and, for the white kernel, `ln σ_w²`) are tuned by
//! minimizing the negative log marginal likelihood
//!
//! ```text
//! −ln p(y | θ) = ½ yᵀ K⁻¹ y + Σ ln L_ii + ½ n ln 2π,    K = L Lᵀ
//! ```
//!
//! with a Nelder–Mead simplex in log space, starting from `σ² = var(y)` and
//! `ℓ = initial_length_scale`. The covariance is factorized once more at the optimum and kept for
//! prediction.
//!
//! ## Prediction
//! -----------------
//! For a query phase `x*` with cross-covariance `k*`:
//!
//! ```text
//! mean = k*ᵀ α,   α = K⁻¹ y
//! var  = σ² − ‖L⁻¹ k*‖²
//! ```
//!
//! The returned standard deviation is that of the latent function (observation noise excluded).
use std::cmp::Ordering::Greater;

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::{
    constants::{Magnitude, Phase},
    lcaugment_errors::LcAugmentError,
    phase::mean_std,
    regression::{nelder_mead, Prediction, RegressionModel},
};

const SQRT_3: f64 = 1.732_050_807_568_877_2;
const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Bounds of the log hyper-parameters explored by the optimizer.
const LOG_VARIANCE_BOUNDS: (f64, f64) = (-25.0, 10.0);
const LOG_LENGTH_BOUNDS: (f64, f64) = (-7.0, 3.0);

/// Diagonal noise model of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpNoise {
    /// Per-point measurement uncertainties
    #[default]
    MeasurementError,
    /// A single fitted white-noise variance
    WhiteKernel,
}

impl std::str::FromStr for GpNoise {
    type Err = LcAugmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "measurement" | "measurement_error" | "error" => Ok(GpNoise::MeasurementError),
            "white" | "white_kernel" => Ok(GpNoise::WhiteKernel),
            other => Err(LcAugmentError::InvalidParameter(format!(
                "unknown GP noise model: {other}"
            ))),
        }
    }
}

/// Configuration of a [`GaussianProcess`].
///
/// Defaults
/// -----------------
/// * `noise`: [`GpNoise::MeasurementError`]
/// * `initial_length_scale`: 0.1 (phase units)
/// * `jitter`: 1e-8
/// * `optimize`: true
/// * `max_iter`: 200
/// * `tol`: 1e-6
#[derive(Debug, Clone, PartialEq)]
pub struct GpParams {
    pub noise: GpNoise,
    pub initial_length_scale: f64,
    pub jitter: f64,
    pub optimize: bool,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for GpParams {
    fn default() -> Self {
        GpParams {
            noise: GpNoise::MeasurementError,
            initial_length_scale: 0.1,
            jitter: 1e-8,
            optimize: true,
            max_iter: 200,
            tol: 1e-6,
        }
    }
}

impl GpParams {
    pub fn builder() -> GpParamsBuilder {
        GpParamsBuilder::default()
    }
}

/// Builder for [`GpParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct GpParamsBuilder {
    params: GpParams,
}

impl GpParamsBuilder {
    pub fn noise(mut self, v: GpNoise) -> Self {
        self.params.noise = v;
        self
    }
    pub fn initial_length_scale(mut self, v: f64) -> Self {
        self.params.initial_length_scale = v;
        self
    }
    pub fn jitter(mut self, v: f64) -> Self {
        self.params.jitter = v;
        self
    }
    pub fn optimize(mut self, v: bool) -> Self {
        self.params.optimize = v;
        self
    }
    pub fn max_iter(mut self, v: usize) -> Self {
        self.params.max_iter = v;
        self
    }
    pub fn tol(mut self, v: f64) -> Self {
        self.params.tol = v;
        self
    }

    /// Validation rules
    /// -----------------
    /// * `initial_length_scale > 0`, `tol > 0`
    /// * `jitter >= 0`
    pub fn build(self) -> Result<GpParams, LcAugmentError> {
        let p = &self.params;
        if p.initial_length_scale.partial_cmp(&0.0) != Some(Greater) {
            return Err(LcAugmentError::InvalidParameter(
                "initial_length_scale must be > 0".into(),
            ));
        }
        if p.tol.partial_cmp(&0.0) != Some(Greater) {
            return Err(LcAugmentError::InvalidParameter("tol must be > 0".into()));
        }
        if !(p.jitter >= 0.0) {
            return Err(LcAugmentError::InvalidParameter(
                "jitter must be >= 0".into(),
            ));
        }
        Ok(self.params)
    }
}

/// Kernel and noise hyper-parameters in natural units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpHyperParams {
    pub amplitude2: f64,
    pub length_scale: f64,
    pub white_noise2: f64,
}

impl GpHyperParams {
    fn from_log(theta: &[f64], noise: GpNoise) -> Self {
        GpHyperParams {
            amplitude2: theta[0].exp(),
            length_scale: theta[1].exp(),
            white_noise2: match noise {
                GpNoise::MeasurementError => 0.0,
                GpNoise::WhiteKernel => theta[2].exp(),
            },
        }
    }

    #[inline]
    fn kernel(&self, r: f64) -> f64 {
        let s = SQRT_3 * r / self.length_scale;
        self.amplitude2 * (1.0 + s) * (-s).exp()
    }
}

#[derive(Debug, Clone)]
struct FittedGp {
    x: Vec<f64>,
    l: DMatrix<f64>,
    alpha: DVector<f64>,
    hyper: GpHyperParams,
}

#[derive(Debug, Clone, Default)]
pub struct GaussianProcess {
    params: GpParams,
    fitted: Option<FittedGp>,
}

impl GaussianProcess {
    pub fn new(params: GpParams) -> Self {
        GaussianProcess {
            params,
            fitted: None,
        }
    }

    pub fn params(&self) -> &GpParams {
        &self.params
    }

    /// Hyper-parameters of the last successful fit.
    pub fn hyper_params(&self) -> Option<GpHyperParams> {
        self.fitted.as_ref().map(|f| f.hyper)
    }

    fn covariance(&self, x: &[f64], err: &[f64], hyper: &GpHyperParams) -> DMatrix<f64> {
        let n = x.len();
        DMatrix::from_fn(n, n, |i, j| {
            let k = hyper.kernel((x[i] - x[j]).abs());
            if i == j {
                let noise = match self.params.noise {
                    GpNoise::MeasurementError => err[i] * err[i],
                    GpNoise::WhiteKernel => hyper.white_noise2,
                };
                k + noise + self.params.jitter
            } else {
                k
            }
        })
    }

    fn neg_log_likelihood(&self, x: &[f64], y: &DVector<f64>, err: &[f64], theta: &[f64]) -> f64 {
        let in_bounds = |v: f64, (lo, hi): (f64, f64)| (lo..=hi).contains(&v);
        if !in_bounds(theta[0], LOG_VARIANCE_BOUNDS)
            || !in_bounds(theta[1], LOG_LENGTH_BOUNDS)
            || theta.get(2).is_some_and(|t| !in_bounds(*t, LOG_VARIANCE_BOUNDS))
        {
            return f64::INFINITY;
        }

        let hyper = GpHyperParams::from_log(theta, self.params.noise);
        let Some(chol) = self.covariance(x, err, &hyper).cholesky() else {
            return f64::INFINITY;
        };
        let alpha = chol.solve(y);
        let log_det_half: f64 = chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
        0.5 * y.dot(&alpha) + log_det_half + 0.5 * x.len() as f64 * LN_2PI
    }
}

impl RegressionModel for GaussianProcess {
    fn fit(
        &mut self,
        phase: &[Phase],
        residual: &[Magnitude],
        err: &[Magnitude],
    ) -> Result<(), LcAugmentError> {
        if phase.len() != residual.len() || phase.len() != err.len() {
            return Err(LcAugmentError::MismatchedColumns {
                time: phase.len(),
                mag: residual.len(),
                err: err.len(),
            });
        }
        if phase.is_empty() {
            return Err(LcAugmentError::ModelFitFailure(
                "no training points".into(),
            ));
        }
        if phase
            .iter()
            .chain(residual)
            .chain(err)
            .any(|v| !v.is_finite())
        {
            return Err(LcAugmentError::ModelFitFailure(
                "non-finite training data".into(),
            ));
        }

        self.fitted = None;
        let y = DVector::from_column_slice(residual);
        let (_, std) = mean_std(residual).unwrap_or((0.0, 0.0));
        let variance = (std * std).max(1e-6);

        let mut theta0 = vec![variance.ln(), self.params.initial_length_scale.ln()];
        if self.params.noise == GpNoise::WhiteKernel {
            theta0.push((0.1 * variance).ln());
        }

        let theta = if self.params.optimize {
            let min = nelder_mead::minimize(
                |theta| self.neg_log_likelihood(phase, &y, err, theta),
                &theta0,
                1.0,
                self.params.max_iter,
                self.params.tol,
            );
            debug!(
                "GP hyper-parameters optimized in {} iterations, -lnL = {:.4}",
                min.iterations, min.value
            );
            if min.value.is_finite() {
                min.x
            } else {
                theta0
            }
        } else {
            theta0
        };

        let hyper = GpHyperParams::from_log(&theta, self.params.noise);
        let chol = self
            .covariance(phase, err, &hyper)
            .cholesky()
            .ok_or_else(|| {
                LcAugmentError::ModelFitFailure(
                    "covariance matrix is not positive definite".into(),
                )
            })?;
        let alpha = chol.solve(&y);

        self.fitted = Some(FittedGp {
            x: phase.to_vec(),
            l: chol.l(),
            alpha,
            hyper,
        });
        Ok(())
    }

    fn predict(&self, phase: &[Phase], want_std: bool) -> Result<Prediction, LcAugmentError> {
        let fitted = self.fitted.as_ref().ok_or(LcAugmentError::ModelNotFitted)?;

        let mut mean = Vec::with_capacity(phase.len());
        let mut std = want_std.then(|| Vec::with_capacity(phase.len()));

        for &q in phase {
            let k_star = DVector::from_iterator(
                fitted.x.len(),
                fitted.x.iter().map(|xi| fitted.hyper.kernel((q - xi).abs())),
            );
            mean.push(k_star.dot(&fitted.alpha));

            if let Some(std) = std.as_mut() {
                let v = fitted.l.solve_lower_triangular(&k_star).ok_or_else(|| {
                    LcAugmentError::ModelFitFailure("singular Cholesky factor".into())
                })?;
                let var = fitted.hyper.amplitude2 - v.dot(&v);
                std.push(var.max(0.0).sqrt());
            }
        }

        Ok(Prediction { mean, std })
    }
}

#[cfg(test)]
mod gaussian_process_tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn training_set(n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..n).map(|i| i as f64 / n as f64).collect();
        let y = x
            .iter()
            .map(|p| 0.3 * (std::f64::consts::TAU * p).sin())
            .collect();
        (x, y, vec![0.01; n])
    }

    #[test]
    fn test_predict_before_fit() {
        let gp = GaussianProcess::default();
        assert_eq!(
            gp.predict(&[0.5], true).unwrap_err(),
            LcAugmentError::ModelNotFitted
        );
    }

    #[test]
    fn test_interpolates_smooth_signal() {
        let (x, y, e) = training_set(25);
        let mut gp = GaussianProcess::default();
        gp.fit(&x, &y, &e).unwrap();

        let queries = [0.1, 0.33, 0.52, 0.77];
        let pred = gp.predict(&queries, true).unwrap();
        for (q, m) in queries.iter().zip(&pred.mean) {
            assert_abs_diff_eq!(*m, 0.3 * (std::f64::consts::TAU * q).sin(), epsilon = 0.03);
        }
        let std = pred.std.unwrap();
        assert!(std.iter().all(|s| s.is_finite() && *s >= 0.0 && *s < 0.1));
    }

    #[test]
    fn test_without_std() {
        let (x, y, e) = training_set(10);
        let mut gp = GaussianProcess::new(GpParams::builder().optimize(false).build().unwrap());
        gp.fit(&x, &y, &e).unwrap();
        let pred = gp.predict(&[0.25, 0.5], false).unwrap();
        assert_eq!(pred.mean.len(), 2);
        assert!(pred.std.is_none());
    }

    #[test]
    fn test_white_kernel_mode() {
        let (x, y, e) = training_set(20);
        let params = GpParams::builder()
            .noise(GpNoise::WhiteKernel)
            .build()
            .unwrap();
        let mut gp = GaussianProcess::new(params);
        gp.fit(&x, &y, &e).unwrap();
        let hyper = gp.hyper_params().unwrap();
        assert!(hyper.white_noise2 > 0.0);
        let pred = gp.predict(&[0.25], true).unwrap();
        assert_abs_diff_eq!(pred.mean[0], 0.3, epsilon = 0.05);
    }

    #[test]
    fn test_fit_failures() {
        let mut gp = GaussianProcess::default();
        assert!(matches!(
            gp.fit(&[], &[], &[]),
            Err(LcAugmentError::ModelFitFailure(_))
        ));
        assert!(matches!(
            gp.fit(&[0.1, 0.2], &[f64::NAN, 0.0], &[0.1, 0.1]),
            Err(LcAugmentError::ModelFitFailure(_))
        ));
        assert!(matches!(
            gp.fit(&[0.1, 0.2], &[0.0], &[0.1, 0.1]),
            Err(LcAugmentError::MismatchedColumns { .. })
        ));
    }

    #[test]
    fn test_noise_from_str() {
        assert_eq!("white".parse::<GpNoise>().unwrap(), GpNoise::WhiteKernel);
        assert_eq!(
            "Measurement".parse::<GpNoise>().unwrap(),
            GpNoise::MeasurementError
        );
        assert!("rbf".parse::<GpNoise>().is_err());
    }

    #[test]
    fn test_params_validation() {
        assert!(GpParams::builder().initial_length_scale(0.0).build().is_err());
        assert!(GpParams::builder().jitter(-1.0).build().is_err());
        assert!(GpParams::builder().tol(0.0).build().is_err());
    }
}

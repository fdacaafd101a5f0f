//! # Error-weighted Lomb–Scargle periodogram
//!
//! Generalized (floating-mean) Lomb–Scargle periodogram with weights `w_i = 1/e_i²`, in the
//! *standard* normalization where the power at frequency `f` is the fraction of the weighted
//! variance explained by a sinusoid plus offset at `f`:
//!
//! ```text
//! P(f) = (SS·YC² + CC·YS² − 2·CS·YC·YS) / (YY · (CC·SS − CS²))   ∈ [0, 1]
//! ```
//!
//! ## Frequency grid
//! -----------------
//! The grid is uniform in frequency between `min_frequency` and `max_frequency`, with spacing
//! `df = 1 / (samples_per_peak · baseline)` where `baseline = max(t) − min(t)`:
//!
//! ```text
//! N_f = 1 + round((f_max − f_min) / df)
//! ```
//!
//! The grid therefore depends on the time baseline of the input, which is why truncating a
//! light curve may shift the recovered period by a fraction of a grid step.
//!
//! ## Goodness of fit
//! -----------------
//! The reported `fit_quality` is the *simple* false-alarm probability of the highest peak:
//!
//! ```text
//! fap_single = (1 − z)^((N − 3)/2)
//! N_eff      = f_max · baseline
//! fap        = 1 − (1 − fap_single)^N_eff
//! ```
//!
//! ## See also
//! ------------
//! * [`PeriodEstimator`] – Trait implemented by [`LombScargle`].
//! * [`LombScargleParams`] – Grid configuration with validation.
use std::cmp::Ordering::Greater;

use itertools::izip;

use crate::{
    constants::{Hjd, Magnitude, LS_MAX_FREQUENCY, LS_MIN_FREQUENCY, LS_SAMPLES_PER_PEAK},
    lcaugment_errors::LcAugmentError,
    period::{PeriodEstimate, PeriodEstimator},
};

/// Frequency grid configuration of the periodogram.
///
/// Defaults
/// -----------------
/// * `min_frequency`: 1/200 day⁻¹
/// * `max_frequency`: 10 day⁻¹
/// * `samples_per_peak`: 5
#[derive(Debug, Clone, PartialEq)]
pub struct LombScargleParams {
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub samples_per_peak: usize,
}

impl Default for LombScargleParams {
    fn default() -> Self {
        LombScargleParams {
            min_frequency: LS_MIN_FREQUENCY,
            max_frequency: LS_MAX_FREQUENCY,
            samples_per_peak: LS_SAMPLES_PER_PEAK,
        }
    }
}

impl LombScargleParams {
    pub fn builder() -> LombScargleParamsBuilder {
        LombScargleParamsBuilder::new()
    }
}

/// Builder for [`LombScargleParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct LombScargleParamsBuilder {
    params: LombScargleParams,
}

impl LombScargleParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_frequency(mut self, v: f64) -> Self {
        self.params.min_frequency = v;
        self
    }
    pub fn max_frequency(mut self, v: f64) -> Self {
        self.params.max_frequency = v;
        self
    }
    pub fn samples_per_peak(mut self, v: usize) -> Self {
        self.params.samples_per_peak = v;
        self
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// -----------------
    /// * `0 < min_frequency < max_frequency`, both finite.
    /// * `samples_per_peak ≥ 1`.
    pub fn build(self) -> Result<LombScargleParams, LcAugmentError> {
        let p = &self.params;
        if p.min_frequency.partial_cmp(&0.0) != Some(Greater) || !p.max_frequency.is_finite() {
            return Err(LcAugmentError::InvalidParameter(
                "frequencies must be finite and strictly positive".into(),
            ));
        }
        if p.max_frequency <= p.min_frequency {
            return Err(LcAugmentError::InvalidParameter(
                "max_frequency must be greater than min_frequency".into(),
            ));
        }
        if p.samples_per_peak == 0 {
            return Err(LcAugmentError::InvalidParameter(
                "samples_per_peak must be >= 1".into(),
            ));
        }
        Ok(self.params)
    }
}

/// Power spectrum over the frequency grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Periodogram {
    pub frequency: Vec<f64>,
    pub power: Vec<f64>,
}

impl Periodogram {
    /// Index and value of the highest peak (first one on ties); NaN powers are skipped.
    pub fn peak(&self) -> Option<(usize, f64)> {
        self.power
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .fold(None, |best: Option<(usize, f64)>, (i, &p)| match best {
                Some((_, bp)) if p <= bp => best,
                _ => Some((i, p)),
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LombScargle {
    params: LombScargleParams,
}

impl LombScargle {
    pub fn new(params: LombScargleParams) -> Self {
        LombScargle { params }
    }

    pub fn params(&self) -> &LombScargleParams {
        &self.params
    }

    /// Frequency grid for a given time baseline.
    pub fn frequency_grid(&self, baseline: f64) -> Vec<f64> {
        let df = 1.0 / (self.params.samples_per_peak as f64 * baseline);
        let span = self.params.max_frequency - self.params.min_frequency;
        let n_freq = 1 + (span / df).round() as usize;
        (0..n_freq)
            .map(|k| self.params.min_frequency + df * k as f64)
            .collect()
    }

    /// Compute the normalized periodogram of a light curve.
    ///
    /// Return
    /// ----------
    /// * The periodogram, or [`LcAugmentError::DegenerateEstimate`] if the series has fewer than
    ///   three points, a zero baseline, a zero weighted variance or a non-positive uncertainty.
    pub fn periodogram(
        &self,
        time: &[Hjd],
        mag: &[Magnitude],
        err: &[Magnitude],
    ) -> Result<Periodogram, LcAugmentError> {
        if time.len() != mag.len() || time.len() != err.len() {
            return Err(LcAugmentError::MismatchedColumns {
                time: time.len(),
                mag: mag.len(),
                err: err.len(),
            });
        }
        let n = time.len();
        if n < 3 {
            return Err(LcAugmentError::DegenerateEstimate(format!(
                "{n} points are not enough for a periodogram"
            )));
        }
        if err.iter().any(|e| !(e.is_finite() && *e > 0.0)) {
            return Err(LcAugmentError::DegenerateEstimate(
                "uncertainties must be finite and positive".into(),
            ));
        }

        let t0 = time.iter().copied().fold(f64::INFINITY, f64::min);
        let t1 = time.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let baseline = t1 - t0;
        if !(baseline > 0.0) {
            return Err(LcAugmentError::DegenerateEstimate(
                "zero time baseline".into(),
            ));
        }

        // Normalized weights and weighted-mean-centred magnitudes
        let w_raw: Vec<f64> = err.iter().map(|e| 1.0 / (e * e)).collect();
        let w_sum: f64 = w_raw.iter().sum();
        let w: Vec<f64> = w_raw.iter().map(|wi| wi / w_sum).collect();
        let y_mean: f64 = izip!(&w, mag).map(|(wi, yi)| wi * yi).sum();
        let y: Vec<f64> = mag.iter().map(|yi| yi - y_mean).collect();
        let yy: f64 = izip!(&w, &y).map(|(wi, yi)| wi * yi * yi).sum();
        if !(yy > 0.0) {
            return Err(LcAugmentError::DegenerateEstimate(
                "zero weighted variance".into(),
            ));
        }

        let t: Vec<f64> = time.iter().map(|ti| ti - t0).collect();
        let frequency = self.frequency_grid(baseline);
        let power = frequency
            .iter()
            .map(|f| {
                let omega = std::f64::consts::TAU * f;
                let (mut c, mut s, mut yc, mut ys, mut cc, mut ss, mut cs) =
                    (0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
                for (wi, ti, yi) in izip!(&w, &t, &y) {
                    let (sin, cos) = (omega * ti).sin_cos();
                    c += wi * cos;
                    s += wi * sin;
                    yc += wi * yi * cos;
                    ys += wi * yi * sin;
                    cc += wi * cos * cos;
                    ss += wi * sin * sin;
                    cs += wi * cos * sin;
                }
                let cc = cc - c * c;
                let ss = ss - s * s;
                let cs = cs - c * s;
                let d = cc * ss - cs * cs;
                if d <= 0.0 {
                    0.0
                } else {
                    (ss * yc * yc + cc * ys * ys - 2.0 * cs * yc * ys) / (yy * d)
                }
            })
            .collect();

        Ok(Periodogram { frequency, power })
    }

    /// Simple false-alarm probability of a peak of power `z` for `n` points over `baseline`.
    pub fn false_alarm_probability(&self, z: f64, n: usize, baseline: f64) -> f64 {
        let fap_single = (1.0 - z).max(0.0).powf(0.5 * (n as f64 - 3.0));
        let n_eff = self.params.max_frequency * baseline;
        -(n_eff * (-fap_single).ln_1p()).exp_m1()
    }
}

impl PeriodEstimator for LombScargle {
    fn estimate(
        &self,
        time: &[Hjd],
        mag: &[Magnitude],
        err: &[Magnitude],
    ) -> Result<PeriodEstimate, LcAugmentError> {
        let periodogram = self.periodogram(time, mag, err)?;
        let (idx, z) = periodogram
            .peak()
            .ok_or_else(|| LcAugmentError::DegenerateEstimate("empty periodogram".into()))?;

        let period = 1.0 / periodogram.frequency[idx];
        if !period.is_finite() {
            return Err(LcAugmentError::DegenerateEstimate(format!(
                "non-finite period {period}"
            )));
        }

        let baseline = time.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            - time.iter().copied().fold(f64::INFINITY, f64::min);

        Ok(PeriodEstimate {
            period,
            fit_quality: self.false_alarm_probability(z, time.len(), baseline),
        })
    }
}

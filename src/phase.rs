//! # Phase folding and robust statistics
//!
//! Small numeric helpers shared by the light-curve model, the augmentation engine and the
//! minimum-observation search:
//!
//! * [`fold_phase`] – map an absolute time onto `[0, 1)` given a reference epoch and a period,
//! * [`reference_epoch`] – epoch of the brightest point (minimum magnitude),
//! * [`biweight_location`] – outlier-resistant central tendency of the magnitudes,
//! * [`double_phase`] – periodic continuation of a folded curve over `[0, 2)`,
//! * [`periods_match`] – relative-tolerance comparison of two periods.
use crate::{
    constants::{Hjd, Magnitude, Period, Phase, BIWEIGHT_C},
    observations::Observation,
};

/// Fold an absolute time onto a phase in `[0, 1)`.
///
/// The epoch is subtracted with a floor division, so times earlier than `t_ref` also land in
/// `[0, 1)`. A rounding result of exactly `1.0` is mapped back to `0.0`.
///
/// Arguments
/// -----------------
/// * `time`: Time to fold.
/// * `t_ref`: Reference epoch (phase zero).
/// * `period`: Folding period, same unit as `time`.
///
/// Return
/// ----------
/// * The phase of `time`.
#[inline]
pub fn fold_phase(time: Hjd, t_ref: Hjd, period: Period) -> Phase {
    let cycles = (time - t_ref) / period;
    let phase = cycles - cycles.floor();
    if phase >= 1.0 {
        0.0
    } else {
        phase
    }
}

/// Time of the minimum-magnitude (brightest) observation; the first one wins on ties.
pub fn reference_epoch(observations: &[Observation]) -> Option<Hjd> {
    observations
        .iter()
        .reduce(|best, obs| if obs.mag < best.mag { obs } else { best })
        .map(|obs| obs.time)
}

/// Median of a slice, `None` if empty. NaN values are ordered last.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some(0.5 * (sorted[n / 2 - 1] + sorted[n / 2]))
    }
}

/// Population mean and standard deviation, `None` if empty.
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

/// Tukey biweight location of a sample.
///
/// Points further than `c · MAD` from the median get zero weight, with `c = 6`:
///
/// ```text
/// u_i = (x_i − M) / (c · MAD)
/// loc = M + Σ_{|u_i|<1} (x_i − M)(1 − u_i²)² / Σ_{|u_i|<1} (1 − u_i²)²
/// ```
///
/// Return
/// ----------
/// * `None` for an empty sample, the median when the MAD is zero.
pub fn biweight_location(values: &[Magnitude]) -> Option<Magnitude> {
    let m = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
    let mad = median(&deviations)?;
    if mad == 0.0 || !mad.is_finite() {
        return Some(m);
    }

    let (num, den) = values.iter().fold((0.0, 0.0), |(num, den), v| {
        let d = v - m;
        let u = d / (BIWEIGHT_C * mad);
        if u.abs() < 1.0 {
            let w = (1.0 - u * u).powi(2);
            (num + d * w, den + w)
        } else {
            (num, den)
        }
    });

    if den == 0.0 {
        Some(m)
    } else {
        Some(m + num / den)
    }
}

/// Periodic continuation of a folded curve.
///
/// Every point appears twice, at phase `p` and at `p + 1`, so a model trained on the result sees
/// each point's neighbours across the fold boundary.
pub fn double_phase(
    phase: &[Phase],
    mag: &[Magnitude],
    err: &[Magnitude],
) -> (Vec<Phase>, Vec<Magnitude>, Vec<Magnitude>) {
    let x: Vec<Phase> = phase
        .iter()
        .copied()
        .chain(phase.iter().map(|p| p + 1.0))
        .collect();
    let y: Vec<Magnitude> = mag.iter().chain(mag.iter()).copied().collect();
    let e: Vec<Magnitude> = err.iter().chain(err.iter()).copied().collect();
    (x, y, e)
}

/// Representative of a phase inside the interior of the doubled domain `[0, 2)`.
///
/// Phases in `[0, 0.5)` are shifted to `[1, 1.5)`, the others kept, so a query always has
/// training points on both sides.
#[inline]
pub fn interior_phase(phase: Phase) -> Phase {
    if phase < 0.5 {
        phase + 1.0
    } else {
        phase
    }
}

/// `true` if `estimate` equals `reference` within a relative tolerance.
///
/// Uses `|a − b| ≤ rel_tol · max(|a|, |b|)`; non-finite values never match.
#[inline]
pub fn periods_match(estimate: Period, reference: Period, rel_tol: f64) -> bool {
    if !estimate.is_finite() || !reference.is_finite() {
        return false;
    }
    (estimate - reference).abs() <= rel_tol * estimate.abs().max(reference.abs())
}

#![allow(dead_code)]

use lcaugment::observations::Observation;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const T0: f64 = 2_455_000.0;

/// Irregularly sampled sinusoidal light curve.
///
/// Times are uniform over `[T0, T0 + baseline]`; `noise` is the half-width of a uniform
/// perturbation of the magnitudes (0 for a noiseless curve).
pub fn sinusoid(
    n: usize,
    period: f64,
    baseline: f64,
    amplitude: f64,
    noise: f64,
    seed: u64,
) -> Vec<Observation> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let t = T0 + rng.random::<f64>() * baseline;
            let jitter = if noise > 0.0 {
                rng.random_range(-noise..noise)
            } else {
                0.0
            };
            let m = 15.0 + amplitude * (std::f64::consts::TAU * (t - T0) / period).sin() + jitter;
            Observation::new(t, m, 0.02 + 0.01 * rng.random::<f64>())
        })
        .collect()
}

/// Observation table in CSV form.
pub fn observation_csv(stars: &[(&str, &[Observation])]) -> String {
    let mut out = String::from("id,hjd,mag,err\n");
    for (id, obs) in stars {
        for o in obs.iter() {
            out.push_str(&format!("{id},{},{},{}\n", o.time, o.mag, o.err));
        }
    }
    out
}

//! # Minimum observation count
//!
//! Estimates how few real observations a light curve can be reduced to before its period stops
//! being recoverable.
//!
//! The observation set is shuffled once with a seeded [`StdRng`], then truncated destructively
//! from `n_obs` points down to [`MIN_SEARCH_SAMPLE`]. After each truncation the period is
//! re-estimated and compared with the reference period under a relative tolerance. The search
//! ends at the first mismatch:
//!
//! * mismatch at `n` points → `min(n + 1, n_obs)`,
//! * no mismatch down to the floor → `n_obs` (the estimate is not trusted to keep holding
//!   with fewer points, so every observation is deemed necessary),
//! * fewer than two observations → `n_obs` without estimating anything.
//!
//! Estimator failures and non-finite periods count as mismatches.
//!
//! The search is an explicit state machine ([`SearchState`]); [`MinObservationSearch::step`]
//! performs one truncation and comparison, [`MinObservationSearch::run`] steps until terminal.
use log::debug;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{
    constants::{Period, StarId, DEFAULT_SEED, MIN_SEARCH_SAMPLE, PERIOD_REL_TOL},
    lcaugment_errors::LcAugmentError,
    observations::{to_columns, Observation},
    period::PeriodEstimator,
    phase::periods_match,
};

/// Configuration of the search.
///
/// Defaults
/// -----------------
/// * `rel_tol`: 1e-5
/// * `seed`: 999
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    pub rel_tol: f64,
    pub seed: u64,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            rel_tol: PERIOD_REL_TOL,
            seed: DEFAULT_SEED,
        }
    }
}

impl SearchParams {
    pub fn builder() -> SearchParamsBuilder {
        SearchParamsBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchParamsBuilder {
    params: SearchParams,
}

impl SearchParamsBuilder {
    pub fn rel_tol(mut self, v: f64) -> Self {
        self.params.rel_tol = v;
        self
    }
    pub fn seed(mut self, v: u64) -> Self {
        self.params.seed = v;
        self
    }

    /// `rel_tol` must be finite and non-negative.
    pub fn build(self) -> Result<SearchParams, LcAugmentError> {
        let tol = self.params.rel_tol;
        if !(tol.is_finite() && tol >= 0.0) {
            return Err(LcAugmentError::InvalidParameter(format!(
                "rel_tol must be finite and >= 0, got {tol}"
            )));
        }
        Ok(self.params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    /// Next step evaluates the first `n` shuffled observations
    Active(usize),
    /// Search finished with the given minimum count
    Terminal(usize),
}

#[derive(Debug, Clone)]
pub struct MinObservationSearch {
    id: StarId,
    working: Vec<Observation>,
    reference: Period,
    n_obs: usize,
    rel_tol: f64,
    state: SearchState,
}

impl MinObservationSearch {
    /// Prepare a search over a copy of `observations`.
    ///
    /// Arguments
    /// -----------------
    /// * `id`: Star identifier, used in log messages.
    /// * `observations`: Real observations of the star.
    /// * `reference`: Catalog period every estimate is compared with.
    /// * `params`: Tolerance and shuffle seed.
    pub fn new(
        id: StarId,
        observations: &[Observation],
        reference: Period,
        params: &SearchParams,
    ) -> Result<Self, LcAugmentError> {
        if !(reference.is_finite() && reference > 0.0) {
            return Err(LcAugmentError::InvalidPeriod(reference));
        }
        let mut working = observations.to_vec();
        let mut rng = StdRng::seed_from_u64(params.seed);
        working.shuffle(&mut rng);

        let n_obs = working.len();
        let state = if n_obs < MIN_SEARCH_SAMPLE {
            SearchState::Terminal(n_obs)
        } else {
            SearchState::Active(n_obs)
        };

        Ok(MinObservationSearch {
            id,
            working,
            reference,
            n_obs,
            rel_tol: params.rel_tol,
            state,
        })
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    /// Truncate to the current sample size, estimate, and advance the state machine.
    pub fn step<E>(&mut self, estimator: &E) -> SearchState
    where
        E: PeriodEstimator + ?Sized,
    {
        let SearchState::Active(n_sample) = self.state else {
            return self.state;
        };

        self.working.truncate(n_sample);
        let cols = to_columns(&self.working);
        let matched = match estimator.estimate(&cols.time, &cols.mag, &cols.err) {
            Ok(est) => periods_match(est.period, self.reference, self.rel_tol),
            Err(e) => {
                debug!("{}: estimator failed at {n_sample} points: {e}", self.id);
                false
            }
        };
        debug!("{}: n_sample={n_sample} matched={matched}", self.id);

        self.state = if !matched {
            SearchState::Terminal((n_sample + 1).min(self.n_obs))
        } else if n_sample - 1 < MIN_SEARCH_SAMPLE {
            SearchState::Terminal(self.n_obs)
        } else {
            SearchState::Active(n_sample - 1)
        };
        self.state
    }

    /// Step until terminal and return the minimum observation count.
    pub fn run<E>(&mut self, estimator: &E) -> usize
    where
        E: PeriodEstimator + ?Sized,
    {
        loop {
            if let SearchState::Terminal(n) = self.step(estimator) {
                return n;
            }
        }
    }
}

/// One-shot minimum-observation search for a single star.
pub fn min_observations<E>(
    id: StarId,
    observations: &[Observation],
    reference: Period,
    estimator: &E,
    params: &SearchParams,
) -> Result<usize, LcAugmentError>
where
    E: PeriodEstimator + ?Sized,
{
    Ok(MinObservationSearch::new(id, observations, reference, params)?.run(estimator))
}

#[cfg(test)]
mod min_observations_tests {
    use super::*;
    use crate::period::PeriodEstimate;

    fn observations(n: usize) -> Vec<Observation> {
        (0..n)
            .map(|i| Observation::new(i as f64, 15.0 + (i % 3) as f64 * 0.1, 0.05))
            .collect()
    }

    /// Returns the reference period while at least `threshold` points remain.
    fn threshold_estimator(
        threshold: usize,
    ) -> impl Fn(&[f64], &[f64], &[f64]) -> Result<PeriodEstimate, LcAugmentError> + Sync {
        move |t: &[f64], _: &[f64], _: &[f64]| {
            Ok(PeriodEstimate {
                period: if t.len() >= threshold { 0.5 } else { 0.75 },
                fit_quality: 0.0,
            })
        }
    }

    #[test]
    fn test_break_gives_last_matching_count() {
        let params = SearchParams::default();
        for k in [3, 10, 30] {
            let n = min_observations(StarId::Int(1), &observations(30), 0.5, &threshold_estimator(k), &params)
                .unwrap();
            assert_eq!(n, k);
        }
    }

    #[test]
    fn test_exhaustion_gives_all_observations() {
        let n = min_observations(
            StarId::Int(1),
            &observations(12),
            0.5,
            &threshold_estimator(0),
            &SearchParams::default(),
        )
        .unwrap();
        assert_eq!(n, 12);
    }

    #[test]
    fn test_immediate_mismatch_is_capped() {
        let n = min_observations(
            StarId::Int(1),
            &observations(8),
            0.5,
            &threshold_estimator(100),
            &SearchParams::default(),
        )
        .unwrap();
        assert_eq!(n, 8);
    }

    #[test]
    fn test_estimator_error_counts_as_mismatch() {
        let estimator = |t: &[f64], _: &[f64], _: &[f64]| -> Result<PeriodEstimate, LcAugmentError> {
            if t.len() < 6 {
                Err(LcAugmentError::DegenerateEstimate("too few".into()))
            } else {
                Ok(PeriodEstimate {
                    period: 0.5 * (1.0 + 1e-7),
                    fit_quality: 0.0,
                })
            }
        };
        let n = min_observations(StarId::Int(1), &observations(15), 0.5, &estimator, &SearchParams::default())
            .unwrap();
        assert_eq!(n, 6);
    }

    #[test]
    fn test_state_machine() {
        let mut search =
            MinObservationSearch::new(StarId::Int(1), &observations(4), 0.5, &SearchParams::default())
                .unwrap();
        let est = threshold_estimator(0);
        assert_eq!(search.state(), SearchState::Active(4));
        assert_eq!(search.step(&est), SearchState::Active(3));
        assert_eq!(search.step(&est), SearchState::Active(2));
        assert_eq!(search.step(&est), SearchState::Terminal(4));
        assert_eq!(search.step(&est), SearchState::Terminal(4));
    }

    #[test]
    fn test_tiny_sets_terminate_immediately() {
        let params = SearchParams::default();
        let search = MinObservationSearch::new(StarId::Int(1), &observations(1), 0.5, &params).unwrap();
        assert_eq!(search.state(), SearchState::Terminal(1));
        let search = MinObservationSearch::new(StarId::Int(1), &[], 0.5, &params).unwrap();
        assert_eq!(search.state(), SearchState::Terminal(0));
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(
            MinObservationSearch::new(StarId::Int(1), &observations(3), -1.0, &SearchParams::default())
                .unwrap_err(),
            LcAugmentError::InvalidPeriod(-1.0)
        );
        assert!(SearchParams::builder().rel_tol(f64::NAN).build().is_err());
    }
}

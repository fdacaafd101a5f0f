//! # Batch processing over a catalog
//!
//! Runs one of the per-star pipelines over every star of a catalog:
//!
//! * [`run_min_observations`] – minimum observation count per star,
//! * [`run_augmentation`] – synthetic augmentation (optionally with a period trace),
//! * [`run_reconstruction`] – period reconstruction from an augmented subsample.
//!
//! ## Execution model
//! -----------------
//! Stars are split into `n_chunks` disjoint chunks with array-split semantics (see
//! [`partition`]); chunks run in parallel on the `rayon` pool and the stars of a chunk run
//! sequentially. Each star owns its light curve, its search state and its random generator,
//! seeded with the batch seed, so a star's result does not depend on the chunking.
//!
//! Failures are isolated per star: the [`BatchReport`] maps every star id to its own
//! `Result`, and one failing star never affects its siblings. Failed ids are logged at `warn`
//! level and never retried.
//!
//! ## Progress UI (feature: `progress`)
//! -----------------
//! With the `progress` feature an `indicatif` bar tracks processed stars, with the duration of
//! the last star in its message.
mod progress;

use std::{
    collections::{HashMap, HashSet},
    time::Instant,
};

use ahash::RandomState;
use log::{info, warn};
use rayon::prelude::*;

use crate::{
    augmentation::{AugmentationEngine, AugmentationOutcome, PeriodTrace},
    catalog::StarFeatures,
    constants::{LightCurveSet, StarId, DEFAULT_SEED},
    lcaugment_errors::LcAugmentError,
    light_curve::PeriodicLightCurve,
    min_observations::{min_observations, SearchParams},
    observations::{retain_snr, ExportRow, Observation},
    period::PeriodEstimator,
    reconstruction::{reconstruct_period, ReconstructionOutcome, ReconstructionParams},
    regression::RegressionModel,
};
use progress::Progress;

/// Configuration shared by every batch mode.
///
/// Defaults
/// -----------------
/// * `n_chunks`: 10
/// * `seed`: 999
/// * `snr_threshold`: `None` (no filtering)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchParams {
    pub n_chunks: usize,
    pub seed: u64,
    pub snr_threshold: Option<f64>,
}

impl Default for BatchParams {
    fn default() -> Self {
        BatchParams {
            n_chunks: 10,
            seed: DEFAULT_SEED,
            snr_threshold: None,
        }
    }
}

impl BatchParams {
    pub fn builder() -> BatchParamsBuilder {
        BatchParamsBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchParamsBuilder {
    params: BatchParams,
}

impl BatchParamsBuilder {
    pub fn n_chunks(mut self, v: usize) -> Self {
        self.params.n_chunks = v;
        self
    }
    pub fn seed(mut self, v: u64) -> Self {
        self.params.seed = v;
        self
    }
    pub fn snr_threshold(mut self, v: Option<f64>) -> Self {
        self.params.snr_threshold = v;
        self
    }

    /// Validation rules
    /// -----------------
    /// * `n_chunks >= 1`
    /// * `snr_threshold`, when set, finite and `>= 0`
    pub fn build(self) -> Result<BatchParams, LcAugmentError> {
        if self.params.n_chunks == 0 {
            return Err(LcAugmentError::InvalidParameter(
                "n_chunks must be >= 1".into(),
            ));
        }
        if let Some(t) = self.params.snr_threshold {
            if !(t.is_finite() && t >= 0.0) {
                return Err(LcAugmentError::InvalidParameter(format!(
                    "snr_threshold must be finite and >= 0, got {t}"
                )));
            }
        }
        Ok(self.params)
    }
}

/// One star ready for processing: its catalog attributes and real observations.
#[derive(Debug, Clone, PartialEq)]
pub struct StarInput {
    pub features: StarFeatures,
    pub observations: Vec<Observation>,
}

impl StarInput {
    pub fn id(&self) -> &StarId {
        &self.features.id
    }
}

/// Pair every feature row with the observations of the same star.
///
/// Stars listed in the feature table but absent from the observation table get an empty
/// observation set (and fail downstream with [`LcAugmentError::EmptyObservationSet`]).
/// Light curves without a feature row have no reference period and are dropped.
/// A star listed more than once keeps its first feature row only.
pub fn join_catalog(mut light_curves: LightCurveSet, features: Vec<StarFeatures>) -> Vec<StarInput> {
    let mut seen: HashSet<StarId, RandomState> = HashSet::default();
    let stars: Vec<StarInput> = features
        .into_iter()
        .filter(|features| {
            let first = seen.insert(features.id.clone());
            if !first {
                warn!("star {} has a duplicate feature row, ignored", features.id);
            }
            first
        })
        .map(|features| {
            let observations = light_curves.remove(&features.id).unwrap_or_default();
            StarInput {
                features,
                observations,
            }
        })
        .collect();

    if !light_curves.is_empty() {
        warn!(
            "{} light curves have no feature row and are ignored",
            light_curves.len()
        );
    }
    stars
}

/// Split `items` into `k` contiguous chunks, the first `len % k` of them one item longer.
///
/// Chunk sizes are those of `numpy.array_split`: with `k > len` the trailing chunks are empty.
pub fn partition<T>(items: Vec<T>, k: usize) -> Vec<Vec<T>> {
    let k = k.max(1);
    let base = items.len() / k;
    let extra = items.len() % k;

    let mut rest = items.into_iter();
    (0..k)
        .map(|i| {
            let size = base + usize::from(i < extra);
            rest.by_ref().take(size).collect()
        })
        .collect()
}

/// Per-star results of a batch run.
#[derive(Debug)]
pub struct BatchReport<T> {
    results: HashMap<StarId, Result<T, LcAugmentError>, RandomState>,
}

impl<T> BatchReport<T> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, id: &StarId) -> Option<&Result<T, LcAugmentError>> {
        self.results.get(id)
    }

    /// Ids of the failed stars, sorted.
    pub fn failed_ids(&self) -> Vec<&StarId> {
        let mut ids: Vec<&StarId> = self
            .results
            .iter()
            .filter_map(|(id, res)| res.is_err().then_some(id))
            .collect();
        ids.sort();
        ids
    }

    /// Successful results, sorted by star id.
    pub fn successes(&self) -> Vec<(&StarId, &T)> {
        let mut ok: Vec<(&StarId, &T)> = self
            .results
            .iter()
            .filter_map(|(id, res)| res.as_ref().ok().map(|v| (id, v)))
            .collect();
        ok.sort_by(|a, b| a.0.cmp(b.0));
        ok
    }

    pub fn n_failed(&self) -> usize {
        self.results.values().filter(|r| r.is_err()).count()
    }

    pub fn n_success(&self) -> usize {
        self.len() - self.n_failed()
    }

    pub fn into_inner(self) -> HashMap<StarId, Result<T, LcAugmentError>, RandomState> {
        self.results
    }
}

impl BatchReport<AugmentationOutcome> {
    /// Augmented tables of every successful star, concatenated in star-id order.
    pub fn table(&self) -> Vec<ExportRow> {
        self.successes()
            .into_iter()
            .flat_map(|(_, out)| out.table.iter().cloned())
            .collect()
    }

    /// Period traces of every successful star, concatenated in star-id order.
    pub fn trace(&self) -> Vec<PeriodTrace> {
        self.successes()
            .into_iter()
            .flat_map(|(_, out)| out.trace.iter().cloned())
            .collect()
    }
}

impl BatchReport<Option<ReconstructionOutcome>> {
    /// Reconstruction rows of the stars that were processed, in star-id order.
    pub fn rows(&self) -> Vec<ReconstructionOutcome> {
        self.successes()
            .into_iter()
            .filter_map(|(_, out)| out.clone())
            .collect()
    }

    /// `(recovered, processed)` counts.
    pub fn recovery_rate(&self) -> (usize, usize) {
        let rows = self.rows();
        (rows.iter().filter(|r| r.recovered).count(), rows.len())
    }
}

/// Shared fork-join driver: SNR filter, per-star work, failure isolation, progress.
fn run_per_star<T, F>(
    label: &str,
    stars: Vec<StarInput>,
    params: &BatchParams,
    work: F,
) -> BatchReport<T>
where
    T: Send,
    F: Fn(StarInput) -> Result<T, LcAugmentError> + Sync,
{
    info!(
        "{label}: {} stars in {} chunks",
        stars.len(),
        params.n_chunks
    );
    let progress = Progress::new(stars.len());

    let results: HashMap<StarId, Result<T, LcAugmentError>, RandomState> =
        partition(stars, params.n_chunks)
            .into_par_iter()
            .flat_map_iter(|chunk| {
                chunk
                    .into_iter()
                    .map(|mut star| {
                        let started = Instant::now();
                        let id = star.id().clone();
                        if let Some(threshold) = params.snr_threshold {
                            retain_snr(&mut star.observations, threshold);
                        }
                        let res = if star.observations.is_empty() {
                            Err(LcAugmentError::EmptyObservationSet)
                        } else {
                            work(star)
                        };
                        if let Err(e) = &res {
                            warn!("{label}: star {id} failed: {e}");
                        }
                        progress.star_done(started.elapsed());
                        (id, res)
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

    progress.finish();
    let report = BatchReport { results };
    info!(
        "{label}: {} succeeded, {} failed",
        report.n_success(),
        report.n_failed()
    );
    report
}

/// Minimum observation count of every star.
///
/// The shuffle of each star uses `search.seed`.
pub fn run_min_observations<E>(
    stars: Vec<StarInput>,
    estimator: &E,
    search: &SearchParams,
    params: &BatchParams,
) -> BatchReport<usize>
where
    E: PeriodEstimator + ?Sized,
{
    run_per_star("min-obs", stars, params, |star| {
        min_observations(
            star.features.id,
            &star.observations,
            star.features.period_catalog,
            estimator,
            search,
        )
    })
}

/// Augment every star with a fresh model from `model_factory`.
pub fn run_augmentation<E, M, F>(
    stars: Vec<StarInput>,
    engine: &AugmentationEngine<E>,
    model_factory: F,
    params: &BatchParams,
) -> BatchReport<AugmentationOutcome>
where
    E: PeriodEstimator,
    M: RegressionModel,
    F: Fn() -> M + Sync,
{
    run_per_star("augment", stars, params, |star| {
        let catalog_fit = star.features.period_fit;
        let mut lc = PeriodicLightCurve::with_model(
            star.features.id,
            star.observations,
            star.features.period_catalog,
            model_factory(),
            params.seed,
        )?;
        engine.augment(&mut lc, catalog_fit)
    })
}

/// Period reconstruction of every star; stars need a `min_obs` value.
pub fn run_reconstruction<E, M, F>(
    stars: Vec<StarInput>,
    estimator: &E,
    model_factory: F,
    reconstruction: &ReconstructionParams,
    params: &BatchParams,
) -> BatchReport<Option<ReconstructionOutcome>>
where
    E: PeriodEstimator + ?Sized,
    M: RegressionModel,
    F: Fn() -> M + Sync,
{
    run_per_star("reconstruct", stars, params, |star| {
        let min_obs = star
            .features
            .min_obs
            .ok_or_else(|| LcAugmentError::MissingReference(format!("{} (min_obs)", star.id())))?;
        let mut lc = PeriodicLightCurve::with_model(
            star.features.id,
            star.observations,
            star.features.period_catalog,
            model_factory(),
            params.seed,
        )?;
        reconstruct_period(&mut lc, min_obs, estimator, reconstruction)
    })
}

#[cfg(test)]
mod batch_tests {
    use super::*;

    #[test]
    fn test_partition_array_split() {
        let sizes = |n: usize, k: usize| -> Vec<usize> {
            partition((0..n).collect::<Vec<_>>(), k)
                .iter()
                .map(Vec::len)
                .collect()
        };
        assert_eq!(sizes(10, 3), vec![4, 3, 3]);
        assert_eq!(sizes(11, 4), vec![3, 3, 3, 2]);
        assert_eq!(sizes(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(sizes(0, 2), vec![0, 0]);

        let chunks = partition((0..7).collect::<Vec<_>>(), 3);
        assert_eq!(chunks, vec![vec![0, 1, 2], vec![3, 4], vec![5, 6]]);
    }

    #[test]
    fn test_params_validation() {
        assert!(BatchParams::builder().n_chunks(0).build().is_err());
        assert!(BatchParams::builder()
            .snr_threshold(Some(-1.0))
            .build()
            .is_err());
        let p = BatchParams::builder().snr_threshold(Some(20.0)).build().unwrap();
        assert_eq!(p.n_chunks, 10);
        assert_eq!(p.seed, 999);
    }

    #[test]
    fn test_join_catalog() {
        let mut lcs = LightCurveSet::default();
        lcs.insert(StarId::Int(1), vec![Observation::new(0.0, 15.0, 0.1)]);
        lcs.insert(StarId::Int(3), vec![Observation::new(0.0, 15.0, 0.1)]);
        let features = vec![
            StarFeatures {
                id: StarId::Int(1),
                period_catalog: 0.5,
                period_fit: None,
                min_obs: None,
            },
            StarFeatures {
                id: StarId::Int(2),
                period_catalog: 0.7,
                period_fit: None,
                min_obs: None,
            },
        ];
        let stars = join_catalog(lcs, features);
        assert_eq!(stars.len(), 2);
        assert_eq!(stars[0].observations.len(), 1);
        assert!(stars[1].observations.is_empty());
    }

    #[test]
    fn test_join_catalog_keeps_first_duplicate_row() {
        let mut lcs = LightCurveSet::default();
        lcs.insert(StarId::Int(1), vec![Observation::new(0.0, 15.0, 0.1); 3]);
        let row = |period_catalog| StarFeatures {
            id: StarId::Int(1),
            period_catalog,
            period_fit: None,
            min_obs: None,
        };
        let stars = join_catalog(lcs, vec![row(0.55), row(0.9)]);
        assert_eq!(stars.len(), 1);
        assert_eq!(stars[0].features.period_catalog, 0.55);
        assert_eq!(stars[0].observations.len(), 3);
    }
}

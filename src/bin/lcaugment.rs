use anyhow::{bail, Context, Result};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use flexi_logger::Logger;
use log::{info, warn};

use lcaugment::{
    augmentation::{AugmentParams, AugmentationEngine},
    batch::{
        join_catalog, run_augmentation, run_min_observations, run_reconstruction, BatchParams,
        BatchReport, StarInput,
    },
    catalog::{read_light_curves_path, write_rows_path, FeatureTable, MIN_OBS_COLUMN},
    constants::{DEFAULT_SEED, PERIOD_REL_TOL},
    min_observations::SearchParams,
    period::lomb_scargle::LombScargle,
    reconstruction::ReconstructionParams,
    regression::gaussian_process::{GaussianProcess, GpNoise, GpParams},
};

#[derive(Parser)]
#[command(name = "lcaugment")]
#[command(about = "Light-curve augmentation and minimum-observation analysis")]
struct Cli {
    /// Log level or flexi_logger spec (e.g. "info", "debug,lcaugment::batch=trace")
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs and batch options shared by every subcommand.
#[derive(Args)]
struct CatalogArgs {
    /// Observation table (id, hjd, mag, err)
    #[arg(long)]
    lc: Utf8PathBuf,

    /// Feature table (id, period_catalog, ...)
    #[arg(long)]
    features: Utf8PathBuf,

    /// Output table
    #[arg(long)]
    out: Utf8PathBuf,

    /// Drop observations with 1/err below this threshold
    #[arg(long)]
    snr: Option<f64>,

    /// Number of chunks processed in parallel
    #[arg(long, default_value_t = 10)]
    chunks: usize,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
}

impl CatalogArgs {
    fn batch_params(&self) -> Result<BatchParams> {
        Ok(BatchParams::builder()
            .n_chunks(self.chunks)
            .seed(self.seed)
            .snr_threshold(self.snr)
            .build()?)
    }

    fn load(&self) -> Result<(FeatureTable, Vec<StarInput>)> {
        let light_curves = read_light_curves_path(&self.lc)
            .with_context(|| format!("reading observations from {}", self.lc))?;
        let table = FeatureTable::from_path(&self.features)
            .with_context(|| format!("reading features from {}", self.features))?;
        let stars = join_catalog(light_curves, table.stars()?);
        Ok((table, stars))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add synthetic observations to every light curve
    Augment {
        #[command(flatten)]
        catalog: CatalogArgs,

        #[arg(long, default_value_t = 5)]
        rounds: usize,

        /// Synthetic points per round
        #[arg(long, default_value_t = 2)]
        points: usize,

        /// Re-estimate the period after every round
        #[arg(long)]
        track_period: bool,

        /// Period trace output (requires --track-period)
        #[arg(long)]
        trace: Option<Utf8PathBuf>,

        /// GP noise model: "measurement" or "white"
        #[arg(long, default_value = "measurement")]
        noise: GpNoise,
    },

    /// Minimum number of observations that keeps the catalog period
    MinObs {
        #[command(flatten)]
        catalog: CatalogArgs,

        #[arg(long, default_value_t = PERIOD_REL_TOL)]
        rel_tol: f64,
    },

    /// Rebuild the period of subsampled light curves with synthetic points
    Reconstruct {
        #[command(flatten)]
        catalog: CatalogArgs,

        #[arg(long, default_value_t = 20)]
        iterations: usize,

        /// Synthetic points per iteration
        #[arg(long, default_value_t = 1)]
        synthetic: usize,
    },
}

fn report_failures<T>(report: &BatchReport<T>) {
    let failed = report.failed_ids();
    if !failed.is_empty() {
        let ids: Vec<String> = failed.iter().map(|id| id.to_string()).collect();
        warn!("{} stars failed: {}", failed.len(), ids.join(", "));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logger = Logger::try_with_str(&cli.log_level)
        .context("invalid log level")?
        .start()
        .context("logger initialization failed")?;

    match cli.command {
        Commands::Augment {
            catalog,
            rounds,
            points,
            track_period,
            trace,
            noise,
        } => {
            if trace.is_some() && !track_period {
                bail!("--trace requires --track-period");
            }
            let batch = catalog.batch_params()?;
            let params = AugmentParams::builder()
                .rounds(rounds)
                .points_per_round(points)
                .track_period(track_period)
                .build()?;
            let gp = GpParams::builder().noise(noise).build()?;
            let (_, stars) = catalog.load()?;

            let engine = AugmentationEngine::new(params, LombScargle::default());
            let report = run_augmentation(stars, &engine, || GaussianProcess::new(gp.clone()), &batch);

            write_rows_path(&catalog.out, &report.table())?;
            if let Some(path) = trace {
                write_rows_path(&path, &report.trace())?;
            }
            report_failures(&report);
        }

        Commands::MinObs { catalog, rel_tol } => {
            let batch = catalog.batch_params()?;
            let search = SearchParams::builder()
                .rel_tol(rel_tol)
                .seed(catalog.seed)
                .build()?;
            let (mut table, stars) = catalog.load()?;

            let report = run_min_observations(stars, &LombScargle::default(), &search, &batch);
            table.set_column(MIN_OBS_COLUMN, |id| match report.get(id) {
                Some(Ok(n)) => Some(n.to_string()),
                _ => None,
            });
            table.to_path(&catalog.out)?;
            report_failures(&report);
        }

        Commands::Reconstruct {
            catalog,
            iterations,
            synthetic,
        } => {
            let batch = catalog.batch_params()?;
            let params = ReconstructionParams::builder()
                .iterations(iterations)
                .synthetic_per_iteration(synthetic)
                .build()?;
            let (table, stars) = catalog.load()?;
            if !table.has_column(MIN_OBS_COLUMN) {
                bail!("{} has no {MIN_OBS_COLUMN} column", catalog.features);
            }

            let report = run_reconstruction(
                stars,
                &LombScargle::default(),
                GaussianProcess::default,
                &params,
                &batch,
            );
            let (recovered, processed) = report.recovery_rate();
            info!("period recovered for {recovered} of {processed} stars");

            write_rows_path(&catalog.out, &report.rows())?;
            report_failures(&report);
        }
    }
    Ok(())
}

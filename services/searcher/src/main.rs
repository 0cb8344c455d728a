//! asha-search
//!
//! Runs an asynchronous successive halving search against the synthetic
//! evaluator and prints the outcome as JSON on stdout. Logs go to stderr.
//!
//! Configuration is layered: TOML file, then `HALVING_*` environment
//! variables, then command line flags.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use halving_events::{EventSink, NullSink, TracingSink};
use halving_searcher::synthetic::{SyntheticCandidate, SyntheticEvaluator, SyntheticFactory};
use halving_searcher::{AshaScheduler, ProblemShape, SearchConfig};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Asynchronous successive halving search over synthetic candidates.
#[derive(Debug, Parser)]
#[command(name = "asha-search")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML file with search hyperparameters.
    #[arg(long, env = "HALVING_CONFIG")]
    config: Option<PathBuf>,

    /// Search time budget in seconds.
    #[arg(long, default_value_t = 60.0)]
    time_budget: f64,

    /// Number of training samples. Used as the default top-rung budget.
    #[arg(long)]
    n_samples: Option<u64>,

    #[arg(long)]
    reduction_factor: Option<u64>,

    #[arg(long)]
    minimum_resource: Option<u64>,

    #[arg(long)]
    maximum_resource: Option<u64>,

    #[arg(long)]
    minimum_early_stopping_rate: Option<u32>,

    /// Stop after this many top-rung evaluations.
    #[arg(long)]
    max_full_evaluations: Option<usize>,

    /// Number of evaluations kept in flight.
    #[arg(long)]
    window_size: Option<usize>,

    #[arg(long)]
    max_fresh_retries: Option<usize>,

    /// Default log level when RUST_LOG is unset.
    #[arg(long, env = "HALVING_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    /// Seed for candidate generation. Random if omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated seconds per unit of budget.
    #[arg(long, default_value_t = 0.0001)]
    seconds_per_unit: f64,

    /// Noise amplitude of synthetic losses.
    #[arg(long, default_value_t = 1.0)]
    noise: f64,

    /// Log every search event.
    #[arg(long)]
    trace_events: bool,
}

impl Cli {
    fn overrides(&self) -> SearchConfig {
        SearchConfig {
            reduction_factor: self.reduction_factor,
            minimum_resource: self.minimum_resource,
            maximum_resource: self.maximum_resource,
            minimum_early_stopping_rate: self.minimum_early_stopping_rate,
            max_full_evaluations: self.max_full_evaluations,
            window_size: self.window_size,
            max_fresh_retries: self.max_fresh_retries,
        }
    }

    fn search_config(&self) -> Result<SearchConfig> {
        let file = match &self.config {
            Some(path) => SearchConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => SearchConfig::default(),
        };
        let env = SearchConfig::from_env().context("invalid HALVING_* environment variable")?;
        Ok(file.merge(env).merge(self.overrides()))
    }
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Resolves on ctrl-c. If the handler cannot be installed the search runs
/// until its own deadline.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => warn!("Received shutdown signal, stopping search"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    let config = cli.search_config()?;
    let shape = ProblemShape {
        n_samples: cli.n_samples,
    };
    let time_budget = Duration::try_from_secs_f64(cli.time_budget)
        .with_context(|| format!("invalid time budget {}", cli.time_budget))?;

    let factory = match cli.seed {
        Some(seed) => SyntheticFactory::seeded(seed),
        None => SyntheticFactory::from_entropy(),
    };
    let evaluator = SyntheticEvaluator::new(cli.seconds_per_unit, cli.noise);
    let sink: Arc<dyn EventSink> = if cli.trace_events {
        Arc::new(TracingSink)
    } else {
        Arc::new(NullSink)
    };

    let scheduler = AshaScheduler::<SyntheticCandidate>::from_config(
        &config,
        &shape,
        Arc::new(evaluator),
        Box::new(factory),
    )
    .context("invalid search configuration")?
    .with_event_sink(sink);

    info!(
        search_id = %scheduler.search_id(),
        seed = ?cli.seed,
        "Configuration loaded"
    );

    let outcome = scheduler
        .run_with_shutdown(Vec::new(), time_budget, shutdown_signal())
        .await
        .context("search failed")?;

    let report = outcome.report();
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to serialize outcome")?
    );

    Ok(())
}

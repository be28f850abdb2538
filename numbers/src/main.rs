mod config;
mod logging;
mod statsd;

use clap::Parser;
use config::{Config, ConfigError};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about = "Merges number lists served by upstream URLs")]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// HTTP server port, overrides the config file
    #[arg(long)]
    port: Option<u16>,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid sentry dsn: {0}")]
    Logging(#[from] sentry::types::ParseDsnError),
    #[error(transparent)]
    Metrics(#[from] statsd::MetricsError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Aggregator(#[from] aggregator::errors::AggregatorError),
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(port) = cli.port {
        config.aggregator.listener.port = port;
    }

    // Sentry has to be set up before the runtime starts
    let _sentry = logging::init(config.common.logging.as_ref())?;

    if let Some(metrics_config) = &config.common.metrics {
        statsd::init(metrics_config)?;
    }

    tracing::info!(
        port = config.aggregator.listener.port,
        "Starting numbers server"
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(aggregator::run(config.aggregator))?;

    tracing::info!("Finished numbers server");
    Ok(())
}

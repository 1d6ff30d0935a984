//! # Scene Streamer CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Configuration loading and validation
//! - Dataset / synthetic store selection
//! - Scene loop and viewer endpoint lifecycle with graceful shutdown

mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use observability::{ObservabilityConfig, ObservabilitySettings};
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_streamer, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Scene Streamer CLI starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_streamer(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Logging from the config file's `observability` section, with CLI flags on
/// top. The metrics exporter is started by `run` only.
fn init_logging(cli: &Cli) -> Result<()> {
    let settings = cli
        .command
        .config_path()
        .and_then(|path| config_loader::ConfigLoader::load_from_path(path).ok())
        .map(|config| config.observability)
        .unwrap_or_default();

    observability::init_with_config(logging_config(cli, &settings))
}

fn logging_config(cli: &Cli, settings: &ObservabilitySettings) -> ObservabilityConfig {
    let mut config = ObservabilityConfig::from(settings);
    config.metrics_port = None;

    if let Some(format) = cli.log_format {
        config.log_format = format.into();
    }
    config.default_log_level = if cli.quiet {
        "warn".to_string()
    } else {
        match cli.verbose {
            0 => config.default_log_level,
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    config
}

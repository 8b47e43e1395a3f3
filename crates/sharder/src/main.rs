//! sharder entry point

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use sharder::cli::{Cli, Command, ShardArgs};
use sharder::{validate, OutputFormat, ShardConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Command::Version => {
            println!("sharder version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Shard(args) => run_shard(&cli, args).await,
    }
}

async fn run_shard(cli: &Cli, args: &ShardArgs) -> anyhow::Result<()> {
    // Layer file, environment and flags
    let config_path = ShardConfig::locate(cli.config.as_deref());
    let mut config = ShardConfig::load(config_path.as_deref()).context("failed to load configuration")?;
    args.apply_to(&mut config);

    validate(&config)?;

    init_logging(&config.log_level, config.log_export_path())?;
    if let Some(path) = &config_path {
        info!("Using config file: {}", path.display());
    }

    let format: OutputFormat = config.output_format.parse()?;
    let result = sharder::shard(&config).await?;

    info!(
        "Distributed {} IDs into {} shards using {}",
        result.metadata.total_ids_fetched, result.metadata.shard_count, result.metadata.strategy
    );

    result.write(format, config.output_path())?;
    Ok(())
}

/// Human-readable logs go to stderr so stdout carries only the shard document.
/// With an export path the same events are appended to that file as well.
fn init_logging(log_level: &str, export_path: Option<&Path>) -> anyhow::Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::WARN,
    };

    let export = match export_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log export file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(level)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(export)
        .try_init()?;
    Ok(())
}

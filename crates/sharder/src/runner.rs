//! One sharding run: fetch, partition, render
//!
//! The configuration is expected to have passed [`crate::validate`].

use chrono::Utc;
use tracing::{debug, info};

use shard_core::{run, EngineError, ShardRequest};

use crate::config::ShardConfig;
use crate::output::ShardResult;
use crate::source::{build_source, IdSource, SourceError};

/// Run errors
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Fetch from the configured source and shard the result
pub async fn shard(config: &ShardConfig) -> Result<ShardResult, RunError> {
    let source = build_source(config)?;
    shard_from(config, source.as_ref()).await
}

/// Fetch from `source` and shard the result
pub async fn shard_from(config: &ShardConfig, source: &dyn IdSource) -> Result<ShardResult, RunError> {
    let strategy = config.strategy()?;

    info!("Fetching IDs from {}", source.describe());
    let ids = source.fetch_ids().await?;
    debug!("Fetched {} IDs", ids.len());

    let request = ShardRequest::new(ids, strategy)
        .with_exclusions(config.exclude_ids.clone())
        .with_reservations(config.reservation_map())
        .with_seed(config.seed.clone());
    let assignment = run(&request)?;

    Ok(ShardResult::new(assignment, config, Utc::now()))
}

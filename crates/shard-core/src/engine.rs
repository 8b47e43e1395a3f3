//! Partition pipeline
//!
//! partition → distribute → assemble, run synchronously over in-memory
//! input. Every failure is returned before any shard output exists.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::info;

use crate::assemble::{assemble, ShardAssignment};
use crate::id::ShardIndex;
use crate::partition::{partition, PartitionError};
use crate::strategy::{ShardSize, Strategy, StrategyKind, UnknownStrategy};

/// Engine errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Partition(#[from] PartitionError),
    #[error(transparent)]
    UnknownStrategy(#[from] UnknownStrategy),
}

/// Input of one sharding run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardRequest {
    /// Fetched identifier pool
    pub ids: Vec<String>,
    /// IDs removed before anything else
    pub exclusions: Vec<String>,
    /// IDs pinned to a shard index
    pub reservations: BTreeMap<ShardIndex, Vec<String>>,
    /// Seed string, empty for none
    pub seed: String,
    pub strategy: Strategy,
}

impl ShardRequest {
    pub fn new(ids: Vec<String>, strategy: Strategy) -> Self {
        Self {
            ids,
            exclusions: Vec::new(),
            reservations: BTreeMap::new(),
            seed: String::new(),
            strategy,
        }
    }

    pub fn with_exclusions(mut self, exclusions: Vec<String>) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_reservations(mut self, reservations: BTreeMap<ShardIndex, Vec<String>>) -> Self {
        self.reservations = reservations;
        self
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = seed.into();
        self
    }
}

/// Resolve a strategy name and its parameters
pub fn resolve_strategy(
    name: &str,
    shard_count: usize,
    percentages: &[u32],
    sizes: &[ShardSize],
) -> Result<Strategy, EngineError> {
    let kind: StrategyKind = name.parse()?;
    Ok(Strategy::from_parts(kind, shard_count, percentages, sizes))
}

/// Run the full pipeline
pub fn run(request: &ShardRequest) -> Result<ShardAssignment, EngineError> {
    let shard_count = request.strategy.shard_count();

    let pool = partition(
        &request.ids,
        &request.exclusions,
        &request.reservations,
        shard_count,
    )?;
    let distributed = request.strategy.distribute(&pool, &request.seed);
    let assignment = assemble(distributed, &pool);

    let stats = assignment.stats();
    info!(
        "Sharded {} IDs into {} shards with {} (excluded={}, reserved={}, distributed={})",
        stats.total_fetched,
        stats.shard_count,
        request.strategy.kind(),
        stats.excluded,
        stats.reserved,
        stats.distributed
    );

    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> Vec<String> {
        (1..=n).map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_resolve_strategy() {
        let strategy = resolve_strategy("size", 0, &[], &[ShardSize::Exact(2), ShardSize::Remainder]).unwrap();
        assert_eq!(strategy.kind(), StrategyKind::Size);
        assert_eq!(strategy.shard_count(), 2);

        let strategy = resolve_strategy("rendezvous", 5, &[10, 90], &[]).unwrap();
        assert_eq!(strategy, Strategy::Rendezvous { shard_count: 5 });
    }

    #[test]
    fn test_unknown_strategy_is_fatal() {
        let err = resolve_strategy("random", 3, &[], &[]).unwrap_err();
        assert!(matches!(err, EngineError::UnknownStrategy(ref e) if e.name == "random"));
    }

    #[test]
    fn test_run_end_to_end() {
        let mut reservations = BTreeMap::new();
        reservations.insert(2, vec!["5".to_string()]);

        let request = ShardRequest::new(pool(12), Strategy::RoundRobin { shard_count: 3 })
            .with_exclusions(vec!["1".to_string(), "99".to_string()])
            .with_reservations(reservations)
            .with_seed("rollout");

        let assignment = run(&request).unwrap();
        let stats = assignment.stats();
        assert_eq!(stats.total_fetched, 12);
        assert_eq!(stats.excluded, 1);
        assert_eq!(stats.reserved, 1);
        assert_eq!(stats.distributed, 10);
        assert_eq!(stats.shard_count, 3);
        assert_eq!(assignment.shard_of("5"), Some(2));
        assert_eq!(assignment.shard_of("1"), None);
    }

    #[test]
    fn test_run_rejects_out_of_range_reservation() {
        let mut reservations = BTreeMap::new();
        reservations.insert(4, vec!["2".to_string()]);
        let request = ShardRequest::new(pool(5), Strategy::Rendezvous { shard_count: 2 })
            .with_reservations(reservations);

        let err = run(&request).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Partition(PartitionError::ShardOutOfRange { shard: 4, shard_count: 2 })
        ));
    }
}

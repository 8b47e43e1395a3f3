//! Core partition engine
//!
//! Splits an identifier pool into disjoint, reproducible shards:
//! - Exclusions and reservations are applied first (`partition`)
//! - The remaining pool is spread by one of four strategies (`strategy`)
//! - Reserved IDs are merged back and every bucket is sorted (`assemble`)
//!
//! The engine performs no I/O. `engine::run` chains the stages.

pub mod assemble;
pub mod engine;
pub mod id;
pub mod partition;
pub mod rng;
pub mod sequence;
pub mod strategy;

// Re-export commonly used types
pub use assemble::{RunStats, ShardAssignment};
pub use engine::{resolve_strategy, run, EngineError, ShardRequest};
pub use id::{numeric_cmp, parse_shard_name, shard_name, sort_numerically, ShardIndex};
pub use partition::{Partition, PartitionError};
pub use rng::LaggedFibonacci;
pub use sequence::sequence;
pub use strategy::{ShardSize, Strategy, StrategyKind, UnknownStrategy};

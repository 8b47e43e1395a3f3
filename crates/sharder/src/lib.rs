//! Rollout sharder
//!
//! Pulls an identifier pool from Jamf Pro (or a local file), hands it to the
//! `shard_core` engine and renders the shard map as JSON or YAML.

pub mod cli;
pub mod config;
pub mod output;
pub mod runner;
pub mod source;
pub mod validate;

pub use config::{ConfigError, ShardConfig};
pub use output::{OutputError, OutputFormat, ShardMap, ShardMetadata, ShardResult};
pub use runner::{shard, RunError};
pub use source::{IdSource, SourceError, SourceType};
pub use validate::{validate, ValidationError};

//! Command line interface
//!
//! Every `shard` flag mirrors one configuration key and, when given, wins
//! over the environment and the config file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{parse_reserved_ids, ShardConfig};

/// Shard Jamf Pro device and user IDs into rollout groups
#[derive(Parser, Debug)]
#[command(name = "sharder")]
#[command(about = "Shard Jamf Pro device and user IDs into configurable groups")]
pub struct Cli {
    /// Config file (YAML or JSON), default ./sharder.yaml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Retrieve IDs and distribute them into shards
    Shard(ShardArgs),
    /// Print the version
    Version,
}

/// Flags of the `shard` subcommand
#[derive(Args, Debug, Default, Clone, PartialEq, Eq)]
pub struct ShardArgs {
    /// Jamf Pro instance domain (e.g. company.jamfcloud.com)
    #[arg(long)]
    pub instance_domain: Option<String>,

    /// Authentication method: oauth2 or basic
    #[arg(long)]
    pub auth_method: Option<String>,

    /// OAuth2 client ID
    #[arg(long)]
    pub client_id: Option<String>,

    /// OAuth2 client secret
    #[arg(long)]
    pub client_secret: Option<String>,

    /// Basic auth username
    #[arg(long = "username")]
    pub basic_auth_username: Option<String>,

    /// Basic auth password
    #[arg(long = "password")]
    pub basic_auth_password: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    pub log_level: Option<String>,

    /// Additional log file, appended alongside stderr
    #[arg(long)]
    pub log_export_path: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long = "custom-timeout")]
    pub custom_timeout_seconds: Option<u64>,

    /// Maximum number of retries per request
    #[arg(long)]
    pub max_retry_attempts: Option<u32>,

    /// Page size for paginated inventory requests
    #[arg(long)]
    pub page_size: Option<u32>,

    /// computer_inventory, mobile_device_inventory, computer_group_membership,
    /// mobile_device_group_membership, user_accounts or file
    #[arg(long)]
    pub source_type: Option<String>,

    /// Group ID for *_group_membership sources
    #[arg(long)]
    pub group_id: Option<String>,

    /// ID list for the file source
    #[arg(long)]
    pub id_file: Option<String>,

    /// round-robin | percentage | size | rendezvous
    #[arg(long)]
    pub strategy: Option<String>,

    /// Number of shards (round-robin and rendezvous)
    #[arg(long, allow_negative_numbers = true)]
    pub shard_count: Option<i64>,

    /// Percentages summing to 100, e.g. 10,30,60
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub shard_percentages: Option<Vec<i64>>,

    /// Absolute shard sizes, -1 last for the remainder, e.g. 50,200,-1
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub shard_sizes: Option<Vec<i64>>,

    /// Seed for deterministic distribution
    #[arg(long)]
    pub seed: Option<String>,

    /// IDs excluded from all shards, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub exclude_ids: Option<Vec<String>>,

    /// JSON map of shard names to pinned IDs, e.g. '{"shard_0":["101"]}'
    #[arg(long, value_parser = parse_reserved_ids)]
    pub reserved_ids: Option<BTreeMap<String, Vec<String>>>,

    /// Output format: json or yaml
    #[arg(short = 'o', long = "output")]
    pub output_format: Option<String>,

    /// Write output to this file instead of stdout
    #[arg(long)]
    pub output_file: Option<String>,
}

impl ShardArgs {
    /// Override `config` with every flag that was given
    pub fn apply_to(&self, config: &mut ShardConfig) {
        if let Some(v) = &self.instance_domain {
            config.instance_domain = v.clone();
        }
        if let Some(v) = &self.auth_method {
            config.auth_method = v.clone();
        }
        if let Some(v) = &self.client_id {
            config.client_id = v.clone();
        }
        if let Some(v) = &self.client_secret {
            config.client_secret = v.clone();
        }
        if let Some(v) = &self.basic_auth_username {
            config.basic_auth_username = v.clone();
        }
        if let Some(v) = &self.basic_auth_password {
            config.basic_auth_password = v.clone();
        }
        if let Some(v) = &self.log_level {
            config.log_level = v.clone();
        }
        if let Some(v) = &self.log_export_path {
            config.log_export_path = v.clone();
        }
        if let Some(v) = self.custom_timeout_seconds {
            config.custom_timeout_seconds = v;
        }
        if let Some(v) = self.max_retry_attempts {
            config.max_retry_attempts = v;
        }
        if let Some(v) = self.page_size {
            config.page_size = v;
        }
        if let Some(v) = &self.source_type {
            config.source_type = v.clone();
        }
        if let Some(v) = &self.group_id {
            config.group_id = v.clone();
        }
        if let Some(v) = &self.id_file {
            config.id_file = v.clone();
        }
        if let Some(v) = &self.strategy {
            config.strategy = v.clone();
        }
        if let Some(v) = self.shard_count {
            config.shard_count = v;
        }
        if let Some(v) = &self.shard_percentages {
            config.shard_percentages = v.clone();
        }
        if let Some(v) = &self.shard_sizes {
            config.shard_sizes = v.clone();
        }
        if let Some(v) = &self.seed {
            config.seed = v.clone();
        }
        if let Some(v) = &self.exclude_ids {
            config.exclude_ids = v.clone();
        }
        if let Some(v) = &self.reserved_ids {
            config.reserved_ids = v.clone();
        }
        if let Some(v) = &self.output_format {
            config.output_format = v.clone();
        }
        if let Some(v) = &self.output_file {
            config.output_file = v.clone();
        }
    }
}

//! Configuration for the sharder
//!
//! Values are layered: built-in defaults, then a YAML or JSON file, then
//! `JAMF_*` environment variables, then command line flags (see `cli`).

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use shard_core::{parse_shard_name, resolve_strategy, EngineError, ShardIndex, ShardSize, Strategy};

/// File picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "sharder.yaml";

/// Prefix of environment variable overrides (`JAMF_INSTANCE_DOMAIN`, ...)
pub const ENV_PREFIX: &str = "JAMF_";

/// Complete sharder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardConfig {
    /// Jamf Pro host, or a full `http(s)://` base URL
    pub instance_domain: String,
    /// `oauth2` or `basic`
    pub auth_method: String,
    pub client_id: String,
    pub client_secret: String,
    pub basic_auth_username: String,
    pub basic_auth_password: String,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Extra file that receives a copy of the log, appended
    pub log_export_path: String,
    /// Per-request timeout in seconds
    pub custom_timeout_seconds: u64,
    /// Retries for transport errors, 429 and 5xx
    pub max_retry_attempts: u32,
    /// Page size for the paginated computer inventory
    pub page_size: u32,

    pub source_type: String,
    pub group_id: String,
    /// ID list read by the `file` source
    pub id_file: String,

    pub strategy: String,
    pub shard_count: i64,
    pub shard_percentages: Vec<i64>,
    /// Absolute sizes, `-1` as the last element takes the remainder
    pub shard_sizes: Vec<i64>,
    pub seed: String,
    pub exclude_ids: Vec<String>,
    /// `shard_<N>` to pinned IDs
    pub reserved_ids: BTreeMap<String, Vec<String>>,

    /// `json` or `yaml`
    pub output_format: String,
    /// Write here instead of stdout
    pub output_file: String,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            instance_domain: String::new(),
            auth_method: default_auth_method(),
            client_id: String::new(),
            client_secret: String::new(),
            basic_auth_username: String::new(),
            basic_auth_password: String::new(),
            log_level: default_log_level(),
            log_export_path: String::new(),
            custom_timeout_seconds: default_custom_timeout_seconds(),
            max_retry_attempts: default_max_retry_attempts(),
            page_size: default_page_size(),
            source_type: String::new(),
            group_id: String::new(),
            id_file: String::new(),
            strategy: String::new(),
            shard_count: 0,
            shard_percentages: Vec::new(),
            shard_sizes: Vec::new(),
            seed: String::new(),
            exclude_ids: Vec::new(),
            reserved_ids: BTreeMap::new(),
            output_format: default_output_format(),
            output_file: String::new(),
        }
    }
}

impl ShardConfig {
    /// Config file to read: the explicit path, else `./sharder.yaml` if present
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                fallback.exists().then_some(fallback)
            }
        }
    }

    /// Defaults, overlaid by `path` (if any) and then by the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a YAML or JSON file
    ///
    /// `.json` files go through serde_json, everything else through serde_yaml.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Overlay `JAMF_<KEY>` variables from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Overlay `JAMF_<KEY>` variables resolved through `lookup`
    ///
    /// Lists are comma-separated; `JAMF_RESERVED_IDS` is a JSON object.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            let name = env_name(key);
            lookup(&name).map(|value| (name, value))
        };

        let strings = [
            ("instance_domain", &mut self.instance_domain),
            ("auth_method", &mut self.auth_method),
            ("client_id", &mut self.client_id),
            ("client_secret", &mut self.client_secret),
            ("basic_auth_username", &mut self.basic_auth_username),
            ("basic_auth_password", &mut self.basic_auth_password),
            ("log_level", &mut self.log_level),
            ("log_export_path", &mut self.log_export_path),
            ("source_type", &mut self.source_type),
            ("group_id", &mut self.group_id),
            ("id_file", &mut self.id_file),
            ("strategy", &mut self.strategy),
            ("seed", &mut self.seed),
            ("output_format", &mut self.output_format),
            ("output_file", &mut self.output_file),
        ];
        for (key, field) in strings {
            if let Some((_, value)) = var(key) {
                *field = value;
            }
        }

        if let Some((name, value)) = var("custom_timeout_seconds") {
            self.custom_timeout_seconds = parse_value(&name, &value)?;
        }
        if let Some((name, value)) = var("max_retry_attempts") {
            self.max_retry_attempts = parse_value(&name, &value)?;
        }
        if let Some((name, value)) = var("page_size") {
            self.page_size = parse_value(&name, &value)?;
        }
        if let Some((name, value)) = var("shard_count") {
            self.shard_count = parse_value(&name, &value)?;
        }
        if let Some((name, value)) = var("shard_percentages") {
            self.shard_percentages = parse_list(&name, &value)?;
        }
        if let Some((name, value)) = var("shard_sizes") {
            self.shard_sizes = parse_list(&name, &value)?;
        }
        if let Some((name, value)) = var("exclude_ids") {
            self.exclude_ids = parse_list(&name, &value)?;
        }
        if let Some((name, value)) = var("reserved_ids") {
            self.reserved_ids = parse_reserved_ids(&value).map_err(|message| ConfigError::Env {
                key: name,
                message,
            })?;
        }

        Ok(())
    }

    /// Reservations keyed by shard index
    ///
    /// Keys that are not `shard_<N>` are skipped; validation reports them.
    pub fn reservation_map(&self) -> BTreeMap<ShardIndex, Vec<String>> {
        let mut map: BTreeMap<ShardIndex, Vec<String>> = BTreeMap::new();
        for (key, ids) in &self.reserved_ids {
            if let Some(index) = parse_shard_name(key) {
                map.entry(index).or_default().extend(ids.iter().cloned());
            }
        }
        map
    }

    /// Configured strategy with its parameters
    pub fn strategy(&self) -> Result<Strategy, EngineError> {
        let shard_count = usize::try_from(self.shard_count).unwrap_or(0);
        let percentages: Vec<u32> = self
            .shard_percentages
            .iter()
            .map(|&p| u32::try_from(p).unwrap_or(0))
            .collect();
        let sizes: Vec<ShardSize> = self.shard_sizes.iter().map(|&s| ShardSize::from(s)).collect();

        resolve_strategy(&self.strategy, shard_count, &percentages, &sizes)
    }

    /// Per-request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.custom_timeout_seconds)
    }

    /// Log copy destination, if any
    pub fn log_export_path(&self) -> Option<&Path> {
        (!self.log_export_path.is_empty()).then(|| Path::new(&self.log_export_path))
    }

    /// Output path, if output goes to a file
    pub fn output_path(&self) -> Option<&Path> {
        (!self.output_file.is_empty()).then(|| Path::new(&self.output_file))
    }
}

/// Parse the JSON object form of `reserved_ids`
pub fn parse_reserved_ids(raw: &str) -> Result<BTreeMap<String, Vec<String>>, String> {
    serde_json::from_str(raw).map_err(|e| format!("expected a JSON object of shard names to ID lists: {}", e))
}

fn env_name(key: &str) -> String {
    format!("{}{}", ENV_PREFIX, key.to_ascii_uppercase())
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        key: name.to_string(),
        message: format!("{:?}: {}", raw, e),
    })
}

fn parse_list<T>(name: &str, raw: &str) -> Result<Vec<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_value(name, item))
        .collect()
}

// Default value functions

fn default_auth_method() -> String {
    "oauth2".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_custom_timeout_seconds() -> u64 {
    60
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_page_size() -> u32 {
    100
}

fn default_output_format() -> String {
    "json".to_string()
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("invalid value for {key}: {message}")]
    Env { key: String, message: String },
}

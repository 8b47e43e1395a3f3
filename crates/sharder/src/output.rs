//! Shard result rendering
//!
//! JSON output is pretty-printed with a trailing newline. Shards are keyed
//! `shard_0`, `shard_1`, ... in index order in both formats.

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::info;

use shard_core::{shard_name, ShardAssignment};

use crate::config::ShardConfig;

/// Output error
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("unknown output format {0:?}: must be 'json' or 'yaml'")]
    UnknownFormat(String),
    #[error("failed to marshal output as json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to marshal output as yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to write output to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            other => Err(OutputError::UnknownFormat(other.to_string())),
        }
    }
}

/// Parameters and statistics of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardMetadata {
    pub generated_at: DateTime<Utc>,
    pub source_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub group_id: String,
    pub strategy: String,
    pub seed: String,
    pub total_ids_fetched: usize,
    pub excluded_id_count: usize,
    pub reserved_id_count: usize,
    pub unreserved_ids_distributed: usize,
    pub shard_count: usize,
}

/// Shard buckets, serialized as a `shard_<N>` map in index order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardMap(Vec<Vec<String>>);

impl ShardMap {
    pub fn new(shards: Vec<Vec<String>>) -> Self {
        Self(shards)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// IDs of shard `index`
    pub fn get(&self, index: usize) -> Option<&[String]> {
        self.0.get(index).map(Vec::as_slice)
    }
}

impl Serialize for ShardMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (index, ids) in self.0.iter().enumerate() {
            map.serialize_entry(&shard_name(index), ids)?;
        }
        map.end()
    }
}

/// Top-level output document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardResult {
    pub metadata: ShardMetadata,
    pub shards: ShardMap,
}

impl ShardResult {
    /// Combine an engine assignment with the run parameters
    pub fn new(assignment: ShardAssignment, config: &ShardConfig, generated_at: DateTime<Utc>) -> Self {
        let stats = assignment.stats();
        let metadata = ShardMetadata {
            generated_at,
            source_type: config.source_type.clone(),
            group_id: config.group_id.clone(),
            strategy: config.strategy.clone(),
            seed: config.seed.clone(),
            total_ids_fetched: stats.total_fetched,
            excluded_id_count: stats.excluded,
            reserved_id_count: stats.reserved,
            unreserved_ids_distributed: stats.distributed,
            shard_count: stats.shard_count,
        };

        Self {
            metadata,
            shards: ShardMap::new(assignment.into_shards()),
        }
    }

    /// Serialize in `format`
    pub fn render(&self, format: OutputFormat) -> Result<String, OutputError> {
        match format {
            OutputFormat::Json => {
                let mut json = serde_json::to_string_pretty(self)?;
                json.push('\n');
                Ok(json)
            }
            OutputFormat::Yaml => Ok(serde_yaml::to_string(self)?),
        }
    }

    /// Write to `path`, or to stdout when `path` is `None`
    pub fn write(&self, format: OutputFormat, path: Option<&Path>) -> Result<(), OutputError> {
        let data = self.render(format)?;

        match path {
            Some(path) => {
                std::fs::write(path, data).map_err(|source| OutputError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                info!("Output written to {}", path.display());
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout
                    .write_all(data.as_bytes())
                    .and_then(|_| stdout.flush())
                    .map_err(|source| OutputError::Io {
                        path: "stdout".to_string(),
                        source,
                    })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shard_core::{run, ShardRequest, Strategy};

    fn sample(group_id: &str) -> ShardResult {
        let ids: Vec<String> = (1..=12).map(|i| i.to_string()).collect();
        let assignment = run(&ShardRequest::new(ids, Strategy::RoundRobin { shard_count: 11 })).unwrap();
        let config = ShardConfig {
            source_type: "computer_group_membership".into(),
            group_id: group_id.into(),
            strategy: "round-robin".into(),
            seed: "wave-1".into(),
            ..Default::default()
        };
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        ShardResult::new(assignment, &config, at)
    }

    #[test]
    fn test_format_names() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yaml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!(matches!(
            "xml".parse::<OutputFormat>(),
            Err(OutputError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_metadata() {
        let result = sample("7");
        assert_eq!(result.metadata.total_ids_fetched, 12);
        assert_eq!(result.metadata.unreserved_ids_distributed, 12);
        assert_eq!(result.metadata.shard_count, 11);
        assert_eq!(result.shards.len(), 11);
        assert_eq!(result.shards.get(0), Some(&["1".to_string(), "12".to_string()][..]));
    }

    #[test]
    fn test_json_layout() {
        let json = sample("7").render(OutputFormat::Json).unwrap();
        assert!(json.ends_with("}\n"));
        assert!(json.contains("\"generated_at\": \"2026-03-01T12:00:00Z\""));
        assert!(json.contains("\"group_id\": \"7\""));

        // Index order, so shard_2 precedes shard_10
        let two = json.find("\"shard_2\"").unwrap();
        let ten = json.find("\"shard_10\"").unwrap();
        assert!(two < ten);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["shards"]["shard_0"], serde_json::json!(["1", "12"]));
        assert_eq!(value["metadata"]["strategy"], "round-robin");
    }

    #[test]
    fn test_empty_group_id_omitted() {
        let json = sample("").render(OutputFormat::Json).unwrap();
        assert!(!json.contains("group_id"));
    }

    #[test]
    fn test_yaml_layout() {
        let yaml = sample("").render(OutputFormat::Yaml).unwrap();
        assert!(yaml.starts_with("metadata:\n"));
        assert!(yaml.find("shard_9:").unwrap() < yaml.find("shard_10:").unwrap());

        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["shards"]["shard_0"][1].as_str(), Some("12"));
        assert_eq!(value["metadata"]["shard_count"].as_u64(), Some(11));
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shards.json");
        sample("7").write(OutputFormat::Json, Some(&path)).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, sample("7").render(OutputFormat::Json).unwrap());
    }

    #[test]
    fn test_write_to_missing_dir() {
        let err = sample("7")
            .write(OutputFormat::Json, Some(Path::new("/nonexistent/dir/out.json")))
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dir/out.json"));
    }
}

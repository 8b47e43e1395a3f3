//! Local ID list

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{IdSource, SourceError};

/// Reads identifiers from a file
///
/// Accepted forms: a JSON array, a YAML sequence, or one ID per line with
/// blank lines and `#` comments skipped.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl IdSource for FileSource {
    async fn fetch_ids(&self) -> Result<Vec<String>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::Io(format!("{}: {}", self.path.display(), e)))?;
        let ids = parse_id_list(&content)?;
        debug!("Read {} IDs from {:?}", ids.len(), self.path);
        Ok(ids)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// List entries may be written as numbers or strings
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s.trim().to_string(),
        }
    }
}

/// Parse the contents of an ID file
pub fn parse_id_list(content: &str) -> Result<Vec<String>, SourceError> {
    let trimmed = content.trim_start();

    let structured: Option<Vec<RawId>> = if trimmed.starts_with('[') {
        Some(serde_json::from_str(trimmed).map_err(|e| SourceError::Parse(e.to_string()))?)
    } else if trimmed.starts_with("- ") || trimmed.starts_with("---") {
        Some(serde_yaml::from_str(trimmed).map_err(|e| SourceError::Parse(e.to_string()))?)
    } else {
        None
    };

    let ids = match structured {
        Some(raw) => raw.into_iter().map(String::from).collect(),
        None => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect(),
    };

    Ok(ids)
}

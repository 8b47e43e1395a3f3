//! Identifier sources
//!
//! A source produces the raw identifier pool for one run. Jamf Pro sources
//! go through [`JamfClient`]; [`FileSource`] reads a local list.

mod file;
mod jamf;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use file::{parse_id_list, FileSource};
pub use jamf::{base_url, JamfAuth, JamfClient, JamfClientConfig, JamfSource};

use crate::config::ShardConfig;

/// Source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned status {status}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("unknown source_type {0:?}")]
    UnknownSource(String),
}

/// Anything that can produce an identifier pool
#[async_trait]
pub trait IdSource: Send + Sync {
    /// Fetch the full identifier pool
    async fn fetch_ids(&self) -> Result<Vec<String>, SourceError>;

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}

/// Where the identifier pool comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// All managed computers
    ComputerInventory,
    /// All managed mobile devices
    MobileDeviceInventory,
    /// Members of a computer group
    ComputerGroupMembership,
    /// Members of a mobile device group
    MobileDeviceGroupMembership,
    /// All Jamf Pro user accounts
    UserAccounts,
    /// A local ID list
    File,
}

impl SourceType {
    pub const ALL: [SourceType; 6] = [
        SourceType::ComputerInventory,
        SourceType::MobileDeviceInventory,
        SourceType::ComputerGroupMembership,
        SourceType::MobileDeviceGroupMembership,
        SourceType::UserAccounts,
        SourceType::File,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::ComputerInventory => "computer_inventory",
            SourceType::MobileDeviceInventory => "mobile_device_inventory",
            SourceType::ComputerGroupMembership => "computer_group_membership",
            SourceType::MobileDeviceGroupMembership => "mobile_device_group_membership",
            SourceType::UserAccounts => "user_accounts",
            SourceType::File => "file",
        }
    }

    /// Whether `group_id` selects the members
    pub fn requires_group(self) -> bool {
        matches!(
            self,
            SourceType::ComputerGroupMembership | SourceType::MobileDeviceGroupMembership
        )
    }

    /// Whether the IDs come from Jamf Pro
    pub fn is_jamf(self) -> bool {
        self != SourceType::File
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceType::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| SourceError::UnknownSource(s.to_string()))
    }
}

/// Build the source selected by `config`
pub fn build_source(config: &ShardConfig) -> Result<Box<dyn IdSource>, SourceError> {
    let source_type: SourceType = config.source_type.parse()?;
    match source_type {
        SourceType::File => Ok(Box::new(FileSource::new(&config.id_file))),
        jamf => {
            let client = JamfClient::new(JamfClientConfig::from_config(config)?)?;
            Ok(Box::new(JamfSource::new(client, jamf, config.group_id.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_names() {
        for source in SourceType::ALL {
            assert_eq!(source.as_str().parse::<SourceType>().unwrap(), source);
        }
        assert!(matches!(
            "printers".parse::<SourceType>(),
            Err(SourceError::UnknownSource(name)) if name == "printers"
        ));
    }

    #[test]
    fn test_source_kinds() {
        assert!(SourceType::ComputerGroupMembership.requires_group());
        assert!(!SourceType::UserAccounts.requires_group());
        assert!(!SourceType::File.is_jamf());
        assert!(SourceType::MobileDeviceInventory.is_jamf());
    }

    #[test]
    fn test_build_file_source() {
        let config = ShardConfig {
            source_type: "file".into(),
            id_file: "ids.txt".into(),
            ..Default::default()
        };
        let source = build_source(&config).unwrap();
        assert_eq!(source.describe(), "file ids.txt");
    }

    #[test]
    fn test_build_jamf_source() {
        let config = ShardConfig {
            instance_domain: "company.jamfcloud.com".into(),
            client_id: "abc".into(),
            client_secret: "xyz".into(),
            source_type: "mobile_device_group_membership".into(),
            group_id: "12".into(),
            ..Default::default()
        };
        let source = build_source(&config).unwrap();
        assert_eq!(
            source.describe(),
            "mobile_device_group_membership group 12 on https://company.jamfcloud.com"
        );
    }
}

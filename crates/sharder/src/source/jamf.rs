//! Jamf Pro API client
//!
//! Obtains a bearer token, then reads IDs from the Jamf Pro API
//! (`/api/v1/...`) or the Classic API (`/JSSResource/...`). Classic endpoints
//! answer XML unless JSON is requested explicitly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{IdSource, SourceError, SourceType};
use crate::config::ShardConfig;

/// Base delay between retries, multiplied by the attempt number
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Credentials for token exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JamfAuth {
    OAuth2 {
        client_id: String,
        client_secret: String,
    },
    Basic {
        username: String,
        password: String,
    },
}

/// Jamf client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JamfClientConfig {
    /// `https://<instance_domain>` without trailing slash
    pub base_url: String,
    pub auth: JamfAuth,
    /// Request timeout (seconds)
    pub request_timeout_secs: u64,
    /// Retries for transport errors, 429 and 5xx
    pub max_retry_attempts: u32,
    /// Page size of the computer inventory
    pub page_size: u32,
}

impl JamfClientConfig {
    pub fn from_config(config: &ShardConfig) -> Result<Self, SourceError> {
        let auth = match config.auth_method.as_str() {
            "oauth2" => JamfAuth::OAuth2 {
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
            },
            "basic" => JamfAuth::Basic {
                username: config.basic_auth_username.clone(),
                password: config.basic_auth_password.clone(),
            },
            other => {
                return Err(SourceError::Auth(format!(
                    "unsupported auth_method {:?}",
                    other
                )))
            }
        };

        Ok(Self {
            base_url: base_url(&config.instance_domain),
            auth,
            request_timeout_secs: config.custom_timeout_seconds,
            max_retry_attempts: config.max_retry_attempts,
            page_size: config.page_size.max(1),
        })
    }
}

/// Base URL for an instance domain
///
/// Bare hosts get `https://`; explicit `http(s)://` URLs are kept as given.
pub fn base_url(instance_domain: &str) -> String {
    let domain = instance_domain.trim().trim_end_matches('/');
    if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{}", domain)
    }
}

/// Jamf Pro HTTP client
pub struct JamfClient {
    config: JamfClientConfig,
    http_client: reqwest::Client,
}

impl JamfClient {
    pub fn new(config: JamfClientConfig) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Exchange credentials for a bearer token
    pub async fn authenticate(&self) -> Result<String, SourceError> {
        let result = match &self.config.auth {
            JamfAuth::OAuth2 {
                client_id,
                client_secret,
            } => {
                let url = format!("{}/api/oauth/token", self.config.base_url);
                let form = [
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                ];
                self.request_json::<OAuthToken, _>(&url, || {
                    self.http_client.post(&url).form(&form)
                })
                .await
                .map(|token| token.access_token)
            }
            JamfAuth::Basic { username, password } => {
                let url = format!("{}/api/v1/auth/token", self.config.base_url);
                self.request_json::<BasicToken, _>(&url, || {
                    self.http_client.post(&url).basic_auth(username, Some(password))
                })
                .await
                .map(|token| token.token)
            }
        };

        match result {
            Err(SourceError::Status { status, body, .. })
                if status == StatusCode::UNAUTHORIZED.as_u16()
                    || status == StatusCode::FORBIDDEN.as_u16() =>
            {
                Err(SourceError::Auth(format!(
                    "token request rejected with status {}: {}",
                    status, body
                )))
            }
            other => other,
        }
    }

    /// IDs of all managed computers, across every inventory page
    pub async fn computer_inventory(&self, token: &str) -> Result<Vec<String>, SourceError> {
        let mut ids = Vec::new();
        let mut seen = 0u64;
        let mut page = 0u32;

        loop {
            let path = format!(
                "/api/v1/computers-inventory?section=GENERAL&page={}&page-size={}",
                page, self.config.page_size
            );
            let batch: ComputerInventoryPage = self.get_json(token, &path).await?;
            if batch.results.is_empty() {
                break;
            }

            seen += batch.results.len() as u64;
            ids.extend(batch.managed_ids());
            debug!("Computer inventory page {}: {}/{} records", page, seen, batch.total_count);

            if seen >= batch.total_count {
                break;
            }
            page += 1;
        }

        Ok(ids)
    }

    /// IDs of all managed mobile devices
    pub async fn mobile_device_inventory(&self, token: &str) -> Result<Vec<String>, SourceError> {
        let list: MobileDeviceList = self.get_json(token, "/JSSResource/mobiledevices").await?;
        Ok(list.managed_ids())
    }

    /// Members of a computer group
    pub async fn computer_group_members(
        &self,
        token: &str,
        group_id: &str,
    ) -> Result<Vec<String>, SourceError> {
        let path = format!("/JSSResource/computergroups/id/{}", group_id);
        let group: ComputerGroupResponse = self.get_json(token, &path).await?;
        Ok(group.member_ids())
    }

    /// Members of a mobile device group
    pub async fn mobile_device_group_members(
        &self,
        token: &str,
        group_id: &str,
    ) -> Result<Vec<String>, SourceError> {
        let path = format!("/JSSResource/mobiledevicegroups/id/{}", group_id);
        let group: MobileDeviceGroupResponse = self.get_json(token, &path).await?;
        Ok(group.member_ids())
    }

    /// IDs of all user accounts
    pub async fn users(&self, token: &str) -> Result<Vec<String>, SourceError> {
        let list: UserList = self.get_json(token, "/JSSResource/users").await?;
        Ok(list.ids())
    }

    async fn get_json<T: DeserializeOwned>(&self, token: &str, path: &str) -> Result<T, SourceError> {
        let url = format!("{}{}", self.config.base_url, path);
        self.request_json(&url, || {
            self.http_client
                .get(&url)
                .bearer_auth(token)
                .header(ACCEPT, "application/json")
        })
        .await
    }

    async fn request_json<T, F>(&self, url: &str, build: F) -> Result<T, SourceError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let body = self.send(url, build).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Parse(format!("{}: {}", url, e)))
    }

    /// Send with linear backoff on transport errors, 429 and 5xx
    async fn send<F>(&self, url: &str, build: F) -> Result<Response, SourceError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0u32;

        loop {
            debug!("Request {} (attempt {})", url, attempt + 1);
            let failure = match build().send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if !is_retryable(resp.status()) => {
                    return Err(status_error(url, resp).await);
                }
                Ok(resp) => status_error(url, resp).await,
                Err(e) => SourceError::Http(e),
            };

            if attempt >= self.config.max_retry_attempts {
                return Err(failure);
            }
            attempt += 1;
            let delay = RETRY_BACKOFF * attempt;
            warn!(
                "Request to {} failed ({}), retry {}/{} in {:?}",
                url, failure, attempt, self.config.max_retry_attempts, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// 429 and 5xx are worth retrying; other statuses fail at once
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

async fn status_error(url: &str, resp: Response) -> SourceError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    SourceError::Status {
        url: url.to_string(),
        status,
        body,
    }
}

/// Jamf Pro source bound to one source type
pub struct JamfSource {
    client: JamfClient,
    source_type: SourceType,
    group_id: String,
}

impl JamfSource {
    pub fn new(client: JamfClient, source_type: SourceType, group_id: String) -> Self {
        Self {
            client,
            source_type,
            group_id,
        }
    }
}

#[async_trait]
impl IdSource for JamfSource {
    async fn fetch_ids(&self) -> Result<Vec<String>, SourceError> {
        let token = self.client.authenticate().await?;
        let ids = match self.source_type {
            SourceType::ComputerInventory => self.client.computer_inventory(&token).await?,
            SourceType::MobileDeviceInventory => self.client.mobile_device_inventory(&token).await?,
            SourceType::ComputerGroupMembership => {
                self.client.computer_group_members(&token, &self.group_id).await?
            }
            SourceType::MobileDeviceGroupMembership => {
                self.client
                    .mobile_device_group_members(&token, &self.group_id)
                    .await?
            }
            SourceType::UserAccounts => self.client.users(&token).await?,
            SourceType::File => {
                return Err(SourceError::UnknownSource(self.source_type.to_string()));
            }
        };

        info!("Fetched {} IDs from {}", ids.len(), self.describe());
        Ok(ids)
    }

    fn describe(&self) -> String {
        if self.source_type.requires_group() {
            format!(
                "{} group {} on {}",
                self.source_type,
                self.group_id,
                self.client.base_url()
            )
        } else {
            format!("{} on {}", self.source_type, self.client.base_url())
        }
    }
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Deserialize)]
struct OAuthToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct BasicToken {
    token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ComputerInventoryPage {
    total_count: u64,
    results: Vec<ComputerRecord>,
}

#[derive(Debug, Deserialize)]
struct ComputerRecord {
    id: String,
    #[serde(default)]
    general: Option<ComputerGeneral>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputerGeneral {
    #[serde(default)]
    remote_management: Option<RemoteManagement>,
}

#[derive(Debug, Deserialize)]
struct RemoteManagement {
    #[serde(default)]
    managed: bool,
}

impl ComputerInventoryPage {
    /// Unmanaged computers cannot join static groups, so they are skipped
    fn managed_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.results
            .iter()
            .filter(|record| {
                record
                    .general
                    .as_ref()
                    .and_then(|general| general.remote_management.as_ref())
                    .is_some_and(|management| management.managed)
            })
            .map(|record| record.id.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ClassicRef {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct MobileDeviceRecord {
    id: u64,
    #[serde(default)]
    managed: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MobileDeviceList {
    mobile_devices: Vec<MobileDeviceRecord>,
}

impl MobileDeviceList {
    fn managed_ids(&self) -> Vec<String> {
        self.mobile_devices
            .iter()
            .filter(|device| device.managed)
            .map(|device| device.id.to_string())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ComputerGroupResponse {
    computer_group: ComputerGroup,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ComputerGroup {
    computers: Vec<ClassicRef>,
}

impl ComputerGroupResponse {
    fn member_ids(&self) -> Vec<String> {
        refs_to_ids(&self.computer_group.computers)
    }
}

#[derive(Debug, Deserialize)]
struct MobileDeviceGroupResponse {
    mobile_device_group: MobileDeviceGroup,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MobileDeviceGroup {
    mobile_devices: Vec<ClassicRef>,
}

impl MobileDeviceGroupResponse {
    fn member_ids(&self) -> Vec<String> {
        refs_to_ids(&self.mobile_device_group.mobile_devices)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserList {
    users: Vec<ClassicRef>,
}

impl UserList {
    fn ids(&self) -> Vec<String> {
        refs_to_ids(&self.users)
    }
}

fn refs_to_ids(refs: &[ClassicRef]) -> Vec<String> {
    refs.iter().map(|r| r.id.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth_config() -> ShardConfig {
        ShardConfig {
            instance_domain: "company.jamfcloud.com".into(),
            client_id: "abc".into(),
            client_secret: "xyz".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("company.jamfcloud.com"), "https://company.jamfcloud.com");
        assert_eq!(base_url("http://localhost:8080/"), "http://localhost:8080");
        assert_eq!(base_url(" https://jamf.example.org "), "https://jamf.example.org");
    }

    #[test]
    fn test_client_config_from_config() {
        let config = JamfClientConfig::from_config(&oauth_config()).unwrap();
        assert_eq!(config.base_url, "https://company.jamfcloud.com");
        assert_eq!(
            config.auth,
            JamfAuth::OAuth2 {
                client_id: "abc".into(),
                client_secret: "xyz".into()
            }
        );
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.page_size, 100);

        let basic = ShardConfig {
            auth_method: "basic".into(),
            basic_auth_username: "admin".into(),
            basic_auth_password: "secret".into(),
            ..oauth_config()
        };
        assert!(matches!(
            JamfClientConfig::from_config(&basic).unwrap().auth,
            JamfAuth::Basic { ref username, .. } if username == "admin"
        ));

        let unknown = ShardConfig {
            auth_method: "kerberos".into(),
            ..oauth_config()
        };
        assert!(matches!(
            JamfClientConfig::from_config(&unknown),
            Err(SourceError::Auth(_))
        ));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_computer_inventory_page() {
        let body = r#"{
            "totalCount": 3,
            "results": [
                {"id": "1", "general": {"name": "a", "remoteManagement": {"managed": true}}},
                {"id": "2", "general": {"name": "b", "remoteManagement": {"managed": false}}},
                {"id": "3", "general": {"name": "c"}}
            ]
        }"#;
        let page: ComputerInventoryPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.managed_ids().collect::<Vec<_>>(), vec!["1"]);
    }

    #[test]
    fn test_mobile_devices() {
        let body = r#"{"mobile_devices": [
            {"id": 10, "name": "iPad", "managed": true},
            {"id": 11, "name": "iPhone", "managed": false},
            {"id": 12, "name": "iPod", "managed": true}
        ]}"#;
        let list: MobileDeviceList = serde_json::from_str(body).unwrap();
        assert_eq!(list.managed_ids(), vec!["10", "12"]);
    }

    #[test]
    fn test_group_members() {
        let body = r#"{"computer_group": {"id": 4, "name": "Pilot", "computers": [{"id": 5, "name": "mac"}, {"id": 9}]}}"#;
        let group: ComputerGroupResponse = serde_json::from_str(body).unwrap();
        assert_eq!(group.member_ids(), vec!["5", "9"]);

        let body = r#"{"mobile_device_group": {"id": 2, "name": "Empty"}}"#;
        let group: MobileDeviceGroupResponse = serde_json::from_str(body).unwrap();
        assert!(group.member_ids().is_empty());
    }

    #[test]
    fn test_users() {
        let body = r#"{"users": [{"id": 1, "name": "alice"}, {"id": 2, "name": "bob"}]}"#;
        let list: UserList = serde_json::from_str(body).unwrap();
        assert_eq!(list.ids(), vec!["1", "2"]);
    }

    #[test]
    fn test_token_payloads() {
        let token: OAuthToken =
            serde_json::from_str(r#"{"access_token": "t0k", "token_type": "Bearer", "expires_in": 299}"#)
                .unwrap();
        assert_eq!(token.access_token, "t0k");

        let token: BasicToken =
            serde_json::from_str(r#"{"token": "b4s", "expires": "2026-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(token.token, "b4s");
    }
}

//! Configuration validation
//!
//! Every check appends to one issue list so a single run reports all
//! problems. Nothing here touches the network or the filesystem.

use std::collections::{BTreeMap, HashSet};

use shard_core::{parse_shard_name, StrategyKind};

use crate::config::ShardConfig;
use crate::output::OutputFormat;
use crate::source::SourceType;

const AUTH_METHODS: [&str; 2] = ["oauth2", "basic"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// All problems found in a configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<String>,
}

fn render_issues(issues: &[String]) -> String {
    let mut out = format!(
        "configuration validation failed with {} error(s):",
        issues.len()
    );
    for issue in issues {
        out.push_str("\n  • ");
        out.push_str(issue);
    }
    out
}

/// Check a configuration before any request is made
pub fn validate(config: &ShardConfig) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    let source = config.source_type.parse::<SourceType>().ok();
    if source != Some(SourceType::File) {
        validate_auth(config, &mut issues);
        validate_client(config, &mut issues);
    }
    validate_source(config, source, &mut issues);
    validate_sharding(config, &mut issues);
    validate_id_formats(config, &mut issues);
    validate_conflicts(config, &mut issues);
    validate_output(config, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues })
    }
}

// =============================================================================
// Auth and HTTP client
// =============================================================================

fn validate_auth(config: &ShardConfig, issues: &mut Vec<String>) {
    if config.instance_domain.is_empty() {
        issues.push("instance_domain is required".to_string());
    }

    match config.auth_method.as_str() {
        "oauth2" => {
            if config.client_id.is_empty() {
                issues.push("client_id is required when auth_method is 'oauth2'".to_string());
            }
            if config.client_secret.is_empty() {
                issues.push("client_secret is required when auth_method is 'oauth2'".to_string());
            }
            if !config.basic_auth_username.is_empty() || !config.basic_auth_password.is_empty() {
                issues.push(
                    "basic_auth_username / basic_auth_password are set but auth_method is 'oauth2'; \
                     remove them or switch auth_method to 'basic'"
                        .to_string(),
                );
            }
        }
        "basic" => {
            if config.basic_auth_username.is_empty() {
                issues.push("basic_auth_username is required when auth_method is 'basic'".to_string());
            }
            if config.basic_auth_password.is_empty() {
                issues.push("basic_auth_password is required when auth_method is 'basic'".to_string());
            }
            if !config.client_id.is_empty() || !config.client_secret.is_empty() {
                issues.push(
                    "client_id / client_secret are set but auth_method is 'basic'; \
                     remove them or switch auth_method to 'oauth2'"
                        .to_string(),
                );
            }
        }
        "" => issues.push(format!(
            "auth_method is required: must be one of {}",
            quoted_list(AUTH_METHODS)
        )),
        other => issues.push(format!(
            "auth_method {:?} is not valid: must be one of {}",
            other,
            quoted_list(AUTH_METHODS)
        )),
    }
}

fn validate_client(config: &ShardConfig, issues: &mut Vec<String>) {
    if config.custom_timeout_seconds == 0 {
        issues.push("custom_timeout_seconds must be at least 1".to_string());
    }
    if config.page_size == 0 {
        issues.push("page_size must be at least 1".to_string());
    }
    if !LOG_LEVELS.contains(&config.log_level.as_str()) {
        issues.push(format!(
            "log_level {:?} is not valid: must be one of {}",
            config.log_level,
            quoted_list(LOG_LEVELS)
        ));
    }
}

// =============================================================================
// Source
// =============================================================================

fn validate_source(config: &ShardConfig, source: Option<SourceType>, issues: &mut Vec<String>) {
    let valid = SourceType::ALL.map(SourceType::as_str);
    if source.is_none() {
        if config.source_type.is_empty() {
            issues.push(format!("source_type is required: must be one of {}", quoted_list(valid)));
        } else {
            issues.push(format!(
                "source_type {:?} is not valid: must be one of {}",
                config.source_type,
                quoted_list(valid)
            ));
        }
    }

    let group_required = source.is_some_and(SourceType::requires_group);
    if group_required && config.group_id.is_empty() {
        issues.push(format!(
            "group_id is required when source_type is {:?}",
            config.source_type
        ));
    }
    if !config.group_id.is_empty() {
        if !is_numeric_id(&config.group_id) {
            issues.push(format!(
                "group_id {:?} must be a numeric ID (e.g. \"42\")",
                config.group_id
            ));
        }
        if source.is_some() && !group_required {
            issues.push(format!(
                "group_id is set ({:?}) but source_type {:?} does not use a group; \
                 set source_type to 'computer_group_membership' or \
                 'mobile_device_group_membership', or remove group_id",
                config.group_id, config.source_type
            ));
        }
    }

    match source {
        Some(SourceType::File) if config.id_file.is_empty() => {
            issues.push("id_file is required when source_type is \"file\"".to_string());
        }
        Some(source) if source.is_jamf() && !config.id_file.is_empty() => {
            issues.push(format!(
                "id_file is set ({:?}) but source_type {:?} reads from Jamf Pro; \
                 set source_type to 'file' or remove id_file",
                config.id_file, config.source_type
            ));
        }
        _ => {}
    }
}

// =============================================================================
// Sharding parameters
// =============================================================================

fn validate_sharding(config: &ShardConfig, issues: &mut Vec<String>) {
    let has_count = config.shard_count != 0;
    let has_percentages = !config.shard_percentages.is_empty();
    let has_sizes = !config.shard_sizes.is_empty();

    let mut provided = Vec::new();
    if has_count {
        provided.push(format!("shard_count ({})", config.shard_count));
    }
    if has_percentages {
        provided.push(format!("shard_percentages ({:?})", config.shard_percentages));
    }
    if has_sizes {
        provided.push(format!("shard_sizes ({:?})", config.shard_sizes));
    }

    match provided.len() {
        0 => issues.push(
            "exactly one of shard_count, shard_percentages, or shard_sizes must be set; none were provided"
                .to_string(),
        ),
        1 => {}
        _ => {
            issues.push(format!(
                "exactly one of shard_count, shard_percentages, or shard_sizes must be set; \
                 multiple were provided: {}",
                provided.join("; ")
            ));
            return;
        }
    }

    let strategies = StrategyKind::ALL.map(|kind| kind.as_str());
    let kind = match config.strategy.parse::<StrategyKind>() {
        Ok(kind) => kind,
        Err(_) if config.strategy.is_empty() => {
            issues.push(format!("strategy is required: must be one of {}", quoted_list(strategies)));
            return;
        }
        Err(_) => {
            issues.push(format!(
                "strategy {:?} is not valid: must be one of {}",
                config.strategy,
                quoted_list(strategies)
            ));
            return;
        }
    };

    match kind {
        StrategyKind::RoundRobin | StrategyKind::Rendezvous => {
            if !has_count {
                issues.push(format!(
                    "strategy {:?} requires shard_count; use shard_count, not shard_percentages or shard_sizes",
                    kind.as_str()
                ));
            }
            if has_percentages {
                issues.push(format!(
                    "shard_percentages is set but strategy is {:?}; shard_percentages is only valid with strategy 'percentage'",
                    kind.as_str()
                ));
            }
            if has_sizes {
                issues.push(format!(
                    "shard_sizes is set but strategy is {:?}; shard_sizes is only valid with strategy 'size'",
                    kind.as_str()
                ));
            }
        }
        StrategyKind::Percentage => {
            if !has_percentages {
                issues.push(
                    "strategy 'percentage' requires shard_percentages; use shard_percentages, not shard_count or shard_sizes"
                        .to_string(),
                );
            }
            if has_count {
                issues.push(
                    "shard_count is set but strategy is 'percentage'; shard_count is only valid with strategies 'round-robin' or 'rendezvous'"
                        .to_string(),
                );
            }
            if has_sizes {
                issues.push(
                    "shard_sizes is set but strategy is 'percentage'; shard_sizes is only valid with strategy 'size'"
                        .to_string(),
                );
            }
        }
        StrategyKind::Size => {
            if !has_sizes {
                issues.push(
                    "strategy 'size' requires shard_sizes; use shard_sizes, not shard_count or shard_percentages"
                        .to_string(),
                );
            }
            if has_count {
                issues.push(
                    "shard_count is set but strategy is 'size'; shard_count is only valid with strategies 'round-robin' or 'rendezvous'"
                        .to_string(),
                );
            }
            if has_percentages {
                issues.push(
                    "shard_percentages is set but strategy is 'size'; shard_percentages is only valid with strategy 'percentage'"
                        .to_string(),
                );
            }
        }
    }

    if has_count && config.shard_count < 1 {
        issues.push(format!(
            "shard_count must be at least 1, got {}",
            config.shard_count
        ));
    }

    if has_percentages {
        for (i, &p) in config.shard_percentages.iter().enumerate() {
            if p < 0 {
                issues.push(format!(
                    "shard_percentages[{}] is {}; each percentage must be >= 0",
                    i, p
                ));
            }
        }
        // Widened so oversized entries cannot wrap around to 100
        let sum: i128 = config.shard_percentages.iter().map(|&p| i128::from(p)).sum();
        if sum != 100 {
            issues.push(format!(
                "shard_percentages must sum to exactly 100, got {} ({:?})",
                sum, config.shard_percentages
            ));
        }
    }

    if has_sizes {
        let last = config.shard_sizes.len() - 1;
        for (i, &size) in config.shard_sizes.iter().enumerate() {
            if size != -1 && size < 1 {
                issues.push(format!(
                    "shard_sizes[{}] is {}; each size must be >= 1 or exactly -1 (remainder)",
                    i, size
                ));
            }
            if size == -1 && i != last {
                issues.push(format!(
                    "shard_sizes[{}] is -1 (remainder) but is not the last element; \
                     -1 is only valid in the final position",
                    i
                ));
            }
        }
    }
}

// =============================================================================
// ID formats and conflicts
// =============================================================================

fn validate_id_formats(config: &ShardConfig, issues: &mut Vec<String>) {
    for (i, id) in config.exclude_ids.iter().enumerate() {
        if !is_numeric_id(id) {
            issues.push(format!(
                "exclude_ids[{}] {:?} must be a numeric ID (e.g. \"42\")",
                i, id
            ));
        }
    }

    for (key, ids) in &config.reserved_ids {
        if parse_shard_name(key).is_none() {
            issues.push(format!(
                "reserved_ids key {:?} is not valid; keys must be in the format 'shard_0', 'shard_1', etc.",
                key
            ));
        }
        for (i, id) in ids.iter().enumerate() {
            if !is_numeric_id(id) {
                issues.push(format!(
                    "reserved_ids[{:?}][{}] {:?} must be a numeric ID (e.g. \"42\")",
                    key, i, id
                ));
            }
        }
    }
}

fn validate_conflicts(config: &ShardConfig, issues: &mut Vec<String>) {
    let excluded: HashSet<&str> = config.exclude_ids.iter().map(String::as_str).collect();
    let mut claimed: BTreeMap<&str, &str> = BTreeMap::new();

    for (shard, ids) in &config.reserved_ids {
        for id in ids {
            if excluded.contains(id.as_str()) {
                issues.push(format!(
                    "ID {:?} appears in both exclude_ids and reserved_ids[{:?}]; \
                     exclusion takes precedence and the ID will be absent from all shards, \
                     remove it from reserved_ids or from exclude_ids",
                    id, shard
                ));
            }
            match claimed.get(id.as_str()) {
                Some(&first) if first != shard.as_str() => issues.push(format!(
                    "ID {:?} is reserved in multiple shards: {:?} and {:?}; \
                     each ID may only be pinned to one shard",
                    id, first, shard
                )),
                Some(_) => {}
                None => {
                    claimed.insert(id.as_str(), shard.as_str());
                }
            }
        }
    }
}

// =============================================================================
// Output
// =============================================================================

fn validate_output(config: &ShardConfig, issues: &mut Vec<String>) {
    if config.output_format.parse::<OutputFormat>().is_err() {
        if config.output_format.is_empty() {
            issues.push("output_format is required: must be 'json' or 'yaml'".to_string());
        } else {
            issues.push(format!(
                "output_format {:?} is not valid: must be 'json' or 'yaml'",
                config.output_format
            ));
        }
    }
}

fn is_numeric_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

fn quoted_list<const N: usize>(items: [&str; N]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("{:?}", item)).collect();
    format!("[{}]", quoted.join(", "))
}

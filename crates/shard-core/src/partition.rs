//! Pool partitioner
//!
//! Splits the fetched pool into three disjoint parts:
//! - excluded IDs (dropped entirely)
//! - reserved IDs (pinned to a shard index)
//! - the distributable pool handed to a strategy
//!
//! Exclusion is applied before reservation, so an ID that is both excluded
//! and reserved ends up in neither output.

use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, warn};

use crate::id::{shard_name, ShardIndex};

/// Partition errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error(
        "reserved shard {} is out of range: with shard_count={shard_count}, valid names are shard_0 to {}",
        shard_name(*.shard),
        shard_name(.shard_count.saturating_sub(1))
    )]
    ShardOutOfRange {
        shard: ShardIndex,
        shard_count: usize,
    },
    #[error(
        "ID {id:?} is reserved in multiple shards: {} and {}; each ID may only be pinned to one shard",
        shard_name(*.first),
        shard_name(*.second)
    )]
    DuplicateReservation {
        id: String,
        first: ShardIndex,
        second: ShardIndex,
    },
}

/// Result of splitting the pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Unique IDs in the fetched pool
    pub total: usize,
    /// Pool IDs removed by the exclusion set
    pub excluded: usize,
    /// Pool size after exclusions, before reservations
    pub filtered_total: usize,
    /// Reserved IDs per shard, only those present in the filtered pool
    pub reserved: BTreeMap<ShardIndex, Vec<String>>,
    /// IDs left for the strategy, in arrival order
    pub distributable: Vec<String>,
}

impl Partition {
    /// Number of IDs pinned to `shard`
    pub fn reserved_count(&self, shard: ShardIndex) -> usize {
        self.reserved.get(&shard).map_or(0, Vec::len)
    }

    /// Number of IDs pinned across all shards
    pub fn reserved_total(&self) -> usize {
        self.reserved.values().map(Vec::len).sum()
    }
}

/// Split `pool` into excluded, reserved and distributable parts
///
/// `shard_count` of 0 is treated as 1.
pub fn partition(
    pool: &[String],
    exclusions: &[String],
    reservations: &BTreeMap<ShardIndex, Vec<String>>,
    shard_count: usize,
) -> Result<Partition, PartitionError> {
    let shard_count = shard_count.max(1);
    check_reservations(reservations, shard_count)?;

    // Collapse repeated pool entries, first occurrence wins
    let mut seen: HashSet<&str> = HashSet::with_capacity(pool.len());
    let mut unique: Vec<&String> = Vec::with_capacity(pool.len());
    for id in pool {
        if seen.insert(id.as_str()) {
            unique.push(id);
        }
    }
    if unique.len() != pool.len() {
        warn!(
            "Identifier pool contains {} duplicate entries; keeping first occurrences",
            pool.len() - unique.len()
        );
    }

    let excluded_set: HashSet<&str> = exclusions.iter().map(String::as_str).collect();
    let filtered: Vec<&String> = unique
        .iter()
        .copied()
        .filter(|id| !excluded_set.contains(id.as_str()))
        .collect();
    let filtered_set: HashSet<&str> = filtered.iter().map(|&id| id.as_str()).collect();

    let mut reserved = BTreeMap::new();
    let mut reserved_set: HashSet<&str> = HashSet::new();
    for (&shard, ids) in reservations {
        let mut kept = Vec::with_capacity(ids.len());
        for id in ids {
            if excluded_set.contains(id.as_str()) {
                debug!("Reserved ID {} for {} is excluded; dropping", id, shard_name(shard));
                continue;
            }
            if !filtered_set.contains(id.as_str()) {
                warn!(
                    "Reserved ID {} for {} is not in the fetched pool; dropping",
                    id,
                    shard_name(shard)
                );
                continue;
            }
            if reserved_set.insert(id.as_str()) {
                kept.push(id.clone());
            }
        }
        if !kept.is_empty() {
            reserved.insert(shard, kept);
        }
    }

    let distributable: Vec<String> = filtered
        .iter()
        .filter(|id| !reserved_set.contains(id.as_str()))
        .map(|id| (*id).clone())
        .collect();

    let result = Partition {
        total: unique.len(),
        excluded: unique.len() - filtered.len(),
        filtered_total: filtered.len(),
        reserved,
        distributable,
    };

    debug!(
        "Partitioned pool: total={}, excluded={}, reserved={}, distributable={}",
        result.total,
        result.excluded,
        result.reserved_total(),
        result.distributable.len()
    );

    Ok(result)
}

/// Range and uniqueness checks, in ascending shard order
fn check_reservations(
    reservations: &BTreeMap<ShardIndex, Vec<String>>,
    shard_count: usize,
) -> Result<(), PartitionError> {
    let mut owner: HashMap<&str, ShardIndex> = HashMap::new();

    for (&shard, ids) in reservations {
        if shard >= shard_count {
            return Err(PartitionError::ShardOutOfRange { shard, shard_count });
        }
        for id in ids {
            match owner.get(id.as_str()) {
                Some(&first) if first != shard => {
                    return Err(PartitionError::DuplicateReservation {
                        id: id.clone(),
                        first,
                        second: shard,
                    });
                }
                Some(_) => {}
                None => {
                    owner.insert(id.as_str(), shard);
                }
            }
        }
    }

    Ok(())
}

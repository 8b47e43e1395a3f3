//! Shard assembler
//!
//! Merges reserved IDs into their buckets, sorts every bucket numerically
//! and records the run statistics.

use serde::{Deserialize, Serialize};

use crate::id::{shard_name, sort_numerically, ShardIndex};
use crate::partition::Partition;

/// Counts at each pipeline stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Unique IDs handed to the engine
    pub total_fetched: usize,
    /// IDs dropped by the exclusion set
    pub excluded: usize,
    /// IDs pinned by reservations
    pub reserved: usize,
    /// IDs placed by the strategy
    pub distributed: usize,
    /// Number of buckets
    pub shard_count: usize,
}

/// Final shard assignment
///
/// Bucket `i` is shard `shard_<i>`; IDs inside a bucket ascend numerically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardAssignment {
    shards: Vec<Vec<String>>,
    stats: RunStats,
}

impl ShardAssignment {
    /// Buckets in index order
    pub fn shards(&self) -> &[Vec<String>] {
        &self.shards
    }

    /// Run statistics
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Number of buckets
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Buckets paired with their external names
    pub fn named(&self) -> impl Iterator<Item = (String, &[String])> + '_ {
        self.shards
            .iter()
            .enumerate()
            .map(|(index, ids)| (shard_name(index), ids.as_slice()))
    }

    /// Shard holding `id`, if any
    pub fn shard_of(&self, id: &str) -> Option<ShardIndex> {
        self.shards
            .iter()
            .position(|ids| ids.iter().any(|candidate| candidate == id))
    }

    /// Consume into the bucket list
    pub fn into_shards(self) -> Vec<Vec<String>> {
        self.shards
    }
}

/// Merge reservations into the distributed buckets and sort
pub fn assemble(mut distributed: Vec<Vec<String>>, partition: &Partition) -> ShardAssignment {
    // Reserved indices are range-checked by the partitioner; never drop one
    if let Some(&highest) = partition.reserved.keys().next_back() {
        if highest >= distributed.len() {
            distributed.resize_with(highest + 1, Vec::new);
        }
    }

    let distributed_count: usize = distributed.iter().map(Vec::len).sum();

    for (&shard, ids) in &partition.reserved {
        distributed[shard].extend(ids.iter().cloned());
    }
    for bucket in &mut distributed {
        sort_numerically(bucket);
    }

    let stats = RunStats {
        total_fetched: partition.total,
        excluded: partition.excluded,
        reserved: partition.reserved_total(),
        distributed: distributed_count,
        shard_count: distributed.len(),
    };

    ShardAssignment {
        shards: distributed,
        stats,
    }
}

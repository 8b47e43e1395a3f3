//! Distribution strategies
//!
//! Every strategy maps the distributable pool onto `shard_count` buckets.
//! Reserved IDs are not part of the input; the assembler merges them later.
//!
//! | strategy    | ordering                  | bucket sizes                         |
//! |-------------|---------------------------|--------------------------------------|
//! | round-robin | sequenced                 | differ by at most one                |
//! | percentage  | sequenced, contiguous     | share of the pre-reservation pool    |
//! | size        | sequenced, contiguous     | literal counts, optional remainder   |
//! | rendezvous  | none, per-ID hashing      | statistical, minimal disruption      |
//!
//! Rendezvous folds the seed into every candidate hash while the other three
//! use it once to drive a shuffle. The asymmetry is what gives rendezvous its
//! stability when the shard count changes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::id::{shard_name, ShardIndex};
use crate::partition::Partition;
use crate::sequence::{digest_prefix, sequence};

/// Unknown strategy name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown strategy {name:?}: must be one of \"round-robin\", \"percentage\", \"size\", \"rendezvous\"")]
pub struct UnknownStrategy {
    pub name: String,
}

/// Strategy selector, as named in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    RoundRobin,
    Percentage,
    Size,
    Rendezvous,
}

impl StrategyKind {
    /// All strategies, in documentation order
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::RoundRobin,
        StrategyKind::Percentage,
        StrategyKind::Size,
        StrategyKind::Rendezvous,
    ];

    /// Configuration name
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::RoundRobin => "round-robin",
            StrategyKind::Percentage => "percentage",
            StrategyKind::Size => "size",
            StrategyKind::Rendezvous => "rendezvous",
        }
    }

    /// Whether the strategy is parameterised by a plain shard count
    pub fn uses_shard_count(&self) -> bool {
        matches!(self, StrategyKind::RoundRobin | StrategyKind::Rendezvous)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownStrategy {
                name: s.to_string(),
            })
    }
}

/// Requested size of one shard in the size strategy
///
/// The external form is an integer where `-1` means "all remaining IDs".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ShardSize {
    Exact(usize),
    Remainder,
}

impl From<i64> for ShardSize {
    fn from(raw: i64) -> Self {
        match raw {
            -1 => ShardSize::Remainder,
            n if n < 0 => ShardSize::Exact(0),
            n => ShardSize::Exact(usize::try_from(n).unwrap_or(usize::MAX)),
        }
    }
}

impl From<ShardSize> for i64 {
    fn from(size: ShardSize) -> Self {
        match size {
            ShardSize::Remainder => -1,
            ShardSize::Exact(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }
}

/// A strategy together with its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    RoundRobin { shard_count: usize },
    Percentage { percentages: Vec<u32> },
    Size { sizes: Vec<ShardSize> },
    Rendezvous { shard_count: usize },
}

impl Strategy {
    /// Build a strategy from a kind and whichever parameter it uses
    ///
    /// Parameters that do not belong to `kind` are ignored.
    pub fn from_parts(
        kind: StrategyKind,
        shard_count: usize,
        percentages: &[u32],
        sizes: &[ShardSize],
    ) -> Self {
        match kind {
            StrategyKind::RoundRobin => Strategy::RoundRobin { shard_count },
            StrategyKind::Rendezvous => Strategy::Rendezvous { shard_count },
            StrategyKind::Percentage => Strategy::Percentage {
                percentages: percentages.to_vec(),
            },
            StrategyKind::Size => Strategy::Size {
                sizes: sizes.to_vec(),
            },
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::RoundRobin { .. } => StrategyKind::RoundRobin,
            Strategy::Percentage { .. } => StrategyKind::Percentage,
            Strategy::Size { .. } => StrategyKind::Size,
            Strategy::Rendezvous { .. } => StrategyKind::Rendezvous,
        }
    }

    /// Number of buckets this strategy emits (never 0)
    pub fn shard_count(&self) -> usize {
        let declared = match self {
            Strategy::RoundRobin { shard_count } | Strategy::Rendezvous { shard_count } => {
                *shard_count
            }
            Strategy::Percentage { percentages } => percentages.len(),
            Strategy::Size { sizes } => sizes.len(),
        };
        declared.max(1)
    }

    /// Spread the distributable pool of `partition` into buckets
    pub fn distribute(&self, partition: &Partition, seed: &str) -> Vec<Vec<String>> {
        let shards = match self {
            Strategy::RoundRobin { .. } => {
                round_robin(&partition.distributable, self.shard_count(), seed)
            }
            Strategy::Percentage { percentages } => by_percentage(percentages, partition, seed),
            Strategy::Size { sizes } => by_size(sizes, partition, seed),
            Strategy::Rendezvous { .. } => {
                rendezvous(&partition.distributable, self.shard_count(), seed)
            }
        };

        debug!(
            "Distributed {} IDs with {}: bucket sizes {:?}",
            partition.distributable.len(),
            self.kind(),
            shards.iter().map(Vec::len).collect::<Vec<_>>()
        );

        shards
    }
}

// =============================================================================
// Round-robin
// =============================================================================

fn round_robin(pool: &[String], shard_count: usize, seed: &str) -> Vec<Vec<String>> {
    let mut shards = vec![Vec::new(); shard_count];
    for (i, id) in sequence(pool, seed).into_iter().enumerate() {
        shards[i % shard_count].push(id);
    }
    shards
}

// =============================================================================
// Percentage
// =============================================================================

/// Targets are computed against the exclusion-filtered pool (reservations
/// included) and reduced by each shard's reservations. The last shard takes
/// whatever is left, which absorbs rounding.
fn by_percentage(percentages: &[u32], partition: &Partition, seed: &str) -> Vec<Vec<String>> {
    let shard_count = percentages.len().max(1);
    let total = partition.filtered_total as u64;

    carve(partition, seed, shard_count, |shard, remaining| {
        if shard == shard_count - 1 {
            return remaining;
        }
        let percentage = u64::from(percentages.get(shard).copied().unwrap_or(0));
        let target = usize::try_from(total.saturating_mul(percentage) / 100).unwrap_or(usize::MAX);
        target.saturating_sub(partition.reserved_count(shard))
    })
}

// =============================================================================
// Size
// =============================================================================

fn by_size(sizes: &[ShardSize], partition: &Partition, seed: &str) -> Vec<Vec<String>> {
    if sizes.is_empty() {
        return carve(partition, seed, 1, |_, remaining| remaining);
    }

    carve(partition, seed, sizes.len(), |shard, remaining| match sizes[shard] {
        ShardSize::Remainder => remaining,
        ShardSize::Exact(size) => size.saturating_sub(partition.reserved_count(shard)),
    })
}

/// Sequence once, then cut contiguous slices left to right
///
/// `target(shard, remaining)` returns the wanted length; it is clamped to
/// what is left, so under-supply leaves later shards empty.
fn carve<F>(partition: &Partition, seed: &str, shard_count: usize, target: F) -> Vec<Vec<String>>
where
    F: Fn(ShardIndex, usize) -> usize,
{
    let ids = sequence(&partition.distributable, seed);
    let mut shards = Vec::with_capacity(shard_count);
    let mut cursor = 0;

    for shard in 0..shard_count {
        let remaining = ids.len() - cursor;
        let take = target(shard, remaining).min(remaining);
        shards.push(ids[cursor..cursor + take].to_vec());
        cursor += take;
    }

    shards
}

// =============================================================================
// Rendezvous (highest random weight)
// =============================================================================

fn rendezvous(pool: &[String], shard_count: usize, seed: &str) -> Vec<Vec<String>> {
    let mut shards = vec![Vec::new(); shard_count];
    for id in pool {
        shards[rendezvous_shard(id, shard_count, seed)].push(id.clone());
    }
    shards
}

/// Weight of `id` on candidate `shard`: SHA-256 prefix of `"<id>:shard_<s>:<seed>"`
pub fn rendezvous_weight(id: &str, shard: ShardIndex, seed: &str) -> u64 {
    let input = format!("{}:{}:{}", id, shard_name(shard), seed);
    digest_prefix(input.as_bytes())
}

/// Winning shard for `id`: strictly highest weight, earliest index on ties
pub fn rendezvous_shard(id: &str, shard_count: usize, seed: &str) -> ShardIndex {
    let mut selected = 0;
    let mut highest = rendezvous_weight(id, 0, seed);

    for shard in 1..shard_count.max(1) {
        let weight = rendezvous_weight(id, shard, seed);
        if weight > highest {
            highest = weight;
            selected = shard;
        }
    }

    selected
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition;
    use std::collections::BTreeMap;

    fn pool(n: usize) -> Vec<String> {
        (1..=n).map(|i| i.to_string()).collect()
    }

    fn plain(ids: &[String]) -> Partition {
        partition(ids, &[], &BTreeMap::new(), 1).unwrap()
    }

    fn sizes_of(shards: &[Vec<String>]) -> Vec<usize> {
        shards.iter().map(Vec::len).collect()
    }

    #[test]
    fn test_kind_names() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
        assert_eq!(StrategyKind::RoundRobin.to_string(), "round-robin");
    }

    #[test]
    fn test_unknown_kind() {
        let err = "hash".parse::<StrategyKind>().unwrap_err();
        assert_eq!(err.name, "hash");
        let message = err.to_string();
        assert!(message.contains("\"hash\""), "{}", message);
        assert!(message.contains("rendezvous"), "{}", message);
    }

    #[test]
    fn test_shard_size_external_form() {
        assert_eq!(ShardSize::from(-1), ShardSize::Remainder);
        assert_eq!(ShardSize::from(25), ShardSize::Exact(25));
        assert_eq!(ShardSize::from(-7), ShardSize::Exact(0));
        assert_eq!(i64::from(ShardSize::Remainder), -1);
    }

    #[test]
    fn test_round_robin_cycle() {
        let ids = pool(7);
        let shards = Strategy::RoundRobin { shard_count: 3 }.distribute(&plain(&ids), "");
        assert_eq!(shards[0], vec!["1", "4", "7"]);
        assert_eq!(shards[1], vec!["2", "5"]);
        assert_eq!(shards[2], vec!["3", "6"]);
    }

    #[test]
    fn test_round_robin_balance() {
        for n in [0usize, 1, 10, 99, 1000] {
            for k in [1usize, 2, 3, 7] {
                let shards =
                    Strategy::RoundRobin { shard_count: k }.distribute(&plain(&pool(n)), "seed");
                for size in sizes_of(&shards) {
                    assert!(size == n / k || size == n.div_ceil(k), "n={} k={} size={}", n, k, size);
                }
            }
        }
    }

    #[test]
    fn test_zero_shard_count_is_one_bucket() {
        let ids = pool(5);
        let strategy = Strategy::RoundRobin { shard_count: 0 };
        assert_eq!(strategy.shard_count(), 1);
        assert_eq!(sizes_of(&strategy.distribute(&plain(&ids), "")), vec![5]);

        let strategy = Strategy::Rendezvous { shard_count: 0 };
        assert_eq!(sizes_of(&strategy.distribute(&plain(&ids), "")), vec![5]);
    }

    #[test]
    fn test_percentage_exact() {
        let strategy = Strategy::Percentage {
            percentages: vec![5, 20, 75],
        };
        let shards = strategy.distribute(&plain(&pool(1000)), "");
        assert_eq!(sizes_of(&shards), vec![50, 200, 750]);
        assert_eq!(shards[0].first().map(String::as_str), Some("1"));
        assert_eq!(shards[1].first().map(String::as_str), Some("51"));
    }

    #[test]
    fn test_percentage_last_absorbs_rounding() {
        let strategy = Strategy::Percentage {
            percentages: vec![33, 33, 34],
        };
        let shards = strategy.distribute(&plain(&pool(10)), "x");
        assert_eq!(sizes_of(&shards), vec![3, 3, 4]);
    }

    #[test]
    fn test_percentage_counts_reservations_against_target() {
        let ids = pool(100);
        let mut reserved = BTreeMap::new();
        reserved.insert(0, vec!["1".to_string(), "2".to_string()]);
        let part = partition(&ids, &[], &reserved, 2).unwrap();

        let shards = Strategy::Percentage {
            percentages: vec![10, 90],
        }
        .distribute(&part, "");
        // 10% of 100 is 10, two of which are already pinned
        assert_eq!(sizes_of(&shards), vec![8, 90]);
    }

    #[test]
    fn test_percentage_reservations_exceeding_target() {
        let ids = pool(20);
        let mut reserved = BTreeMap::new();
        reserved.insert(0, ids[..5].to_vec());
        let part = partition(&ids, &[], &reserved, 2).unwrap();

        let shards = Strategy::Percentage {
            percentages: vec![10, 90],
        }
        .distribute(&part, "");
        assert_eq!(sizes_of(&shards), vec![0, 15]);
    }

    #[test]
    fn test_percentage_empty_pool() {
        let shards = Strategy::Percentage {
            percentages: vec![50, 50],
        }
        .distribute(&plain(&[]), "");
        assert_eq!(shards, vec![Vec::<String>::new(), Vec::new()]);
    }

    #[test]
    fn test_size_with_remainder() {
        let strategy = Strategy::Size {
            sizes: vec![ShardSize::Exact(100), ShardSize::Exact(500), ShardSize::Remainder],
        };
        assert_eq!(
            sizes_of(&strategy.distribute(&plain(&pool(700)), "")),
            vec![100, 500, 100]
        );
    }

    #[test]
    fn test_size_under_supply() {
        let strategy = Strategy::Size {
            sizes: vec![ShardSize::Exact(100), ShardSize::Exact(500), ShardSize::Remainder],
        };
        assert_eq!(
            sizes_of(&strategy.distribute(&plain(&pool(50)), "seed")),
            vec![50, 0, 0]
        );
    }

    #[test]
    fn test_size_without_remainder_leaves_rest_undistributed() {
        let strategy = Strategy::Size {
            sizes: vec![ShardSize::Exact(3), ShardSize::Exact(3)],
        };
        assert_eq!(sizes_of(&strategy.distribute(&plain(&pool(10)), "")), vec![3, 3]);
    }

    #[test]
    fn test_size_net_of_reservations() {
        let ids = pool(50);
        let mut reserved = BTreeMap::new();
        reserved.insert(1, vec!["50".to_string()]);
        let part = partition(&ids, &[], &reserved, 2).unwrap();

        let strategy = Strategy::Size {
            sizes: vec![ShardSize::Exact(10), ShardSize::Exact(10)],
        };
        assert_eq!(sizes_of(&strategy.distribute(&part, "")), vec![10, 9]);
    }

    #[test]
    fn test_empty_parameter_lists_collapse_to_one_shard() {
        let ids = pool(4);
        let pct = Strategy::Percentage {
            percentages: Vec::new(),
        };
        assert_eq!(sizes_of(&pct.distribute(&plain(&ids), "")), vec![4]);
        let size = Strategy::Size { sizes: Vec::new() };
        assert_eq!(sizes_of(&size.distribute(&plain(&ids), "")), vec![4]);
    }

    #[test]
    fn test_rendezvous_known_assignments() {
        // Winners computed independently from SHA-256 prefixes
        assert_eq!(rendezvous_shard("101", 3, "canary"), 0);
        assert_eq!(rendezvous_shard("103", 3, "canary"), 2);
        assert_eq!(rendezvous_weight("101", 0, "canary"), 15558585631453534631);
        assert_eq!(rendezvous_weight("103", 1, "canary"), 5790181624667969337);
    }

    #[test]
    fn test_rendezvous_empty_seed_still_hashed() {
        let ids = pool(200);
        let with_empty = Strategy::Rendezvous { shard_count: 4 }.distribute(&plain(&ids), "");
        let with_seed = Strategy::Rendezvous { shard_count: 4 }.distribute(&plain(&ids), "s");
        assert_eq!(with_empty.iter().map(Vec::len).sum::<usize>(), 200);
        assert_ne!(with_empty, with_seed);
    }

    #[test]
    fn test_rendezvous_roughly_even() {
        let shards = Strategy::Rendezvous { shard_count: 4 }.distribute(&plain(&pool(4000)), "x");
        for size in sizes_of(&shards) {
            assert!(size > 800 && size < 1200, "uneven: {:?}", sizes_of(&shards));
        }
    }
}

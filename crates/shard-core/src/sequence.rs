//! Deterministic sequencer
//!
//! Orders the distributable pool before a strategy slices it.
//! Empty seed: the pool keeps its arrival order.
//! Non-empty seed: the pool is sorted numerically and then shuffled with a
//! Fisher-Yates pass driven by a generator seeded from SHA-256(seed), so the
//! result depends only on the seed and the *set* of identifiers. The generator
//! is [`LaggedFibonacci`], so the order matches Go's seeded `math/rand` shuffle.

use sha2::{Digest, Sha256};

use crate::id::sort_numerically;
use crate::rng::LaggedFibonacci;

/// Order `ids` for distribution
pub fn sequence(ids: &[String], seed: &str) -> Vec<String> {
    if seed.is_empty() {
        return ids.to_vec();
    }

    let mut sorted = ids.to_vec();
    sort_numerically(&mut sorted);
    shuffle(&mut sorted, seed_value(seed));
    sorted
}

/// Generator seed derived from a seed string: the SHA-256 prefix read as a
/// signed 64-bit integer
pub fn seed_value(seed: &str) -> i64 {
    digest_prefix(seed.as_bytes()) as i64
}

/// First 8 bytes of SHA-256(`input`) as a big-endian integer
pub(crate) fn digest_prefix(input: &[u8]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(input);
    let hash = hasher.finalize();

    u64::from_be_bytes([
        hash[0], hash[1], hash[2], hash[3],
        hash[4], hash[5], hash[6], hash[7],
    ])
}

/// Fisher-Yates, last index down to 1
fn shuffle(ids: &mut [String], seed: i64) {
    let mut rng = LaggedFibonacci::new(seed);
    for i in (1..ids.len()).rev() {
        let j = rng.intn(i + 1);
        ids.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pool(n: u64) -> Vec<String> {
        (1..=n).map(|i| (i * 7).to_string()).collect()
    }

    #[test]
    fn test_empty_seed_is_identity() {
        let ids: Vec<String> = ["30", "2", "111", "4"].iter().map(|s| s.to_string()).collect();
        assert_eq!(sequence(&ids, ""), ids);
    }

    #[test]
    fn test_seed_value_matches_sha256_prefix() {
        // SHA-256("") = e3b0c44298fc1c14...
        assert_eq!(seed_value(""), 0xe3b0_c442_98fc_1c14_u64 as i64);
        assert_eq!(seed_value("os-updates"), -528907639545714238);
        assert_eq!(seed_value("wave-1"), 7115605706646202014);
    }

    #[test]
    fn test_seeded_order_is_pinned() {
        let ids = pool(12);
        let expected = ["21", "14", "63", "84", "42", "28", "7", "70", "56", "49", "77", "35"];
        assert_eq!(sequence(&ids, "wave-1"), expected);

        let mut reversed = ids.clone();
        reversed.reverse();
        assert_eq!(sequence(&reversed, "wave-1"), expected);
    }

    #[test]
    fn test_seeded_is_permutation() {
        let ids = pool(200);
        let shuffled = sequence(&ids, "wave-1");
        assert_eq!(shuffled.len(), ids.len());

        let before: HashSet<_> = ids.iter().collect();
        let after: HashSet<_> = shuffled.iter().collect();
        assert_eq!(before, after);
        assert_ne!(shuffled, ids, "200 ids should not survive a shuffle in order");
    }

    #[test]
    fn test_seeded_ignores_arrival_order() {
        let ids = pool(100);
        let mut reversed = ids.clone();
        reversed.reverse();
        let mut interleaved: Vec<String> = ids.iter().step_by(2).cloned().collect();
        interleaved.extend(ids.iter().skip(1).step_by(2).cloned());

        let a = sequence(&ids, "stable");
        assert_eq!(a, sequence(&reversed, "stable"));
        assert_eq!(a, sequence(&interleaved, "stable"));
    }

    #[test]
    fn test_different_seeds_differ() {
        let ids = pool(100);
        assert_ne!(sequence(&ids, "alpha"), sequence(&ids, "beta"));
    }

    #[test]
    fn test_small_inputs() {
        assert!(sequence(&[], "seed").is_empty());
        let one = vec!["42".to_string()];
        assert_eq!(sequence(&one, "seed"), one);
    }
}

//! Identifier ordering and shard naming
//!
//! Identifiers are decimal strings. They are ordered by numeric value,
//! never lexically, and the comparison works for any number of digits.

use std::cmp::Ordering;

/// Shard index (0-based)
pub type ShardIndex = usize;

/// Prefix of the external shard name format (`shard_<N>`)
pub const SHARD_PREFIX: &str = "shard_";

/// Compare two identifiers by numeric value
///
/// Leading zeros are ignored. Two spellings of the same number
/// (`"7"` and `"007"`) fall back to byte order so the ordering stays total.
pub fn numeric_cmp(a: &str, b: &str) -> Ordering {
    let da = significant_digits(a);
    let db = significant_digits(b);
    da.len()
        .cmp(&db.len())
        .then_with(|| da.cmp(db))
        .then_with(|| a.cmp(b))
}

/// Sort identifiers ascending by numeric value, in place
pub fn sort_numerically(ids: &mut [String]) {
    ids.sort_by(|a, b| numeric_cmp(a, b));
}

/// External name of a shard index
pub fn shard_name(index: ShardIndex) -> String {
    format!("{}{}", SHARD_PREFIX, index)
}

/// Parse `shard_<N>` into its index
///
/// Returns `None` for anything that is not the prefix followed by digits.
pub fn parse_shard_name(name: &str) -> Option<ShardIndex> {
    let digits = name.strip_prefix(SHARD_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn significant_digits(id: &str) -> &str {
    id.trim_start_matches('0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_numeric_not_lexical() {
        let mut list = ids(&["10", "9", "100", "1", "25"]);
        sort_numerically(&mut list);
        assert_eq!(list, ids(&["1", "9", "10", "25", "100"]));
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(numeric_cmp("007", "8"), Ordering::Less);
        assert_eq!(numeric_cmp("0", "1"), Ordering::Less);
        assert_ne!(numeric_cmp("7", "007"), Ordering::Equal);
    }

    #[test]
    fn test_beyond_u64() {
        let big = "123456789012345678901234567890";
        assert_eq!(numeric_cmp(big, "18446744073709551615"), Ordering::Greater);
        assert_eq!(numeric_cmp(big, big), Ordering::Equal);
    }

    #[test]
    fn test_shard_name_round_trip() {
        assert_eq!(shard_name(0), "shard_0");
        assert_eq!(parse_shard_name("shard_12"), Some(12));
        assert_eq!(parse_shard_name(&shard_name(3)), Some(3));
    }

    #[test]
    fn test_parse_shard_name_rejects_garbage() {
        assert_eq!(parse_shard_name("shard_"), None);
        assert_eq!(parse_shard_name("shard_-1"), None);
        assert_eq!(parse_shard_name("shard_1a"), None);
        assert_eq!(parse_shard_name("Shard_1"), None);
        assert_eq!(parse_shard_name("1"), None);
    }
}

//! Reverse-chronological order for date-prefixed keys
//!
//! Keys shaped like `2024-03-01/order-17` are stored newest date first, so a
//! forward scan reads the most recent records without a secondary index.
//! Any ISO-8601 prefix works because reversing byte order reverses date order.

use std::cmp::Ordering;
use std::ops::Bound;

use super::{bytewise_abbreviation, bytewise_successor, shared_prefix_len, Comparator};

/// Byte at which the date part of a key ends.
pub const DATE_DELIMITER: u8 = b'/';

/// Reverse byte order, except that the empty key stays the unique minimum.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseDateComparator;

impl ReverseDateComparator {
    pub const NAME: &'static str = "sortkv.ReverseDateComparator";
}

impl Comparator for ReverseDateComparator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => b.cmp(a),
        }
    }

    fn equal(&self, a: &[u8], b: &[u8]) -> bool {
        a == b
    }

    fn abbreviated_key(&self, key: &[u8]) -> u64 {
        if key.is_empty() {
            return 0;
        }
        u64::MAX - bytewise_abbreviation(key)
    }

    /// `a < b` here means `a` is bytewise greater, so the shortest prefix of
    /// `a` that is still bytewise above `b` separates them.
    fn separator(&self, a: &[u8], b: &[u8]) -> Vec<u8> {
        if a.is_empty() || self.compare(a, b) != Ordering::Less {
            return a.to_vec();
        }
        let shared = shared_prefix_len(a, b);
        a[..=shared].to_vec()
    }

    /// Keys extending `key` all sort before it, so the bound is the key
    /// right after `key` itself. That key is finite only when `key` ends
    /// in a zero byte.
    fn successor(&self, key: &[u8]) -> Option<Vec<u8>> {
        match key.split_last() {
            Some((0, rest)) if !rest.is_empty() => Some(rest.to_vec()),
            _ => None,
        }
    }

    /// The key right after `key` is its bytewise predecessor, which only
    /// exists as a finite key in the same trailing-zero case as `successor`.
    fn immediate_successor(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.successor(key)
    }

    fn split(&self, key: &[u8]) -> usize {
        key.iter()
            .position(|&b| b == DATE_DELIMITER)
            .unwrap_or(key.len())
    }

    /// Keys with `prefix` are bytewise in `[prefix, bytewise_successor)`,
    /// which this order walks backwards: it ends (inclusive) at `prefix`.
    fn prefix_range(&self, prefix: &[u8]) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        if prefix.is_empty() {
            return (Bound::Unbounded, Bound::Unbounded);
        }
        // Excluding the empty key keeps the minimum out of an otherwise
        // unbounded start.
        let lower = Bound::Excluded(bytewise_successor(prefix).unwrap_or_default());
        (lower, Bound::Included(prefix.to_vec()))
    }
}

//! Comparator Module
//!
//! Pluggable total order over binary keys.
//!
//! ## Responsibilities
//! - Define the order every write, table and iterator observes
//! - Provide key-shrinking helpers used by table indexes (`separator`)
//!   and prefix scans (`successor`, `prefix_range`, `split`)
//! - Provide a cheap integer projection (`abbreviated_key`) so the
//!   memtable can skip most full comparisons
//!
//! ## Required Axioms
//! For all keys `a`, `b`, `c`:
//! - `compare(a, a) == Equal`
//! - `compare(a, b) == compare(b, a).reverse()`
//! - `compare(a, b) == Less && compare(b, c) == Less` implies `compare(a, c) == Less`
//! - `equal(a, b) == (compare(a, b) == Equal)`
//! - `abbreviated_key(a) < abbreviated_key(b)` implies `compare(a, b) == Less`
//!
//! Violating these is undefined behaviour for the engine: keys may be lost
//! from scans or returned out of order. Nothing checks them at runtime.
//!
//! ## Auxiliary Operations
//! The default bodies of `abbreviated_key`, `separator`, `successor`,
//! `immediate_successor` and `split` are legal identity fallbacks. They keep
//! the engine correct but give up the optimization each one exists for:
//!
//! | operation             | fallback  | cost of the fallback                     |
//! |-----------------------|-----------|------------------------------------------|
//! | `abbreviated_key`     | `0`       | every memtable probe is a full compare   |
//! | `separator`           | `a`       | index entries are full keys              |
//! | `successor`           | `None`    | prefix scans run to the end              |
//! | `immediate_successor` | `None`    | exclusive bounds stay exclusive          |
//! | `split`               | whole key | `seek_prefix_ge` matches exact keys only |

mod bytewise;
mod reverse_date;

use std::cmp::Ordering;
use std::ops::Bound;

pub use bytewise::BytewiseComparator;
pub use reverse_date::{ReverseDateComparator, DATE_DELIMITER};

pub(crate) use bytewise::{bytewise_abbreviation, bytewise_successor};

/// A total order over binary keys plus the helpers the engine needs from it.
///
/// Implementations are stateless and pure, so the engine calls them from any
/// thread without synchronization.
pub trait Comparator: Send + Sync + 'static {
    /// Stable identifier persisted in the manifest and in every table.
    /// Changing it makes existing databases refuse to open.
    fn name(&self) -> &str;

    /// Three-way comparison defining the key order.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Key equality. Must agree with `compare`.
    fn equal(&self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    /// Order-compatible projection of `key` onto a `u64`.
    ///
    /// A strictly smaller abbreviation must mean a strictly smaller key;
    /// equal abbreviations say nothing and fall back to `compare`.
    fn abbreviated_key(&self, _key: &[u8]) -> u64 {
        0
    }

    /// Given `a < b`, returns some `s` with `a <= s < b`, as short as
    /// possible. Tables store these between adjacent blocks.
    fn separator(&self, a: &[u8], _b: &[u8]) -> Vec<u8> {
        a.to_vec()
    }

    /// Exclusive upper bound for every key that has `key` as a byte prefix,
    /// or `None` when no finite bound exists.
    fn successor(&self, _key: &[u8]) -> Option<Vec<u8>> {
        None
    }

    /// The smallest key strictly greater than `key`, or `None` when the
    /// order has no such finite key. Turns an exclusive lower bound into an
    /// inclusive one.
    fn immediate_successor(&self, _key: &[u8]) -> Option<Vec<u8>> {
        None
    }

    /// Length of the user-visible prefix of `key`. Pure function of the key.
    fn split(&self, key: &[u8]) -> usize {
        key.len()
    }

    /// Bounds selecting exactly the keys that start with `prefix`.
    ///
    /// Defaults to `[prefix, successor(prefix))`. Orders that do not keep
    /// byte prefixes contiguous from the prefix upward must override this.
    fn prefix_range(&self, prefix: &[u8]) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        let upper = match self.successor(prefix) {
            Some(limit) => Bound::Excluded(limit),
            None => Bound::Unbounded,
        };
        (Bound::Included(prefix.to_vec()), upper)
    }

    /// Human readable rendering of a key for logs and the CLI.
    fn format_key(&self, key: &[u8]) -> String {
        String::from_utf8_lossy(key).into_owned()
    }

    /// Human readable rendering of a value.
    fn format_value(&self, value: &[u8]) -> String {
        String::from_utf8_lossy(value).into_owned()
    }
}

/// Length of the longest common byte prefix of `a` and `b`.
pub(crate) fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

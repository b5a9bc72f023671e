//! MemTable implementation
//!
//! Comparator-ordered BTreeMap with RwLock for concurrency.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use super::MemTableEntry;
use crate::comparator::Comparator;

/// Map key ordered by the installed comparator
///
/// Carries its abbreviation so most comparisons are a single integer compare.
struct MemKey<C> {
    abbrev: u64,
    key: Bytes,
    comparator: Arc<C>,
}

impl<C: Comparator> MemKey<C> {
    fn new(comparator: &Arc<C>, key: Bytes) -> Self {
        Self {
            abbrev: comparator.abbreviated_key(&key),
            key,
            comparator: Arc::clone(comparator),
        }
    }
}

impl<C> Clone for MemKey<C> {
    fn clone(&self) -> Self {
        Self {
            abbrev: self.abbrev,
            key: self.key.clone(),
            comparator: Arc::clone(&self.comparator),
        }
    }
}

impl<C: Comparator> Ord for MemKey<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.abbrev
            .cmp(&other.abbrev)
            .then_with(|| self.comparator.compare(&self.key, &other.key))
    }
}

impl<C: Comparator> PartialOrd for MemKey<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: Comparator> PartialEq for MemKey<C> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<C: Comparator> Eq for MemKey<C> {}

type EntryMap<C> = BTreeMap<MemKey<C>, MemTableEntry>;

fn entry_size(key_len: usize, entry: &MemTableEntry) -> usize {
    key_len + entry.value().map_or(0, |v| v.len())
}

/// In-memory table for recent writes
///
/// ## Concurrency:
/// - `entries`: RwLock around an `Arc`; readers clone the `Arc` and drop the lock
/// - `size`: Atomic so `size()` never takes the lock
/// - Writers are expected to be serialized by the engine's write lock
pub struct MemTable<C: Comparator> {
    comparator: Arc<C>,
    entries: RwLock<Arc<EntryMap<C>>>,
    size: AtomicUsize,
}

impl<C: Comparator> MemTable<C> {
    /// Create a new empty MemTable ordered by `comparator`
    pub fn new(comparator: Arc<C>) -> Self {
        Self {
            comparator,
            entries: RwLock::new(Arc::new(BTreeMap::new())),
            size: AtomicUsize::new(0),
        }
    }

    /// Get the entry for a key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        let probe = MemKey::new(&self.comparator, Bytes::copy_from_slice(key));
        self.entries.read().get(&probe).cloned()
    }

    /// Put a key-value pair (write lock)
    ///
    /// Returns the new approximate size in bytes.
    pub fn put(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> usize {
        self.upsert(key.into(), MemTableEntry::Value(value.into()))
    }

    /// Delete a key (write lock, inserts tombstone)
    ///
    /// Returns the new approximate size in bytes.
    pub fn delete(&self, key: impl Into<Bytes>) -> usize {
        self.upsert(key.into(), MemTableEntry::Tombstone)
    }

    fn upsert(&self, key: Bytes, entry: MemTableEntry) -> usize {
        let key_len = key.len();
        let added = entry_size(key_len, &entry);
        let key = MemKey::new(&self.comparator, key);

        let mut guard = self.entries.write();
        // Copies the map only if an iterator still holds the previous snapshot.
        let entries = Arc::make_mut(&mut *guard);
        if let Some(old) = entries.insert(key, entry) {
            self.size
                .fetch_sub(entry_size(key_len, &old), AtomicOrdering::SeqCst);
        }
        self.size.fetch_add(added, AtomicOrdering::SeqCst) + added
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(AtomicOrdering::SeqCst)
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Point-in-time view of the table, unaffected by later writes
    pub fn snapshot(&self) -> MemSnapshot<C> {
        MemSnapshot {
            entries: Arc::clone(&self.entries.read()),
            comparator: Arc::clone(&self.comparator),
        }
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut guard = self.entries.write();
        *guard = Arc::new(BTreeMap::new());
        self.size.store(0, AtomicOrdering::SeqCst);
    }
}

/// Immutable, sorted view of a MemTable
pub struct MemSnapshot<C: Comparator> {
    entries: Arc<EntryMap<C>>,
    comparator: Arc<C>,
}

impl<C: Comparator> Clone for MemSnapshot<C> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            comparator: Arc::clone(&self.comparator),
        }
    }
}

impl<C: Comparator> MemSnapshot<C> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in comparator order (tombstones included)
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &MemTableEntry)> + '_ {
        self.entries.iter().map(|(k, e)| (&k.key, e))
    }

    pub fn first(&self) -> Option<(&Bytes, &MemTableEntry)> {
        self.entries.iter().next().map(|(k, e)| (&k.key, e))
    }

    pub fn last(&self) -> Option<(&Bytes, &MemTableEntry)> {
        self.entries.iter().next_back().map(|(k, e)| (&k.key, e))
    }

    /// First entry with key `>= target`
    pub fn seek_ge(&self, target: &[u8]) -> Option<(&Bytes, &MemTableEntry)> {
        self.range(Bound::Included(self.probe(target)), Bound::Unbounded)
            .next()
    }

    /// First entry with key `> target`
    pub fn seek_gt(&self, target: &[u8]) -> Option<(&Bytes, &MemTableEntry)> {
        self.range(Bound::Excluded(self.probe(target)), Bound::Unbounded)
            .next()
    }

    /// Last entry with key `< target`
    pub fn seek_lt(&self, target: &[u8]) -> Option<(&Bytes, &MemTableEntry)> {
        self.range(Bound::Unbounded, Bound::Excluded(self.probe(target)))
            .next_back()
    }

    /// Last entry with key `<= target`
    pub fn seek_le(&self, target: &[u8]) -> Option<(&Bytes, &MemTableEntry)> {
        self.range(Bound::Unbounded, Bound::Included(self.probe(target)))
            .next_back()
    }

    fn probe(&self, target: &[u8]) -> MemKey<C> {
        MemKey::new(&self.comparator, Bytes::copy_from_slice(target))
    }

    // One side is always unbounded, so `BTreeMap::range` cannot see an
    // inverted range.
    fn range(
        &self,
        lower: Bound<MemKey<C>>,
        upper: Bound<MemKey<C>>,
    ) -> impl DoubleEndedIterator<Item = (&Bytes, &MemTableEntry)> + '_ {
        self.entries
            .range((lower, upper))
            .map(|(k, e)| (&k.key, e))
    }
}

//! MemTable Tests
//!
//! Tests verify:
//! - Basic CRUD operations
//! - Size tracking
//! - Tombstone handling
//! - Ordering by the installed comparator
//! - Snapshot isolation
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use sortkv::comparator::{BytewiseComparator, ReverseDateComparator};
use sortkv::memtable::{MemTable, MemTableEntry};

fn bytewise() -> MemTable<BytewiseComparator> {
    MemTable::new(Arc::new(BytewiseComparator))
}

fn value(v: &'static [u8]) -> Option<MemTableEntry> {
    Some(MemTableEntry::Value(Bytes::from_static(v)))
}

fn keys_of<C: sortkv::Comparator>(memtable: &MemTable<C>) -> Vec<Vec<u8>> {
    memtable
        .snapshot()
        .iter()
        .map(|(k, _)| k.to_vec())
        .collect()
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = bytewise();
    assert_eq!(memtable.entry_count(), 0);
    assert_eq!(memtable.size(), 0);
    assert!(memtable.is_empty());
}

#[test]
fn test_put_and_get() {
    let memtable = bytewise();

    memtable.put(&b"key1"[..], &b"value1"[..]);

    assert_eq!(memtable.get(b"key1"), value(b"value1"));
}

#[test]
fn test_get_nonexistent_key() {
    let memtable = bytewise();
    assert_eq!(memtable.get(b"nonexistent"), None);
}

#[test]
fn test_put_overwrites_existing() {
    let memtable = bytewise();

    memtable.put(&b"key1"[..], &b"value1"[..]);
    memtable.put(&b"key1"[..], &b"value2"[..]);

    assert_eq!(memtable.entry_count(), 1);
    assert_eq!(memtable.get(b"key1"), value(b"value2"));
}

// =============================================================================
// Delete / Tombstone Tests
// =============================================================================

#[test]
fn test_delete_creates_tombstone() {
    let memtable = bytewise();

    memtable.put(&b"key1"[..], &b"value1"[..]);
    memtable.delete(&b"key1"[..]);

    assert_eq!(memtable.get(b"key1"), Some(MemTableEntry::Tombstone));
    assert_eq!(memtable.entry_count(), 1);
}

#[test]
fn test_delete_nonexistent_key_still_records_tombstone() {
    let memtable = bytewise();

    memtable.delete(&b"ghost"[..]);

    assert_eq!(memtable.get(b"ghost"), Some(MemTableEntry::Tombstone));
    assert!(!memtable.is_empty());
}

#[test]
fn test_put_after_delete_revives_key() {
    let memtable = bytewise();

    memtable.put(&b"k"[..], &b"v1"[..]);
    memtable.delete(&b"k"[..]);
    memtable.put(&b"k"[..], &b"v2"[..]);

    assert_eq!(memtable.get(b"k"), value(b"v2"));
}

// =============================================================================
// Size Tracking Tests
// =============================================================================

#[test]
fn test_size_tracks_keys_and_values() {
    let memtable = bytewise();

    let size = memtable.put(&b"abc"[..], &b"12345"[..]);
    assert_eq!(size, 8);
    assert_eq!(memtable.size(), 8);

    // Overwrite replaces the old value's contribution
    memtable.put(&b"abc"[..], &b"1"[..]);
    assert_eq!(memtable.size(), 4);

    // A tombstone only counts its key
    memtable.delete(&b"abc"[..]);
    assert_eq!(memtable.size(), 3);
}

#[test]
fn test_should_flush() {
    let memtable = bytewise();
    memtable.put(&b"key"[..], vec![0u8; 100]);

    assert!(memtable.should_flush(50));
    assert!(memtable.should_flush(103));
    assert!(!memtable.should_flush(104));
}

#[test]
fn test_clear() {
    let memtable = bytewise();
    memtable.put(&b"a"[..], &b"1"[..]);
    memtable.put(&b"b"[..], &b"2"[..]);

    memtable.clear();

    assert!(memtable.is_empty());
    assert_eq!(memtable.size(), 0);
    assert_eq!(memtable.get(b"a"), None);
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_bytewise_order() {
    let memtable = bytewise();
    for key in ["delta", "alpha", "charlie", "bravo", "alp"] {
        memtable.put(key.as_bytes().to_vec(), &b"v"[..]);
    }

    assert_eq!(
        keys_of(&memtable),
        vec![
            b"alp".to_vec(),
            b"alpha".to_vec(),
            b"bravo".to_vec(),
            b"charlie".to_vec(),
            b"delta".to_vec()
        ]
    );
}

#[test]
fn test_reverse_date_order() {
    let memtable = MemTable::new(Arc::new(ReverseDateComparator));
    for key in ["2024-01-15/a", "2024-03-01/b", "", "2023-12-31/c", "2024-03-01/a"] {
        memtable.put(key.as_bytes().to_vec(), &b"v"[..]);
    }

    assert_eq!(
        keys_of(&memtable),
        vec![
            b"".to_vec(),
            b"2024-03-01/b".to_vec(),
            b"2024-03-01/a".to_vec(),
            b"2024-01-15/a".to_vec(),
            b"2023-12-31/c".to_vec(),
        ]
    );
}

#[test]
fn test_keys_sharing_abbreviation_stay_distinct() {
    // Same first eight bytes, so only the full comparison tells them apart
    let memtable = bytewise();
    memtable.put(&b"prefix00-b"[..], &b"2"[..]);
    memtable.put(&b"prefix00-a"[..], &b"1"[..]);
    memtable.put(&b"prefix00"[..], &b"0"[..]);

    assert_eq!(memtable.entry_count(), 3);
    assert_eq!(memtable.get(b"prefix00-a"), value(b"1"));
    assert_eq!(
        keys_of(&memtable),
        vec![
            b"prefix00".to_vec(),
            b"prefix00-a".to_vec(),
            b"prefix00-b".to_vec()
        ]
    );
}

#[test]
fn test_snapshot_seeks() {
    let memtable = bytewise();
    for key in ["b", "d", "f"] {
        memtable.put(key.as_bytes().to_vec(), &b"v"[..]);
    }
    let snapshot = memtable.snapshot();
    let key = |found: Option<(&Bytes, &MemTableEntry)>| found.map(|(k, _)| k.to_vec());

    assert_eq!(key(snapshot.first()), Some(b"b".to_vec()));
    assert_eq!(key(snapshot.last()), Some(b"f".to_vec()));
    assert_eq!(key(snapshot.seek_ge(b"a")), Some(b"b".to_vec()));
    assert_eq!(key(snapshot.seek_ge(b"d")), Some(b"d".to_vec()));
    assert_eq!(key(snapshot.seek_gt(b"d")), Some(b"f".to_vec()));
    assert_eq!(key(snapshot.seek_gt(b"f")), None);
    assert_eq!(key(snapshot.seek_lt(b"d")), Some(b"b".to_vec()));
    assert_eq!(key(snapshot.seek_lt(b"b")), None);
    assert_eq!(key(snapshot.seek_le(b"e")), Some(b"d".to_vec()));
    assert_eq!(key(snapshot.seek_le(b"z")), Some(b"f".to_vec()));
}

#[test]
fn test_snapshot_seeks_follow_reverse_order() {
    let memtable = MemTable::new(Arc::new(ReverseDateComparator));
    for key in ["2024-01-01/a", "2024-02-01/a", "2024-03-01/a"] {
        memtable.put(key.as_bytes().to_vec(), &b"v"[..]);
    }
    let snapshot = memtable.snapshot();

    let (next, _) = snapshot.seek_gt(b"2024-03-01/a").unwrap();
    assert_eq!(next.as_ref(), b"2024-02-01/a");
    let (prev, _) = snapshot.seek_lt(b"2024-01-01/a").unwrap();
    assert_eq!(prev.as_ref(), b"2024-02-01/a");
}

#[test]
fn test_scattered_inserts_stay_sorted() {
    let memtable = bytewise();
    let n: u64 = 20_000;
    for i in 0..n {
        let scrambled = i.wrapping_mul(2_654_435_761) % 1_000_000_007;
        memtable.put(format!("key{:010}", scrambled).into_bytes(), &b"v"[..]);
    }

    let keys = keys_of(&memtable);
    assert_eq!(keys.len() as u64, n);
    assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(memtable.entry_count() as u64, n);
}

// =============================================================================
// Snapshot Isolation Tests
// =============================================================================

#[test]
fn test_snapshot_unaffected_by_later_writes() {
    let memtable = bytewise();
    memtable.put(&b"a"[..], &b"1"[..]);

    let snapshot = memtable.snapshot();

    memtable.put(&b"b"[..], &b"2"[..]);
    memtable.put(&b"a"[..], &b"changed"[..]);
    memtable.clear();

    assert_eq!(snapshot.len(), 1);
    let (key, entry) = snapshot.first().unwrap();
    assert_eq!(key.as_ref(), b"a");
    assert_eq!(entry, &MemTableEntry::Value(Bytes::from_static(b"1")));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_readers_with_writer() {
    let memtable = Arc::new(bytewise());
    for i in 0..100 {
        memtable.put(format!("key{:03}", i).into_bytes(), &b"v"[..]);
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let memtable = Arc::clone(&memtable);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                let key = format!("key{:03}", i);
                assert!(memtable.get(key.as_bytes()).is_some());
            }
        }));
    }

    let writer = {
        let memtable = Arc::clone(&memtable);
        thread::spawn(move || {
            for i in 100..200 {
                memtable.put(format!("key{:03}", i).into_bytes(), &b"v"[..]);
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    writer.join().unwrap();

    assert_eq!(memtable.entry_count(), 200);
}

//! Iterator Tests
//!
//! Tests verify:
//! - Order follows the engine's comparator (bytewise and reverse-date)
//! - Prefix iteration under both orders
//! - Bounds, empty ranges and seeks relative to bounds
//! - Merging memtable and tables, newest wins, tombstones hidden
//! - Bidirectional movement across blocks and runs
//! - Snapshot isolation and release
//! - Contract violations on unpositioned iterators

use std::ops::Bound;

use sortkv::{
    BytewiseComparator, Comparator, Config, DbIterator, Engine, IterOptions, IterState,
    ReverseDateComparator, SortError,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open<C: Comparator>(dir: &TempDir, comparator: C) -> Engine<C> {
    let config = Config::builder()
        .data_dir(dir.path())
        .block_size(64)
        .build();
    Engine::open(config, comparator).unwrap()
}

fn put_all<C: Comparator>(engine: &Engine<C>, keys: &[&str]) {
    for key in keys {
        engine.put(key.as_bytes(), key.as_bytes()).unwrap();
    }
}

/// Keys from `seek_first` forward
fn forward<C: Comparator>(iter: &mut DbIterator<C>) -> Vec<String> {
    iter.entries()
        .map(|e| String::from_utf8(e.unwrap().0.to_vec()).unwrap())
        .collect()
}

/// Keys from `seek_last` backward
fn backward<C: Comparator>(iter: &mut DbIterator<C>) -> Vec<String> {
    let mut keys = Vec::new();
    let mut more = iter.seek_last().unwrap();
    while more {
        keys.push(String::from_utf8(iter.key().unwrap().to_vec()).unwrap());
        more = iter.prev().unwrap();
    }
    keys
}

/// Keys from the current position forward
fn rest<C: Comparator>(iter: &mut DbIterator<C>) -> Vec<String> {
    let mut keys = Vec::new();
    while iter.valid() {
        keys.push(String::from_utf8(iter.key().unwrap().to_vec()).unwrap());
        iter.next().unwrap();
    }
    keys
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_bytewise_full_scan() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);
    put_all(&engine, &["hello", "world", "hello world"]);

    let mut iter = engine.new_iter(IterOptions::new());
    assert_eq!(forward(&mut iter), vec!["hello", "hello world", "world"]);
}

#[test]
fn test_reverse_date_full_scan() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ReverseDateComparator);
    put_all(&engine, &["hello", "world", "hello world"]);

    let mut iter = engine.new_iter(IterOptions::new());
    assert_eq!(forward(&mut iter), vec!["world", "hello world", "hello"]);
    assert_eq!(backward(&mut iter), vec!["hello", "hello world", "world"]);
}

#[test]
fn test_reverse_date_scan_survives_flush() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ReverseDateComparator);
    put_all(&engine, &["2024-01-15/b", "2023-12-31/c"]);
    engine.flush().unwrap();
    put_all(&engine, &["2024-03-01/a", "2024-01-15/a"]);

    let mut iter = engine.new_iter(IterOptions::new());
    assert_eq!(
        forward(&mut iter),
        vec!["2024-03-01/a", "2024-01-15/b", "2024-01-15/a", "2023-12-31/c"]
    );
}

#[test]
fn test_values_follow_keys() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);
    engine.put(b"k1", b"one").unwrap();
    engine.put(b"k2", b"two").unwrap();

    let mut iter = engine.new_iter(IterOptions::new());
    assert!(iter.seek_ge(b"k2").unwrap());
    assert_eq!(iter.key().unwrap(), b"k2");
    assert_eq!(iter.value().unwrap(), b"two");
    assert_eq!(iter.current(), Some((&b"k2"[..], &b"two"[..])));
}

// =============================================================================
// Prefix Tests
// =============================================================================

#[test]
fn test_prefix_iteration_bytewise() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);
    put_all(&engine, &["hello", "world", "hello world", "hellp", "hell"]);

    let mut iter = engine.prefix_iter(b"hello");
    assert_eq!(forward(&mut iter), vec!["hello", "hello world"]);
}

#[test]
fn test_prefix_iteration_reverse_date() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ReverseDateComparator);
    put_all(&engine, &["hello", "world", "hello world", "hellp", "hell"]);

    let mut iter = engine.prefix_iter(b"hello");
    assert_eq!(forward(&mut iter), vec!["hello world", "hello"]);
    assert_eq!(backward(&mut iter), vec!["hello", "hello world"]);
}

#[test]
fn test_set_prefix_on_existing_iterator() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ReverseDateComparator);
    put_all(&engine, &["2024-03-01/a", "2024-03-01/b", "2024-03-02/x", "2024-02-28/z"]);
    engine.flush().unwrap();

    let mut iter = engine.new_iter(IterOptions::new());
    iter.set_prefix(b"2024-03-01");
    assert_eq!(iter.state(), IterState::Unpositioned);
    assert_eq!(forward(&mut iter), vec!["2024-03-01/b", "2024-03-01/a"]);
}

#[test]
fn test_seek_prefix_ge_uses_split() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ReverseDateComparator);
    put_all(&engine, &["2024-03-01/a", "2024-03-01/b", "2024-03-02/x", "2024-02-28/z"]);

    let mut iter = engine.new_iter(IterOptions::new());
    assert!(iter.seek_prefix_ge(b"2024-03-01/b").unwrap());
    assert_eq!(rest(&mut iter), vec!["2024-03-01/b", "2024-03-01/a"]);
    assert_eq!(iter.state(), IterState::Exhausted);
}

// =============================================================================
// Bounds Tests
// =============================================================================

#[test]
fn test_bounds_with_seek_ge() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);
    put_all(&engine, &["a", "b", "c", "d", "e", "f"]);

    let mut iter = engine.new_iter(IterOptions::new());
    iter.set_bounds(Some(b"a".as_slice()), Some(b"f".as_slice()));
    assert!(iter.seek_ge(b"c").unwrap());
    assert_eq!(rest(&mut iter), vec!["c", "d", "e"]);
}

#[test]
fn test_bounds_from_options() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);
    put_all(&engine, &["a", "b", "c", "d", "e", "f"]);

    let mut iter = engine.new_iter(IterOptions::new().lower_bound("b").upper_bound("e"));
    assert_eq!(forward(&mut iter), vec!["b", "c", "d"]);
    assert_eq!(backward(&mut iter), vec!["d", "c", "b"]);
    assert_eq!(
        iter.bounds(),
        (Bound::Included(&b"b"[..]), Bound::Excluded(&b"e"[..]))
    );
}

#[test]
fn test_seek_outside_bounds_clamps() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);
    put_all(&engine, &["a", "b", "c", "d", "e", "f"]);

    let mut iter = engine.new_iter(IterOptions::new().lower_bound("b").upper_bound("e"));
    // Below the lower bound starts at it
    assert!(iter.seek_ge(b"a").unwrap());
    assert_eq!(iter.key().unwrap(), b"b");
    // Past the upper bound starts below it
    assert!(iter.seek_lt(b"z").unwrap());
    assert_eq!(iter.key().unwrap(), b"d");
    // Past the upper bound going forward finds nothing
    assert!(!iter.seek_ge(b"e").unwrap());
    assert_eq!(iter.state(), IterState::Exhausted);
}

#[test]
fn test_inclusive_and_exclusive_range_bounds() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);
    put_all(&engine, &["a", "b", "c", "d"]);

    let options = IterOptions::range(Bound::Excluded(b"a".to_vec()), Bound::Included(b"c".to_vec()));
    let mut iter = engine.new_iter(options);
    assert_eq!(forward(&mut iter), vec!["b", "c"]);
    assert_eq!(backward(&mut iter), vec!["c", "b"]);
}

#[test]
fn test_empty_range_is_exhausted() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);
    put_all(&engine, &["a", "b", "c", "d", "e", "f"]);

    let mut iter = engine.new_iter(IterOptions::new());
    iter.set_bounds(Some(b"f".as_slice()), Some(b"a".as_slice()));

    assert_eq!(iter.state(), IterState::Exhausted);
    assert!(!iter.seek_first().unwrap());
    assert!(!iter.seek_last().unwrap());
    assert!(!iter.seek_ge(b"c").unwrap());
    assert!(!iter.valid());

    // Equal bounds select nothing either
    iter.set_bounds(Some(b"c".as_slice()), Some(b"c".as_slice()));
    assert_eq!(iter.state(), IterState::Exhausted);
}

#[test]
fn test_bounds_follow_comparator_order() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ReverseDateComparator);
    put_all(&engine, &["a", "b", "c", "d", "e", "f"]);

    // Under reverse order "e" sorts before "b"
    let mut iter = engine.new_iter(IterOptions::new().lower_bound("e").upper_bound("b"));
    assert_eq!(forward(&mut iter), vec!["e", "d", "c"]);

    iter.set_bounds(Some(b"b".as_slice()), Some(b"e".as_slice()));
    assert_eq!(iter.state(), IterState::Exhausted);
}

#[test]
fn test_set_bounds_resets_position() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);
    put_all(&engine, &["a", "b", "c"]);

    let mut iter = engine.new_iter(IterOptions::new());
    assert!(iter.seek_first().unwrap());
    iter.set_bounds(None, Some(b"c".as_slice()));

    assert_eq!(iter.state(), IterState::Unpositioned);
    assert_eq!(backward(&mut iter), vec!["b", "a"]);
}

// =============================================================================
// Merge Tests
// =============================================================================

#[test]
fn test_merge_memtable_and_tables() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);

    put_all(&engine, &["a", "c", "e"]);
    engine.flush().unwrap();
    put_all(&engine, &["b", "d"]);
    engine.flush().unwrap();
    put_all(&engine, &["f", "0"]);

    let mut iter = engine.new_iter(IterOptions::new());
    assert_eq!(forward(&mut iter), vec!["0", "a", "b", "c", "d", "e", "f"]);
    assert_eq!(backward(&mut iter), vec!["f", "e", "d", "c", "b", "a", "0"]);
}

#[test]
fn test_newest_value_wins() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);

    engine.put(b"k", b"table-1").unwrap();
    engine.flush().unwrap();
    engine.put(b"k", b"table-2").unwrap();
    engine.flush().unwrap();

    let mut iter = engine.new_iter(IterOptions::new());
    assert!(iter.seek_first().unwrap());
    assert_eq!(iter.value().unwrap(), b"table-2");
    drop(iter);

    engine.put(b"k", b"memtable").unwrap();
    let mut iter = engine.new_iter(IterOptions::new());
    assert!(iter.seek_first().unwrap());
    assert_eq!(iter.value().unwrap(), b"memtable");
    assert!(!iter.next().unwrap());
}

#[test]
fn test_tombstones_are_skipped() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);

    put_all(&engine, &["a", "b", "c", "d"]);
    engine.flush().unwrap();
    engine.delete(b"b").unwrap();
    engine.delete(b"c").unwrap();
    engine.flush().unwrap();
    engine.delete(b"d").unwrap();

    let mut iter = engine.new_iter(IterOptions::new());
    assert_eq!(forward(&mut iter), vec!["a"]);
    assert_eq!(backward(&mut iter), vec!["a"]);

    // Seeking onto a deleted key lands on the next live one
    assert!(!iter.seek_ge(b"b").unwrap());
    assert!(iter.seek_lt(b"d").unwrap());
    assert_eq!(iter.key().unwrap(), b"a");
}

#[test]
fn test_direction_changes_across_blocks() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);
    let keys: Vec<String> = (0..300).map(|i| format!("key{:04}", i)).collect();
    for (i, key) in keys.iter().enumerate() {
        engine.put(key.as_bytes(), b"v").unwrap();
        if i % 100 == 99 {
            engine.flush().unwrap();
        }
    }

    let mut iter = engine.new_iter(IterOptions::new());
    assert!(iter.seek_ge(b"key0150").unwrap());
    assert!(iter.next().unwrap());
    assert_eq!(iter.key().unwrap(), b"key0151");
    assert!(iter.prev().unwrap());
    assert!(iter.prev().unwrap());
    assert_eq!(iter.key().unwrap(), b"key0149");
    assert!(iter.next().unwrap());
    assert_eq!(iter.key().unwrap(), b"key0150");

    assert_eq!(forward(&mut iter).len(), 300);
    assert_eq!(backward(&mut iter).len(), 300);
}

// =============================================================================
// Snapshot Tests
// =============================================================================

#[test]
fn test_iterator_sees_snapshot_only() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);
    put_all(&engine, &["a", "b"]);

    let mut iter = engine.new_iter(IterOptions::new());

    engine.put(b"c", b"c").unwrap();
    engine.delete(b"a").unwrap();
    engine.flush().unwrap();

    assert_eq!(forward(&mut iter), vec!["a", "b"]);

    let mut fresh = engine.new_iter(IterOptions::new());
    assert_eq!(forward(&mut fresh), vec!["b", "c"]);
}

#[test]
fn test_close_releases_snapshot() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);
    assert_eq!(engine.open_iterators(), 0);

    let first = engine.new_iter(IterOptions::new());
    let second = engine.prefix_iter(b"x");
    assert_eq!(engine.open_iterators(), 2);

    first.close();
    assert_eq!(engine.open_iterators(), 1);

    drop(second);
    assert_eq!(engine.open_iterators(), 0);
}

// =============================================================================
// State and Contract Tests
// =============================================================================

#[test]
fn test_unpositioned_access_is_contract_violation() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);
    put_all(&engine, &["a"]);

    let mut iter = engine.new_iter(IterOptions::new());
    assert_eq!(iter.state(), IterState::Unpositioned);
    assert!(!iter.valid());
    assert!(matches!(iter.key(), Err(SortError::ContractViolation(_))));
    assert!(matches!(iter.value(), Err(SortError::ContractViolation(_))));
    assert_eq!(iter.current(), None);

    // Moving without a position does nothing
    assert!(!iter.next().unwrap());
    assert!(!iter.prev().unwrap());
    assert_eq!(iter.state(), IterState::Unpositioned);
}

#[test]
fn test_exhausted_after_running_off_the_end() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, BytewiseComparator);
    put_all(&engine, &["a", "b"]);

    let mut iter = engine.new_iter(IterOptions::new());
    assert!(iter.seek_last().unwrap());
    assert_eq!(iter.state(), IterState::Positioned);
    assert!(!iter.next().unwrap());
    assert_eq!(iter.state(), IterState::Exhausted);
    assert!(matches!(iter.key(), Err(SortError::ContractViolation(_))));

    // A new seek repositions
    assert!(iter.seek_first().unwrap());
    assert_eq!(iter.key().unwrap(), b"a");
}

#[test]
fn test_empty_engine() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir, ReverseDateComparator);

    let mut iter = engine.new_iter(IterOptions::new());
    assert!(!iter.seek_first().unwrap());
    assert!(!iter.seek_last().unwrap());
    assert_eq!(iter.state(), IterState::Exhausted);
    assert!(forward(&mut iter).is_empty());
}

#[test]
fn test_empty_key_sorts_first_in_both_orders() {
    let dir = TempDir::new().unwrap();
    let bytewise = open(&dir, BytewiseComparator);
    put_all(&bytewise, &["b", "", "a"]);
    let mut iter = bytewise.new_iter(IterOptions::new());
    assert_eq!(forward(&mut iter), vec!["", "a", "b"]);

    let dir = TempDir::new().unwrap();
    let reverse = open(&dir, ReverseDateComparator);
    put_all(&reverse, &["b", "", "a"]);
    reverse.flush().unwrap();
    let mut iter = reverse.new_iter(IterOptions::new());
    assert_eq!(forward(&mut iter), vec!["", "b", "a"]);
}

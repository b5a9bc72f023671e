//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Track size for flush triggers
//! - Ordered snapshots for table creation and iterators
//!
//! ## Data Structure Choice
//! A `BTreeMap` behind `RwLock<Arc<..>>`, ordered by the engine's comparator:
//! - Map keys compare by abbreviated key first, full compare only on ties
//! - Inserts are O(log n) regardless of key arrival order
//! - Readers clone the `Arc` to get a point-in-time snapshot
//! - Writers mutate in place unless a snapshot is alive, then copy once

mod table;

use bytes::Bytes;

pub use table::{MemSnapshot, MemTable};

/// Entry stored in the MemTable
#[derive(Debug, Clone, PartialEq)]
pub enum MemTableEntry {
    /// A live value
    Value(Bytes),

    /// A tombstone (deleted key)
    Tombstone,
}

impl MemTableEntry {
    /// The value, or `None` for a tombstone
    pub fn value(&self) -> Option<&Bytes> {
        match self {
            MemTableEntry::Value(v) => Some(v),
            MemTableEntry::Tombstone => None,
        }
    }
}

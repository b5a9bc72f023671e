//! Storage Module
//!
//! Persistent storage layer: immutable comparator-sorted tables plus the
//! manifest that pins a database to its comparator.
//!
//! ## Responsibilities
//! - Persist memtable flushes as sorted tables
//! - Point lookups across tables, newest first
//! - Accept externally built tables (ingest) after verifying their order
//! - Hand immutable table lists to iterators
//!
//! See `sstable` for the file format.

mod manager;
mod manifest;
mod sstable;

pub use manager::StorageManager;
pub use manifest::{Manifest, MANIFEST_VERSION};
pub use sstable::{
    Block, BlockEntry, BlockHandle, IndexEntry, SSTable, SSTableBuilder, SSTableIterator,
    SSTableReader,
};

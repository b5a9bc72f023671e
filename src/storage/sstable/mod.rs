//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage.
//! Entries are sorted by the comparator named in the header, not by bytes.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (16 bytes + name)                                │
//! │   Magic: "SRKV" (4) | Version: u16 (2) | Count: u64 (8) │
//! │   NameLen: u16 (2) | Comparator name (NameLen)          │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Blocks (variable)                                  │
//! │   [KeyLen: u32][ValLen: u32][Key][Value]                │
//! │   ... entries until the block reaches block_size ...    │
//! │   (ValLen = u32::MAX means tombstone, no value bytes)   │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Block (variable, one entry per data block)        │
//! │   [SepLen: u32][Offset: u64][Len: u32][Count: u32][Sep] │
//! │   Sep: comparator separator between this block's last  │
//! │   key and the next block's first key (last key for the  │
//! │   final block)                                          │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                       │
//! │   IndexOffset: u64 (8) | DataCRC: u32 (4) | Padding (4) │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod block;
mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

use bytes::Bytes;

pub use block::{Block, BlockEntry};
pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying a SortKV SSTable file
pub(crate) const MAGIC: &[u8; 4] = b"SRKV";

/// Current SSTable format version
pub(crate) const VERSION: u16 = 1;

/// Fixed header size: Magic (4) + Version (2) + EntryCount (8) + NameLen (2)
pub(crate) const HEADER_SIZE: u64 = 16;

/// Offset of the entry count inside the header
pub(crate) const ENTRY_COUNT_OFFSET: u64 = 6;

/// Footer size: IndexOffset (8) + DataCRC (4) + Padding (4) = 16 bytes
pub(crate) const FOOTER_SIZE: u64 = 16;

/// Entry header: KeyLen (4) + ValLen (4)
pub(crate) const ENTRY_HEADER_SIZE: usize = 8;

/// Index entry header: SepLen (4) + Offset (8) + Len (4) + Count (4)
pub(crate) const INDEX_ENTRY_HEADER_SIZE: usize = 20;

/// Sentinel value indicating a tombstone (deleted key)
pub(crate) const TOMBSTONE_MARKER: u32 = u32::MAX;

// =============================================================================
// SSTable Metadata
// =============================================================================

/// Location of one data block inside a table file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHandle {
    pub offset: u64,
    pub len: u32,
    pub count: u32,
}

/// One index entry: every key in the block sorts at or before `separator`,
/// every key in the next block sorts after it.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub separator: Bytes,
    pub handle: BlockHandle,
}

/// SSTable metadata - lightweight description of a finished table.
#[derive(Debug, Clone)]
pub struct SSTable {
    /// Path to the SSTable file
    pub path: PathBuf,
    /// Comparator the table is sorted by
    pub comparator: String,
    /// Number of entries in this SSTable (tombstones included)
    pub entry_count: u64,
    /// Number of data blocks
    pub block_count: usize,
    /// Smallest key in comparator order
    pub min_key: Vec<u8>,
    /// Largest key in comparator order
    pub max_key: Vec<u8>,
    /// File size in bytes
    pub file_size: u64,
}

impl SSTable {
    /// Get the number of entries
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }
}

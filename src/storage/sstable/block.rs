//! SSTable data block
//!
//! A decoded block. Keys and values are zero-copy slices of the block buffer.

use std::cmp::Ordering;

use bytes::Bytes;

use crate::comparator::Comparator;
use crate::error::{Result, SortError};

use super::{ENTRY_HEADER_SIZE, TOMBSTONE_MARKER};

/// One decoded entry; `value` is `None` for a tombstone
#[derive(Debug, Clone, PartialEq)]
pub struct BlockEntry {
    pub key: Bytes,
    pub value: Option<Bytes>,
}

/// Decoded data block
#[derive(Debug, Clone, Default)]
pub struct Block {
    entries: Vec<BlockEntry>,
}

impl Block {
    /// Decode a raw block holding exactly `count` entries
    pub fn decode(data: Bytes, count: u32) -> Result<Self> {
        // `count` comes from the file; no block holds more entries than headers fit.
        let capacity = (count as usize).min(data.len() / ENTRY_HEADER_SIZE);
        let mut entries = Vec::with_capacity(capacity);
        let mut pos = 0usize;

        while pos < data.len() {
            if pos + ENTRY_HEADER_SIZE > data.len() {
                return Err(SortError::Format("truncated entry header".to_string()));
            }
            let key_len = read_u32(&data, pos) as usize;
            let val_len = read_u32(&data, pos + 4);
            pos += ENTRY_HEADER_SIZE;

            if pos + key_len > data.len() {
                return Err(SortError::Format("truncated entry key".to_string()));
            }
            let key = data.slice(pos..pos + key_len);
            pos += key_len;

            let value = if val_len == TOMBSTONE_MARKER {
                None
            } else {
                let val_len = val_len as usize;
                if pos + val_len > data.len() {
                    return Err(SortError::Format("truncated entry value".to_string()));
                }
                let value = data.slice(pos..pos + val_len);
                pos += val_len;
                Some(value)
            };

            entries.push(BlockEntry { key, value });
        }

        if entries.len() != count as usize {
            return Err(SortError::Format(format!(
                "block holds {} entries, index says {}",
                entries.len(),
                count
            )));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> &BlockEntry {
        &self.entries[index]
    }

    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    /// Index of the first key `>= target`
    pub fn lower_bound<C: Comparator + ?Sized>(&self, comparator: &C, target: &[u8]) -> usize {
        self.entries
            .partition_point(|e| comparator.compare(&e.key, target) == Ordering::Less)
    }

    /// Index of the first key `> target`
    pub fn upper_bound<C: Comparator + ?Sized>(&self, comparator: &C, target: &[u8]) -> usize {
        self.entries
            .partition_point(|e| comparator.compare(&e.key, target) != Ordering::Greater)
    }
}

pub(crate) fn read_u32(buf: &[u8], pos: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[pos..pos + 4]);
    u32::from_le_bytes(bytes)
}

pub(crate) fn read_u64(buf: &[u8], pos: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[pos..pos + 8]);
    u64::from_le_bytes(bytes)
}

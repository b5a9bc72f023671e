//! SSTable Reader
//!
//! Opens SSTable files, keeps the block index in memory and reads data
//! blocks on demand.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::comparator::Comparator;
use crate::error::{Result, SortError};

use super::block::{read_u32, read_u64, Block};
use super::iterator::SSTableIterator;
use super::{
    BlockHandle, IndexEntry, SSTable, FOOTER_SIZE, HEADER_SIZE, INDEX_ENTRY_HEADER_SIZE, MAGIC,
    VERSION,
};

/// Reader for SSTable files with in-memory block index
///
/// The file handle sits behind a Mutex so lookups and cursors only need `&self`.
pub struct SSTableReader {
    path: PathBuf,
    /// File handle for reading blocks
    file: Mutex<BufReader<File>>,
    /// Comparator name recorded by the builder
    comparator: String,
    /// One entry per data block, in comparator order
    index: Vec<IndexEntry>,
    /// Metadata
    entry_count: u64,
    min_key: Option<Bytes>,
    file_size: u64,
    /// First byte of the data blocks
    pub(super) data_offset: u64,
    /// Index block starting offset (end of data)
    pub(super) index_offset: u64,
    data_crc: u32,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Loads the block index into memory; data blocks stay on disk.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(SortError::Format(format!(
                "{} is too small to be an SSTable",
                path.display()
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(SortError::Format(format!(
                "Invalid SSTable magic: expected SRKV, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(SortError::Format(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = read_u64(&header, 6);
        let name_len = u16::from_le_bytes([header[14], header[15]]) as usize;

        if HEADER_SIZE + name_len as u64 > file_size - FOOTER_SIZE {
            return Err(SortError::Format(format!(
                "comparator name runs past the end of {}",
                path.display()
            )));
        }
        let mut name = vec![0u8; name_len];
        file.read_exact(&mut name)?;
        let comparator = String::from_utf8(name)
            .map_err(|_| SortError::Format("comparator name is not UTF-8".to_string()))?;
        let data_offset = HEADER_SIZE + name_len as u64;

        // Read footer to get index offset
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = read_u64(&footer, 0);
        let data_crc = read_u32(&footer, 8);

        if index_offset < data_offset || index_offset > file_size - FOOTER_SIZE {
            return Err(SortError::Format(format!(
                "index offset {} outside file {}",
                index_offset,
                path.display()
            )));
        }

        // Index block size = file_size - footer_size - index_offset
        file.seek(SeekFrom::Start(index_offset))?;
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;
        let index = Self::parse_index(Bytes::from(index_data))?;

        let indexed: u64 = index.iter().map(|e| e.handle.count as u64).sum();
        if indexed != entry_count {
            return Err(SortError::Format(format!(
                "index covers {} entries, header says {}",
                indexed, entry_count
            )));
        }

        let reader = Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            comparator,
            index,
            entry_count,
            min_key: None,
            file_size,
            data_offset,
            index_offset,
            data_crc,
        };

        for (i, entry) in reader.index.iter().enumerate() {
            reader.check_handle(i, &entry.handle)?;
        }

        // The smallest key is the first entry of the first block.
        let min_key = match reader.index.first() {
            Some(_) => Some(reader.read_block(0)?.entry(0).key.clone()),
            None => None,
        };

        Ok(Self { min_key, ..reader })
    }

    /// Parse index entries: [sep_len(4)][offset(8)][len(4)][count(4)][sep]
    fn parse_index(data: Bytes) -> Result<Vec<IndexEntry>> {
        let mut index = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            if pos + INDEX_ENTRY_HEADER_SIZE > data.len() {
                return Err(SortError::Format("truncated index entry".to_string()));
            }
            let sep_len = read_u32(&data, pos) as usize;
            let offset = read_u64(&data, pos + 4);
            let len = read_u32(&data, pos + 12);
            let count = read_u32(&data, pos + 16);
            pos += INDEX_ENTRY_HEADER_SIZE;

            if pos + sep_len > data.len() {
                return Err(SortError::Format("truncated index separator".to_string()));
            }
            let separator = data.slice(pos..pos + sep_len);
            pos += sep_len;

            if count == 0 {
                return Err(SortError::Format("empty data block in index".to_string()));
            }
            index.push(IndexEntry {
                separator,
                handle: BlockHandle { offset, len, count },
            });
        }
        Ok(index)
    }

    /// Read and decode data block `index`
    pub fn read_block(&self, index: usize) -> Result<Arc<Block>> {
        let handle = self
            .index
            .get(index)
            .map(|e| e.handle)
            .ok_or_else(|| SortError::Storage(format!("block {} out of range", index)))?;

        self.check_handle(index, &handle)?;

        let mut data = vec![0u8; handle.len as usize];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(handle.offset))?;
            file.read_exact(&mut data)?;
        }
        Ok(Arc::new(Block::decode(Bytes::from(data), handle.count)?))
    }

    /// Reject handles pointing outside the data section. Offsets come from
    /// the file and are untrusted.
    fn check_handle(&self, index: usize, handle: &BlockHandle) -> Result<()> {
        let inside = handle
            .offset
            .checked_add(handle.len as u64)
            .is_some_and(|end| handle.offset >= self.data_offset && end <= self.index_offset);
        if !inside {
            return Err(SortError::Format(format!(
                "block {} of {} lies outside the data section",
                index,
                self.path.display()
            )));
        }
        Ok(())
    }

    /// Number of data blocks
    pub fn block_count(&self) -> usize {
        self.index.len()
    }

    /// Index of the first block that may hold a key `>= target`
    pub fn lower_bound_block<C: Comparator + ?Sized>(&self, comparator: &C, target: &[u8]) -> usize {
        self.index
            .partition_point(|e| comparator.compare(&e.separator, target) == Ordering::Less)
    }

    /// Index of the first block that may hold a key `> target`
    pub fn upper_bound_block<C: Comparator + ?Sized>(&self, comparator: &C, target: &[u8]) -> usize {
        self.index
            .partition_point(|e| comparator.compare(&e.separator, target) != Ordering::Greater)
    }

    /// Get a value by key
    ///
    /// Returns:
    /// - `Ok(Some(value))` - key found with value
    /// - `Ok(None)` - key found but is a tombstone (deleted)
    /// - `Err(KeyNotFound)` - key not in this SSTable
    pub fn get<C: Comparator + ?Sized>(&self, comparator: &C, key: &[u8]) -> Result<Option<Bytes>> {
        let block_idx = self.lower_bound_block(comparator, key);
        if block_idx == self.index.len() {
            return Err(SortError::KeyNotFound);
        }

        let block = self.read_block(block_idx)?;
        let i = block.lower_bound(comparator, key);
        if i < block.len() && comparator.equal(&block.entry(i).key, key) {
            return Ok(block.entry(i).value.clone());
        }
        Err(SortError::KeyNotFound)
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain<C: Comparator + ?Sized>(&self, comparator: &C, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => {
                comparator.compare(key, min) != Ordering::Less
                    && comparator.compare(key, max) != Ordering::Greater
            }
            _ => false, // Empty SSTable
        }
    }

    /// Full check used before accepting an external file: comparator name,
    /// data checksum, entry order and index separators.
    pub fn verify<C: Comparator + ?Sized>(&self, comparator: &C) -> Result<()> {
        if self.comparator != comparator.name() {
            return Err(SortError::Format(format!(
                "{} was built with comparator {:?}, engine uses {:?}",
                self.path.display(),
                self.comparator,
                comparator.name()
            )));
        }

        let mut hasher = crc32fast::Hasher::new();
        for entry in &self.index {
            let mut data = vec![0u8; entry.handle.len as usize];
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(entry.handle.offset))?;
            file.read_exact(&mut data)?;
            hasher.update(&data);
        }
        if hasher.finalize() != self.data_crc {
            return Err(SortError::Format(format!(
                "{} failed its data checksum",
                self.path.display()
            )));
        }

        let mut previous: Option<Bytes> = None;
        for (block_idx, entry) in self.index.iter().enumerate() {
            let block = self.read_block(block_idx)?;
            for item in block.entries() {
                if let Some(prev) = &previous {
                    if comparator.compare(prev, &item.key) != Ordering::Less {
                        return Err(SortError::Format(format!(
                            "{} is not sorted by {}: {} precedes {}",
                            self.path.display(),
                            comparator.name(),
                            comparator.format_key(prev),
                            comparator.format_key(&item.key)
                        )));
                    }
                }
                previous = Some(item.key.clone());
            }
            let last = &block.entry(block.len() - 1).key;
            if comparator.compare(last, &entry.separator) == Ordering::Greater {
                return Err(SortError::Format(format!(
                    "block {} of {} ends after its index separator",
                    block_idx,
                    self.path.display()
                )));
            }
            if let Some(next) = self.index.get(block_idx + 1) {
                let first = self.read_block(block_idx + 1)?.entry(0).key.clone();
                if comparator.compare(&entry.separator, &first) != Ordering::Less {
                    return Err(SortError::Format(format!(
                        "separator of block {} in {} does not precede block {} (offset {})",
                        block_idx,
                        self.path.display(),
                        block_idx + 1,
                        next.handle.offset
                    )));
                }
            }
        }
        Ok(())
    }

    /// Create an iterator over all entries (for verification, debugging)
    pub fn iter(&self) -> SSTableIterator<'_> {
        SSTableIterator::new(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Comparator name recorded in the header
    pub fn comparator_name(&self) -> &str {
        &self.comparator
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Get the minimum key in this SSTable
    pub fn min_key(&self) -> Option<&[u8]> {
        self.min_key.as_deref()
    }

    /// Get the maximum key in this SSTable (the final index entry is the last key)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.last().map(|e| e.separator.as_ref())
    }

    /// Metadata snapshot
    pub fn info(&self) -> SSTable {
        SSTable {
            path: self.path.clone(),
            comparator: self.comparator.clone(),
            entry_count: self.entry_count,
            block_count: self.index.len(),
            min_key: self.min_key().map(<[u8]>::to_vec).unwrap_or_default(),
            max_key: self.max_key().map(<[u8]>::to_vec).unwrap_or_default(),
            file_size: self.file_size,
        }
    }
}

//! SSTable Builder
//!
//! Writes comparator-sorted key-value entries to a new SSTable file.
//! Also the way external producers build files for `Engine::ingest`.

use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::comparator::Comparator;
use crate::error::{Result, SortError};

use super::{
    BlockHandle, IndexEntry, SSTable, ENTRY_COUNT_OFFSET, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER,
    VERSION,
};

/// Block written to disk whose separator waits for the next block's first key
struct PendingBlock {
    last_key: Vec<u8>,
    handle: BlockHandle,
}

/// Builder for creating new SSTables from sorted entries
pub struct SSTableBuilder<'c, C: Comparator + ?Sized> {
    /// Order the entries must arrive in
    comparator: &'c C,
    /// Output file path
    path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// Target block size in bytes
    block_size: usize,
    /// Entries of the block being filled
    block: Vec<u8>,
    block_count: u32,
    /// Number of entries written
    entry_count: u64,
    /// Current write position (start of the next block)
    current_offset: u64,
    /// Finished index entries, one per block
    index: Vec<IndexEntry>,
    pending: Option<PendingBlock>,
    /// Track min/max keys for metadata
    min_key: Option<Vec<u8>>,
    last_key: Option<Vec<u8>>,
    /// Running CRC hasher for data blocks
    data_hasher: crc32fast::Hasher,
}

impl<'c, C: Comparator + ?Sized> SSTableBuilder<'c, C> {
    /// Create a new SSTable builder
    ///
    /// Writes header immediately; call `add()`/`add_tombstone()` in comparator
    /// order, then `finish()` to write index and footer.
    pub fn new(path: &Path, comparator: &'c C, block_size: usize) -> Result<Self> {
        let name = comparator.name().as_bytes();
        let name_len = u16::try_from(name.len())
            .map_err(|_| SortError::Config("comparator name too long".to_string()))?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);

        // Write header (entry_count placeholder, will be updated in finish)
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;
        writer.write_all(&name_len.to_le_bytes())?;
        writer.write_all(name)?;

        Ok(Self {
            comparator,
            path: path.to_path_buf(),
            writer,
            block_size: block_size.max(1),
            block: Vec::with_capacity(block_size),
            block_count: 0,
            entry_count: 0,
            current_offset: HEADER_SIZE + name.len() as u64,
            index: Vec::new(),
            pending: None,
            min_key: None,
            last_key: None,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Add a key-value pair (must be called in comparator order)
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_entry(key, Some(value))
    }

    /// Add a tombstone (must be called in comparator order)
    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.write_entry(key, None)
    }

    /// Internal: append an entry to the current block (value=None means tombstone)
    fn write_entry(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if let Some(last) = &self.last_key {
            if self.comparator.compare(last, key) != Ordering::Less {
                return Err(SortError::Format(format!(
                    "key {} added after {} under {}",
                    self.comparator.format_key(key),
                    self.comparator.format_key(last),
                    self.comparator.name()
                )));
            }
        }

        // The previous block's boundary can be shortened now that we know
        // the key that follows it.
        if let Some(pending) = self.pending.take() {
            let separator = self.comparator.separator(&pending.last_key, key);
            self.index.push(IndexEntry {
                separator: Bytes::from(separator),
                handle: pending.handle,
            });
        }

        let val_len = match value {
            Some(v) => v.len() as u32,
            None => TOMBSTONE_MARKER,
        };
        self.block.extend_from_slice(&(key.len() as u32).to_le_bytes());
        self.block.extend_from_slice(&val_len.to_le_bytes());
        self.block.extend_from_slice(key);
        if let Some(v) = value {
            self.block.extend_from_slice(v);
        }
        self.block_count += 1;
        self.entry_count += 1;

        if self.min_key.is_none() {
            self.min_key = Some(key.to_vec());
        }
        self.last_key = Some(key.to_vec());

        if self.block.len() >= self.block_size {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Write the current block to the file
    fn flush_block(&mut self) -> Result<()> {
        if self.block_count == 0 {
            return Ok(());
        }

        self.writer.write_all(&self.block)?;
        self.data_hasher.update(&self.block);

        let handle = BlockHandle {
            offset: self.current_offset,
            len: self.block.len() as u32,
            count: self.block_count,
        };
        self.pending = Some(PendingBlock {
            last_key: self.last_key.clone().unwrap_or_default(),
            handle,
        });

        self.current_offset += self.block.len() as u64;
        self.block.clear();
        self.block_count = 0;
        Ok(())
    }

    /// Finish building: write index block, footer, and return metadata
    pub fn finish(mut self) -> Result<SSTable> {
        self.flush_block()?;
        // Nothing follows the last block, so its bound is its own last key.
        if let Some(pending) = self.pending.take() {
            self.index.push(IndexEntry {
                separator: Bytes::from(pending.last_key),
                handle: pending.handle,
            });
        }

        // Record where index block starts
        let index_offset = self.current_offset;

        for entry in &self.index {
            self.writer
                .write_all(&(entry.separator.len() as u32).to_le_bytes())?;
            self.writer.write_all(&entry.handle.offset.to_le_bytes())?;
            self.writer.write_all(&entry.handle.len.to_le_bytes())?;
            self.writer.write_all(&entry.handle.count.to_le_bytes())?;
            self.writer.write_all(&entry.separator)?;
        }

        // Finalize CRC
        let data_crc = self.data_hasher.finalize();

        // Write footer: index_offset (8) + data_crc (4) + padding (4)
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;

        self.writer.flush()?;

        // Seek back and update entry count in header
        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| SortError::Storage(format!("Failed to flush SSTable: {}", e)))?;
        file.seek(SeekFrom::Start(ENTRY_COUNT_OFFSET))?;
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();

        tracing::debug!(
            path = %self.path.display(),
            entries = self.entry_count,
            blocks = self.index.len(),
            "sstable written"
        );

        Ok(SSTable {
            path: self.path,
            comparator: self.comparator.name().to_string(),
            entry_count: self.entry_count,
            block_count: self.index.len(),
            min_key: self.min_key.unwrap_or_default(),
            max_key: self.last_key.unwrap_or_default(),
            file_size,
        })
    }
}

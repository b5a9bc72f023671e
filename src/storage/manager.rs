//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Create new SSTables from MemTable flushes
//! - Adopt verified external SSTables (ingest)
//! - Track SSTable lifecycle

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::comparator::Comparator;
use crate::error::{Result, SortError};
use crate::memtable::{MemSnapshot, MemTableEntry};

use super::{SSTable, SSTableBuilder, SSTableReader};

/// Extension of an ingest copy that has not been renamed into place
const STAGING_EXTENSION: &str = "sst.tmp";

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - Readers are shared behind `Arc`, so iterators keep the tables they
///   started with even after the list changes
/// - `next_sstable_id`: Atomic counter (lock-free)
/// - All methods use `&self` (no exclusive access needed)
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<Arc<SSTableReader>>>,

    /// Next ID for creating new SSTables (atomic, lock-free)
    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Discover existing SSTable files, deleting staged ingest copies
    /// 3. Open readers for each (loads block indexes into RAM)
    /// 4. Reject tables sorted by another comparator
    /// 5. Order by ID descending (newest first)
    pub fn open(path: &Path, comparator: &str) -> Result<Self> {
        fs::create_dir_all(path)?;

        // Discover existing SSTables
        let mut sstable_ids: Vec<u64> = Vec::new();

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();

            if !file_path.is_file() {
                continue;
            }
            if Self::is_staging_file(&file_path) {
                // Left behind by an ingest that died before its rename
                tracing::warn!(path = %file_path.display(), "removing partial ingest");
                fs::remove_file(&file_path)?;
            } else if let Some(id) = Self::parse_sstable_id(&file_path) {
                sstable_ids.push(id);
            }
        }

        // Sort newest first (highest ID first)
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            let sstable_path = Self::sstable_path_with_dir(path, *id);
            let reader = SSTableReader::open(&sstable_path)?;
            if reader.comparator_name() != comparator {
                return Err(SortError::Format(format!(
                    "{} is sorted by {:?}, expected {:?}",
                    sstable_path.display(),
                    reader.comparator_name(),
                    comparator
                )));
            }
            sstables.push(Arc::new(reader));
        }

        // Next ID = max + 1, or 1 if no SSTables exist
        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        tracing::debug!(tables = sstables.len(), next_id, "storage opened");

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    ///
    /// Returns:
    /// - `Ok(Some(value))` - key found with value
    /// - `Ok(None)` - key not found, or found tombstone (deleted)
    pub fn get<C: Comparator + ?Sized>(&self, comparator: &C, key: &[u8]) -> Result<Option<Bytes>> {
        let sstables = self.snapshot();

        for reader in &sstables {
            // Skip SSTable if key is outside its range
            if !reader.might_contain(comparator, key) {
                continue;
            }

            match reader.get(comparator, key) {
                Ok(Some(value)) => return Ok(Some(value)), // Found!
                Ok(None) => return Ok(None),               // Tombstone = deleted
                Err(SortError::KeyNotFound) => continue,   // Not in this SSTable
                Err(e) => return Err(e),                   // Real error
            }
        }

        Ok(None)
    }

    /// Flush a MemTable snapshot to a new SSTable
    ///
    /// Creates a new SSTable file from the snapshot's sorted entries,
    /// opens a reader for it, and adds it to the front of the list.
    pub fn flush<C: Comparator>(
        &self,
        memtable: &MemSnapshot<C>,
        comparator: &C,
        block_size: usize,
    ) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(SortError::Storage("Cannot flush empty MemTable".to_string()));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        // Snapshot is already in comparator order
        let mut builder = SSTableBuilder::new(&path, comparator, block_size)?;
        for (key, entry) in memtable.iter() {
            match entry {
                MemTableEntry::Value(v) => builder.add(key, v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(key)?,
            }
        }
        let metadata = builder.finish()?;

        let reader = SSTableReader::open(&path)?;
        self.sstables.write().insert(0, Arc::new(reader));

        tracing::info!(id, entries = metadata.entry_count, "memtable flushed");
        Ok(metadata)
    }

    /// Adopt an externally built SSTable as the newest table
    ///
    /// The file must already be sorted by `comparator`; it is verified,
    /// copied into the storage directory and never re-sorted.
    pub fn ingest<C: Comparator + ?Sized>(&self, source: &Path, comparator: &C) -> Result<SSTable> {
        SSTableReader::open(source)?.verify(comparator)?;

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);
        let staging = path.with_extension(STAGING_EXTENSION);

        if let Err(e) = fs::copy(source, &staging).and_then(|_| fs::rename(&staging, &path)) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }

        let reader = SSTableReader::open(&path)?;
        let metadata = reader.info();
        self.sstables.write().insert(0, Arc::new(reader));

        tracing::info!(
            id,
            source = %source.display(),
            entries = metadata.entry_count,
            "sstable ingested"
        );
        Ok(metadata)
    }

    /// Current tables, newest first. The list is a copy; later flushes
    /// and ingests do not change it.
    pub fn snapshot(&self) -> Vec<Arc<SSTableReader>> {
        self.sstables.read().clone()
    }

    /// Metadata for every table, newest first
    pub fn tables(&self) -> Vec<SSTable> {
        self.sstables.read().iter().map(|r| r.info()).collect()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Generate the file path for an SSTable with given ID
    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    /// Generate SSTable path given a directory and ID
    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// Parse SSTable ID from filename
    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()?.to_str()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }

    /// "sstable_000042.sst.tmp" → true
    fn is_staging_file(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(STAGING_EXTENSION))
            .is_some_and(|stem| stem.starts_with("sstable_"))
    }
}

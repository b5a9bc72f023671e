//! Engine Module
//!
//! The storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Pin the database to one comparator (manifest check on open)
//! - Coordinate MemTable and Storage
//! - Handle concurrent read/write access
//! - Trigger flushes when MemTable is full
//! - Ingest externally built tables
//! - Hand out snapshot iterators

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::comparator::{BytewiseComparator, Comparator};
use crate::config::Config;
use crate::error::{Result, SortError};
use crate::iterator::{DbIterator, IterOptions, SnapshotGuard};
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::{Manifest, SSTable, StorageManager};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/flush/ingest): Serialized by `write_lock`
///   - Only ONE write operation at a time
///   - Must acquire: write_lock → memtable → storage (write)
///
/// - **Reads** (get, iterators): Never take `write_lock`
///   - MemTable hands out `Arc` snapshots under a short read lock
///   - Table readers guard their file handle internally
///
/// ## Comparator
/// Fixed at open time and recorded in `MANIFEST`. Every key written,
/// flushed, ingested or iterated through this handle uses it.
pub struct Engine<C: Comparator = BytewiseComparator> {
    /// Engine configuration
    config: Config,

    /// Key order for everything below
    comparator: Arc<C>,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable<C>,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes write operations (put/delete/flush/ingest)
    write_lock: Mutex<()>,

    /// Iterators not yet released
    open_iterators: Arc<AtomicUsize>,
}

impl Engine<BytewiseComparator> {
    /// Open with a path (convenience method)
    ///
    /// Uses default config, the specified data directory and byte order
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config, BytewiseComparator)
    }
}

impl<C: Comparator> Engine<C> {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const MANIFEST_FILENAME: &'static str = "MANIFEST";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config and key order
    ///
    /// On startup:
    /// 1. Validate config
    /// 2. Read the manifest; a different comparator name aborts the open
    /// 3. Create the database if it is missing (and allowed)
    /// 4. Load existing SSTables
    pub fn open(config: Config, comparator: C) -> Result<Self> {
        config.validate()?;

        let manifest_path = config.data_dir.join(Self::MANIFEST_FILENAME);
        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);

        match Manifest::load(&manifest_path)? {
            Some(manifest) => {
                if let Err(e) = manifest.check_comparator(comparator.name()) {
                    tracing::warn!(
                        data_dir = %config.data_dir.display(),
                        recorded = %manifest.comparator,
                        supplied = comparator.name(),
                        "refusing to open database with a different comparator"
                    );
                    return Err(e);
                }
            }
            None => {
                if !config.create_if_missing {
                    return Err(SortError::Config(format!(
                        "no database at {} and create_if_missing is off",
                        config.data_dir.display()
                    )));
                }
                fs::create_dir_all(&config.data_dir)?;
                Manifest::new(comparator.name()).store(&manifest_path)?;
                tracing::info!(
                    data_dir = %config.data_dir.display(),
                    comparator = comparator.name(),
                    "created database"
                );
            }
        }

        let storage = StorageManager::open(&storage_dir, comparator.name())?;
        let comparator = Arc::new(comparator);
        let memtable = MemTable::new(Arc::clone(&comparator));

        tracing::info!(
            data_dir = %config.data_dir.display(),
            comparator = comparator.name(),
            tables = storage.sstable_count(),
            "engine opened"
        );

        Ok(Self {
            config,
            comparator,
            storage_dir,
            memtable,
            storage,
            write_lock: Mutex::new(()),
            open_iterators: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        if let Some(entry) = self.memtable.get(key) {
            return match entry {
                MemTableEntry::Value(value) => Ok(Some(value)),
                MemTableEntry::Tombstone => Ok(None), // Key was deleted
            };
        }

        self.storage.get(&*self.comparator, key)
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Write to MemTable
    /// 3. Check if flush needed
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        let new_size = self
            .memtable
            .put(Bytes::copy_from_slice(key), Bytes::copy_from_slice(value));

        if new_size >= self.config.memtable_size_limit {
            self.flush_internal()?;
        }

        Ok(())
    }

    /// Delete a key
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Write tombstone to MemTable
    /// 3. Check if flush needed
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        let new_size = self.memtable.delete(Bytes::copy_from_slice(key));

        if new_size >= self.config.memtable_size_limit {
            self.flush_internal()?;
        }

        Ok(())
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Internal flush implementation (called with write lock held)
    ///
    /// The table is published before the memtable is cleared, so a reader
    /// that snapshots the memtable first and the tables second never misses
    /// an entry.
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        let snapshot = self.memtable.snapshot();
        self.storage
            .flush(&snapshot, &*self.comparator, self.config.block_size)?;
        self.memtable.clear();

        Ok(())
    }

    /// Ingest externally built SSTables
    ///
    /// Every file must already be sorted by this engine's comparator; it is
    /// verified, never re-sorted. Pending writes are flushed first so the
    /// ingested data is newer than everything already written.
    pub fn ingest<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<SSTable>> {
        let _write_guard = self.write_lock.lock();

        self.flush_internal()?;

        let mut ingested = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            match self.storage.ingest(path, &*self.comparator) {
                Ok(table) => ingested.push(table),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ingest rejected");
                    return Err(e);
                }
            }
        }
        Ok(ingested)
    }

    /// Create an iterator over a snapshot of the current data
    pub fn new_iter(&self, options: IterOptions) -> DbIterator<C> {
        // Memtable first, tables second: see `flush_internal`.
        let memtable = self.memtable.snapshot();
        let tables = self.storage.snapshot();
        let guard = SnapshotGuard::acquire(&self.open_iterators);

        DbIterator::new(
            Arc::clone(&self.comparator),
            memtable,
            tables,
            options,
            guard,
        )
    }

    /// Create an iterator restricted to keys starting with `prefix`
    pub fn prefix_iter(&self, prefix: &[u8]) -> DbIterator<C> {
        let (lower, upper) = self.comparator.prefix_range(prefix);
        self.new_iter(IterOptions::range(lower, upper))
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data to a table
    pub fn close(self) -> Result<()> {
        self.flush()?;
        tracing::info!(data_dir = %self.config.data_dir.display(), "engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// The comparator this engine orders keys by
    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Metadata for every table, newest first
    pub fn tables(&self) -> Vec<SSTable> {
        self.storage.tables()
    }

    /// Number of iterators that still hold a snapshot
    pub fn open_iterators(&self) -> usize {
        self.open_iterators.load(Ordering::SeqCst)
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl<C: Comparator> Drop for Engine<C> {
    fn drop(&mut self) {
        if self.memtable.is_empty() {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::error!(error = %e, "flush on drop failed; unflushed writes are lost");
        }
    }
}

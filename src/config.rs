//! Configuration for SortKV
//!
//! Centralized configuration with sensible defaults.
//!
//! The key order is deliberately not part of `Config`: it is passed to
//! [`Engine::open`](crate::Engine::open) and pinned by the manifest.

use std::path::PathBuf;

use crate::error::{Result, SortError};

/// Main configuration for a SortKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── MANIFEST         (comparator name + format version)
    ///     └── sstables/        (table files)
    pub data_dir: PathBuf,

    /// Create the database if `data_dir` holds no manifest yet
    pub create_if_missing: bool,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // Table Configuration
    // -------------------------------------------------------------------------
    /// Target size of a table data block (in bytes). One index entry is
    /// written per block.
    pub block_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./sortkv_data"),
            create_if_missing: true,
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
            block_size: 4 * 1024,                  // 4 KB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(SortError::Config("block_size must be non-zero".to_string()));
        }
        if self.memtable_size_limit == 0 {
            return Err(SortError::Config(
                "memtable_size_limit must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Whether to create a fresh database when none exists
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.config.create_if_missing = create;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the target data block size (in bytes)
    pub fn block_size(mut self, size: usize) -> Self {
        self.config.block_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

//! Manifest
//!
//! Records which comparator a database was created with. Written once at
//! creation and checked on every open.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SortError};

/// Current manifest format version
pub const MANIFEST_VERSION: u16 = 1;

/// Persisted database metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u16,
    pub comparator: String,
}

impl Manifest {
    pub fn new(comparator: impl Into<String>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            comparator: comparator.into(),
        }
    }

    /// Read a manifest, `None` if the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        let manifest: Manifest = bincode::deserialize(&bytes)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(SortError::Config(format!(
                "unsupported manifest version {}",
                manifest.version
            )));
        }
        Ok(Some(manifest))
    }

    /// Write the manifest and sync it
    pub fn store(&self, path: &Path) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(())
    }

    /// Fail unless the manifest was written for `comparator`
    pub fn check_comparator(&self, comparator: &str) -> Result<()> {
        if self.comparator != comparator {
            return Err(SortError::ComparatorMismatch {
                recorded: self.comparator.clone(),
                supplied: comparator.to_string(),
            });
        }
        Ok(())
    }
}

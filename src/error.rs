//! Error types for SortKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using SortError
pub type Result<T> = std::result::Result<T, SortError>;

/// Unified error type for SortKV operations
#[derive(Debug, Error)]
pub enum SortError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    /// The database was created with a different comparator than the one supplied.
    /// Opening must abort; falling back to another order would corrupt reads.
    #[error("comparator mismatch: database was created with {recorded:?}, opened with {supplied:?}")]
    ComparatorMismatch { recorded: String, supplied: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    /// An external or on-disk table is malformed or ordered inconsistently
    /// with the installed comparator.
    #[error("Format error: {0}")]
    Format(String),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Usage Errors
    // -------------------------------------------------------------------------
    /// A caller used an API in a state where it has no meaning,
    /// e.g. reading the key of an iterator that is not positioned.
    #[error("contract violation: {0}")]
    ContractViolation(&'static str),
}

impl From<bincode::Error> for SortError {
    fn from(e: bincode::Error) -> Self {
        SortError::Serialization(e.to_string())
    }
}

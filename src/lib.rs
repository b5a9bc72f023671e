//! # SortKV
//!
//! An embedded sorted key-value store whose key order is pluggable:
//! - `Comparator` trait defining the order plus the key-shrinking helpers
//!   that table indexes and prefix scans rely on
//! - Bounded, bidirectional snapshot iterators that follow that order
//! - Comparator name pinned in a manifest; reopening with another order fails
//! - Ingest of externally built, pre-sorted tables
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Engine<C: Comparator>                     │
//! │            (Single Writer / Multi Reader, MANIFEST)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  MemTable   │          │   Storage   │
//!   │ (Arc snap)  │  flush   │  (SSTables) │ ◄── ingest
//!   └──────┬──────┘ ───────► └──────┬──────┘
//!          │                        │
//!          └───────────┬────────────┘
//!                      ▼
//!              ┌──────────────┐
//!              │  DbIterator  │
//!              │ (merge, seek │
//!              │   bounds)    │
//!              └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod comparator;
pub mod memtable;
pub mod storage;
pub mod iterator;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use comparator::{BytewiseComparator, Comparator, ReverseDateComparator};
pub use config::Config;
pub use engine::Engine;
pub use error::{Result, SortError};
pub use iterator::{DbIterator, IterOptions, IterState};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SortKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Iterator Module
//!
//! Bounded, bidirectional traversal over a snapshot of the engine, in the
//! order defined by the engine's comparator.
//!
//! ## States
//! ```text
//!                seek_* finds a key
//!  Unpositioned ─────────────────────► Positioned ◄─┐ next / prev
//!       │                                 │   └─────┘
//!       │ seek_* finds nothing            │ runs off the bounds
//!       ▼                                 ▼
//!   Exhausted ◄───────────────────────────┘
//! ```
//! Changing bounds always drops back to `Unpositioned` (or straight to
//! `Exhausted` when the new range is empty).
//!
//! ## Merging
//! Each source run (memtable snapshot, tables newest → oldest) gets its own
//! cursor. A move re-seeks every cursor and takes the smallest key (largest
//! when moving backwards); on equal keys the newest run wins. Tombstones
//! are skipped, never surfaced.

mod run;

use std::cmp::Ordering;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use bytes::Bytes;

use crate::comparator::Comparator;
use crate::error::{Result, SortError};
use crate::memtable::MemSnapshot;
use crate::storage::SSTableReader;

use run::{RunCursor, Seek};

/// Observable iterator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterState {
    /// Freshly created or bounds changed; no position yet
    Unpositioned,
    /// At a live key
    Positioned,
    /// Ran out of keys within the bounds
    Exhausted,
}

/// Bounds for a new iterator. Defaults to the whole key space.
#[derive(Debug, Clone)]
pub struct IterOptions {
    pub lower: Bound<Vec<u8>>,
    pub upper: Bound<Vec<u8>>,
}

impl Default for IterOptions {
    fn default() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }
}

impl IterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive lower bound
    pub fn lower_bound(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.lower = Bound::Included(key.into());
        self
    }

    /// Exclusive upper bound
    pub fn upper_bound(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.upper = Bound::Excluded(key.into());
        self
    }

    /// Arbitrary bounds
    pub fn range(lower: Bound<Vec<u8>>, upper: Bound<Vec<u8>>) -> Self {
        Self { lower, upper }
    }
}

/// Counts a live iterator against the engine until dropped
pub(crate) struct SnapshotGuard {
    open: Arc<AtomicUsize>,
}

impl SnapshotGuard {
    pub fn acquire(open: &Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, AtomicOrdering::SeqCst);
        Self {
            open: Arc::clone(open),
        }
    }
}

impl Drop for SnapshotGuard {
    fn drop(&mut self) {
        let remaining = self.open.fetch_sub(1, AtomicOrdering::SeqCst) - 1;
        tracing::trace!(remaining, "iterator released");
    }
}

enum Cursor {
    Unpositioned,
    Positioned { key: Bytes, value: Bytes },
    Exhausted,
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// Cursor over a point-in-time view of the engine
///
/// Owned by one thread at a time. Dropping it (or calling [`close`](Self::close))
/// releases the snapshot it holds.
pub struct DbIterator<C: Comparator> {
    comparator: Arc<C>,
    /// Newest first
    sources: Vec<RunCursor<C>>,
    lower: Bound<Bytes>,
    upper: Bound<Bytes>,
    cursor: Cursor,
    _guard: SnapshotGuard,
}

impl<C: Comparator> DbIterator<C> {
    pub(crate) fn new(
        comparator: Arc<C>,
        memtable: MemSnapshot<C>,
        tables: Vec<Arc<SSTableReader>>,
        options: IterOptions,
        guard: SnapshotGuard,
    ) -> Self {
        let mut sources = Vec::with_capacity(tables.len() + 1);
        sources.push(RunCursor::memtable(memtable));
        sources.extend(tables.into_iter().map(RunCursor::table));

        let mut iter = Self {
            comparator,
            sources,
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
            cursor: Cursor::Unpositioned,
            _guard: guard,
        };
        iter.set_range(options.lower, options.upper);
        iter
    }

    // =========================================================================
    // Bounds
    // =========================================================================

    /// Restrict to `lower <= k < upper`; `None` leaves that side open.
    /// Drops the current position.
    pub fn set_bounds(&mut self, lower: Option<&[u8]>, upper: Option<&[u8]>) {
        let lower = lower.map_or(Bound::Unbounded, |k| Bound::Included(k.to_vec()));
        let upper = upper.map_or(Bound::Unbounded, |k| Bound::Excluded(k.to_vec()));
        self.set_range(lower, upper);
    }

    /// Restrict to arbitrary bounds. Drops the current position.
    pub fn set_range(&mut self, lower: Bound<Vec<u8>>, upper: Bound<Vec<u8>>) {
        self.lower = lower.map(Bytes::from);
        self.upper = upper.map(Bytes::from);
        self.cursor = if self.range_is_empty() {
            Cursor::Exhausted
        } else {
            Cursor::Unpositioned
        };
    }

    /// Restrict to keys starting with `prefix`, as the comparator defines it.
    pub fn set_prefix(&mut self, prefix: &[u8]) {
        let (lower, upper) = self.comparator.prefix_range(prefix);
        self.set_range(lower, upper);
    }

    /// Current bounds
    pub fn bounds(&self) -> (Bound<&[u8]>, Bound<&[u8]>) {
        (
            self.lower.as_ref().map(|k| k.as_ref()),
            self.upper.as_ref().map(|k| k.as_ref()),
        )
    }

    // =========================================================================
    // Positioning
    // =========================================================================

    /// Smallest key within bounds
    pub fn seek_first(&mut self) -> Result<bool> {
        self.position(Seek::First, Direction::Forward)
    }

    /// Largest key within bounds
    pub fn seek_last(&mut self) -> Result<bool> {
        self.position(Seek::Last, Direction::Backward)
    }

    /// Smallest key within bounds that is `>= target`
    pub fn seek_ge(&mut self, target: &[u8]) -> Result<bool> {
        self.position(Seek::Ge(Bytes::copy_from_slice(target)), Direction::Forward)
    }

    /// Largest key within bounds that is `< target`
    pub fn seek_lt(&mut self, target: &[u8]) -> Result<bool> {
        self.position(Seek::Lt(Bytes::copy_from_slice(target)), Direction::Backward)
    }

    /// Restrict to the prefix `split(key)` of `key`, then seek to `key`
    pub fn seek_prefix_ge(&mut self, key: &[u8]) -> Result<bool> {
        let prefix_len = self.comparator.split(key).min(key.len());
        self.set_prefix(&key[..prefix_len]);
        self.seek_ge(key)
    }

    /// Advance to the next key. A no-op returning `false` unless positioned.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<bool> {
        match &self.cursor {
            Cursor::Positioned { key, .. } => {
                let seek = Seek::Gt(key.clone());
                self.position(seek, Direction::Forward)
            }
            _ => Ok(false),
        }
    }

    /// Step back to the previous key. A no-op returning `false` unless positioned.
    pub fn prev(&mut self) -> Result<bool> {
        match &self.cursor {
            Cursor::Positioned { key, .. } => {
                let seek = Seek::Lt(key.clone());
                self.position(seek, Direction::Backward)
            }
            _ => Ok(false),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> IterState {
        match self.cursor {
            Cursor::Unpositioned => IterState::Unpositioned,
            Cursor::Positioned { .. } => IterState::Positioned,
            Cursor::Exhausted => IterState::Exhausted,
        }
    }

    pub fn valid(&self) -> bool {
        matches!(self.cursor, Cursor::Positioned { .. })
    }

    /// Current key. Fails with `ContractViolation` unless positioned.
    pub fn key(&self) -> Result<&[u8]> {
        self.current()
            .map(|(k, _)| k)
            .ok_or(SortError::ContractViolation("key() called on an unpositioned iterator"))
    }

    /// Current value. Fails with `ContractViolation` unless positioned.
    pub fn value(&self) -> Result<&[u8]> {
        self.current()
            .map(|(_, v)| v)
            .ok_or(SortError::ContractViolation("value() called on an unpositioned iterator"))
    }

    /// Current entry, `None` unless positioned
    pub fn current(&self) -> Option<(&[u8], &[u8])> {
        match &self.cursor {
            Cursor::Positioned { key, value } => Some((key.as_ref(), value.as_ref())),
            _ => None,
        }
    }

    /// Walk every entry within bounds from the first key
    pub fn entries(&mut self) -> Entries<'_, C> {
        Entries {
            iter: self,
            started: false,
            done: false,
        }
    }

    /// Release the snapshot now instead of at end of scope
    pub fn close(self) {}

    // =========================================================================
    // Internals
    // =========================================================================

    fn position(&mut self, seek: Seek, direction: Direction) -> Result<bool> {
        let result = self.position_inner(seek, direction);
        if result.is_err() {
            self.cursor = Cursor::Exhausted;
        }
        result
    }

    fn position_inner(&mut self, seek: Seek, direction: Direction) -> Result<bool> {
        if self.range_is_empty() {
            self.cursor = Cursor::Exhausted;
            return Ok(false);
        }

        let mut seek = match direction {
            Direction::Forward => self.clamp_to_lower(seek),
            Direction::Backward => self.clamp_to_upper(seek),
        };

        loop {
            for source in &mut self.sources {
                source.seek(&*self.comparator, &seek)?;
            }

            let Some((key, value)) = self.pick(direction) else {
                self.cursor = Cursor::Exhausted;
                return Ok(false);
            };

            let in_bounds = match direction {
                Direction::Forward => self.below_upper(&key),
                Direction::Backward => self.above_lower(&key),
            };
            if !in_bounds {
                self.cursor = Cursor::Exhausted;
                return Ok(false);
            }

            match value {
                Some(value) => {
                    self.cursor = Cursor::Positioned { key, value };
                    return Ok(true);
                }
                // Deleted in the newest run that has it; keep going.
                None => {
                    seek = match direction {
                        Direction::Forward => Seek::Gt(key),
                        Direction::Backward => Seek::Lt(key),
                    }
                }
            }
        }
    }

    /// Best candidate across sources; ties go to the newest source
    fn pick(&self, direction: Direction) -> Option<(Bytes, Option<Bytes>)> {
        let mut best: Option<(&Bytes, Option<&Bytes>)> = None;
        for (key, value) in self.sources.iter().filter_map(RunCursor::current) {
            let better = match best {
                None => true,
                Some((best_key, _)) => {
                    let ord = self.comparator.compare(key, best_key);
                    match direction {
                        Direction::Forward => ord == Ordering::Less,
                        Direction::Backward => ord == Ordering::Greater,
                    }
                }
            };
            if better {
                best = Some((key, value));
            }
        }
        best.map(|(k, v)| (k.clone(), v.cloned()))
    }

    /// A forward seek that starts before the lower bound starts at it instead
    fn clamp_to_lower(&self, seek: Seek) -> Seek {
        let before = match &seek {
            Seek::First => true,
            Seek::Ge(t) | Seek::Gt(t) => !self.above_lower(t),
            _ => false,
        };
        if before {
            match &self.lower {
                Bound::Included(l) => return Seek::Ge(l.clone()),
                Bound::Excluded(l) => return Seek::Gt(l.clone()),
                Bound::Unbounded => {}
            }
        }
        seek
    }

    /// A backward seek that starts past the upper bound starts at it instead
    fn clamp_to_upper(&self, seek: Seek) -> Seek {
        let after = match &seek {
            Seek::Last => true,
            Seek::Lt(t) | Seek::Le(t) => !self.below_upper(t),
            _ => false,
        };
        if after {
            match &self.upper {
                Bound::Excluded(u) => return Seek::Lt(u.clone()),
                Bound::Included(u) => return Seek::Le(u.clone()),
                Bound::Unbounded => {}
            }
        }
        seek
    }

    fn above_lower(&self, key: &[u8]) -> bool {
        match &self.lower {
            Bound::Included(l) => self.comparator.compare(l, key) != Ordering::Greater,
            Bound::Excluded(l) => self.comparator.compare(l, key) == Ordering::Less,
            Bound::Unbounded => true,
        }
    }

    fn below_upper(&self, key: &[u8]) -> bool {
        match &self.upper {
            Bound::Excluded(u) => self.comparator.compare(key, u) == Ordering::Less,
            Bound::Included(u) => self.comparator.compare(key, u) != Ordering::Greater,
            Bound::Unbounded => true,
        }
    }

    /// Inverted (or empty) bounds under the comparator's order
    fn range_is_empty(&self) -> bool {
        let (lower, upper) = match (&self.lower, &self.upper) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => return false,
            (Bound::Included(l) | Bound::Excluded(l), Bound::Included(u) | Bound::Excluded(u)) => {
                (l, u)
            }
        };
        let ord = self.comparator.compare(lower, upper);
        match (&self.lower, &self.upper) {
            (Bound::Included(_), Bound::Included(_)) => ord == Ordering::Greater,
            _ => ord != Ordering::Less,
        }
    }
}

/// Forward walk over an iterator, yielding owned entries
pub struct Entries<'a, C: Comparator> {
    iter: &'a mut DbIterator<C>,
    started: bool,
    done: bool,
}

impl<'a, C: Comparator> Iterator for Entries<'a, C> {
    type Item = Result<(Bytes, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let moved = if self.started {
            self.iter.next()
        } else {
            self.started = true;
            self.iter.seek_first()
        };
        match moved {
            Ok(true) => match &self.iter.cursor {
                Cursor::Positioned { key, value } => Some(Ok((key.clone(), value.clone()))),
                _ => None,
            },
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

//! Run cursors
//!
//! A cursor over one sorted run (a memtable snapshot or a table). Cursors
//! never step; every move is a fresh seek, which keeps forward and
//! backward movement trivially consistent across runs.

use std::sync::Arc;

use bytes::Bytes;

use crate::comparator::Comparator;
use crate::error::Result;
use crate::memtable::{MemSnapshot, MemTableEntry};
use crate::storage::{Block, SSTableReader};

/// Where to position a cursor
#[derive(Debug, Clone)]
pub(crate) enum Seek {
    First,
    Last,
    /// First key `>= target`
    Ge(Bytes),
    /// First key `> target`
    Gt(Bytes),
    /// Last key `< target`
    Lt(Bytes),
    /// Last key `<= target`
    Le(Bytes),
}

pub(crate) enum RunCursor<C: Comparator> {
    /// The current entry is cloned out of the snapshot; keys and values are
    /// `Bytes`, so that is a refcount bump.
    Mem {
        run: MemSnapshot<C>,
        current: Option<(Bytes, MemTableEntry)>,
    },
    Table(TableCursor),
}

impl<C: Comparator> RunCursor<C> {
    pub fn memtable(run: MemSnapshot<C>) -> Self {
        RunCursor::Mem { run, current: None }
    }

    pub fn table(reader: Arc<SSTableReader>) -> Self {
        RunCursor::Table(TableCursor {
            reader,
            block: None,
            pos: None,
        })
    }

    pub fn seek(&mut self, comparator: &C, seek: &Seek) -> Result<()> {
        match self {
            RunCursor::Mem { run, current } => {
                let found = match seek {
                    Seek::First => run.first(),
                    Seek::Last => run.last(),
                    Seek::Ge(t) => run.seek_ge(t),
                    Seek::Gt(t) => run.seek_gt(t),
                    Seek::Lt(t) => run.seek_lt(t),
                    Seek::Le(t) => run.seek_le(t),
                };
                *current = found.map(|(key, entry)| (key.clone(), entry.clone()));
                Ok(())
            }
            RunCursor::Table(cursor) => cursor.seek(comparator, seek),
        }
    }

    /// Key and value at the cursor; a `None` value is a tombstone
    pub fn current(&self) -> Option<(&Bytes, Option<&Bytes>)> {
        match self {
            RunCursor::Mem { current, .. } => {
                current.as_ref().map(|(key, entry)| (key, entry.value()))
            }
            RunCursor::Table(cursor) => cursor.current(),
        }
    }
}

/// Cursor over a table, holding the block it points into
pub(crate) struct TableCursor {
    reader: Arc<SSTableReader>,
    block: Option<(usize, Arc<Block>)>,
    /// (block, entry); always inside the cached block
    pos: Option<(usize, usize)>,
}

impl TableCursor {
    fn load(&mut self, index: usize) -> Result<Arc<Block>> {
        if let Some((cached, block)) = &self.block {
            if *cached == index {
                return Ok(Arc::clone(block));
            }
        }
        let block = self.reader.read_block(index)?;
        self.block = Some((index, Arc::clone(&block)));
        Ok(block)
    }

    fn seek<C: Comparator + ?Sized>(&mut self, comparator: &C, seek: &Seek) -> Result<()> {
        let blocks = self.reader.block_count();
        self.pos = None;
        if blocks == 0 {
            return Ok(());
        }

        let pos = match seek {
            Seek::First => {
                self.load(0)?;
                Some((0, 0))
            }
            Seek::Last => self.last_of(blocks - 1)?,
            Seek::Ge(t) => {
                let start = self.reader.lower_bound_block(comparator, t);
                self.forward(start, |b| b.lower_bound(comparator, t))?
            }
            Seek::Gt(t) => {
                let start = self.reader.upper_bound_block(comparator, t);
                self.forward(start, |b| b.upper_bound(comparator, t))?
            }
            Seek::Lt(t) => {
                let start = self.reader.lower_bound_block(comparator, t);
                self.backward(start, |b| b.lower_bound(comparator, t))?
            }
            Seek::Le(t) => {
                let start = self.reader.upper_bound_block(comparator, t);
                self.backward(start, |b| b.upper_bound(comparator, t))?
            }
        };
        self.pos = pos;
        Ok(())
    }

    /// First entry at or after `bound(block)` starting from block `start`
    fn forward(
        &mut self,
        start: usize,
        bound: impl Fn(&Block) -> usize,
    ) -> Result<Option<(usize, usize)>> {
        for index in start..self.reader.block_count() {
            let block = self.load(index)?;
            let i = bound(&block);
            if i < block.len() {
                return Ok(Some((index, i)));
            }
        }
        Ok(None)
    }

    /// Entry just before `bound(block)`; falls back to the previous block's
    /// last entry. `start == block_count` means every key qualifies.
    fn backward(
        &mut self,
        start: usize,
        bound: impl Fn(&Block) -> usize,
    ) -> Result<Option<(usize, usize)>> {
        let blocks = self.reader.block_count();
        if start >= blocks {
            return self.last_of(blocks - 1);
        }

        let block = self.load(start)?;
        let i = bound(&block);
        if i > 0 {
            return Ok(Some((start, i - 1)));
        }
        match start.checked_sub(1) {
            Some(prev) => self.last_of(prev),
            None => Ok(None),
        }
    }

    fn last_of(&mut self, index: usize) -> Result<Option<(usize, usize)>> {
        let block = self.load(index)?;
        Ok(block.len().checked_sub(1).map(|i| (index, i)))
    }

    fn current(&self) -> Option<(&Bytes, Option<&Bytes>)> {
        let (block_idx, i) = self.pos?;
        let (cached, block) = self.block.as_ref()?;
        debug_assert_eq!(*cached, block_idx);
        let entry = block.entry(i);
        Some((&entry.key, entry.value.as_ref()))
    }
}

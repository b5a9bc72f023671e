//! SSTable Iterator
//!
//! Sequential iteration over all entries in an SSTable, block by block.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;

use super::block::Block;
use super::reader::SSTableReader;

/// Iterator over SSTable entries in comparator order
pub struct SSTableIterator<'a> {
    reader: &'a SSTableReader,
    /// Next block to load
    next_block: usize,
    /// Block being drained and the position inside it
    block: Option<Arc<Block>>,
    pos: usize,
}

impl<'a> SSTableIterator<'a> {
    pub(super) fn new(reader: &'a SSTableReader) -> Self {
        Self {
            reader,
            next_block: 0,
            block: None,
            pos: 0,
        }
    }
}

impl<'a> Iterator for SSTableIterator<'a> {
    /// (key, Option<value>) - None value means tombstone
    type Item = Result<(Bytes, Option<Bytes>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(block) = &self.block {
                if self.pos < block.len() {
                    let entry = block.entry(self.pos);
                    self.pos += 1;
                    return Some(Ok((entry.key.clone(), entry.value.clone())));
                }
            }

            // Stop after the last block
            if self.next_block >= self.reader.block_count() {
                return None;
            }

            match self.reader.read_block(self.next_block) {
                Ok(block) => {
                    self.block = Some(block);
                    self.pos = 0;
                    self.next_block += 1;
                }
                Err(e) => {
                    self.next_block = self.reader.block_count();
                    return Some(Err(e));
                }
            }
        }
    }
}

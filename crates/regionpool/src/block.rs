//! Bump-allocated blocks and the block chain.
//!
//! A [`Block`] is one contiguous region with a cursor that advances on each
//! allocation. A [`BlockChain`] is the ordered list of blocks owned by a
//! pool; when no block from the current one onward has room, a new block of
//! the same total size is appended.

use std::ops::Range;

use smallvec::SmallVec;
use tracing::debug;

use crate::buffer::WordBuffer;
use crate::config::consts::{align_up, ALIGNMENT, BLOCK_HEADER_SIZE};
use crate::error::PoolError;

/// A single contiguous block with bump allocation.
///
/// The first `data_start` bytes model the inline header and are never
/// handed out. Blocks are never freed while the pool lives, only rewound.
pub(crate) struct Block {
    /// Backing storage, `limit` bytes long.
    data: WordBuffer,
    /// Offset of the first allocatable byte.
    data_start: usize,
    /// Bump pointer: offset of the next free byte.
    cursor: usize,
    /// How many times growth passed over this block.
    failed: u32,
}

impl Block {
    /// Allocate a block of `total_size` bytes whose data region starts at `data_start`.
    pub(crate) fn new(total_size: usize, data_start: usize) -> Result<Self, PoolError> {
        debug_assert!(data_start <= total_size);
        Ok(Self {
            data: WordBuffer::try_new(total_size)?,
            data_start,
            cursor: data_start,
            failed: 0,
        })
    }

    /// Bump-allocate `size` bytes, rounding the cursor to [`ALIGNMENT`] first
    /// when `align` is set.
    ///
    /// Returns the offset of the allocation, or `None` if the block lacks room.
    pub(crate) fn try_bump(&mut self, size: usize, align: bool) -> Option<usize> {
        let candidate = if align {
            align_up(self.cursor, ALIGNMENT)
        } else {
            self.cursor
        };
        let remaining = self.limit().checked_sub(candidate)?;
        if remaining < size {
            return None;
        }
        self.cursor = candidate + size;
        Some(candidate)
    }

    /// Rewind the cursor to the start of the data region and clear the
    /// failure count. The backing memory is retained and not zeroed.
    pub(crate) fn rewind(&mut self) {
        self.cursor = self.data_start;
        self.failed = 0;
    }

    /// The `len` bytes at `offset`, or `None` if the range leaves the block.
    pub(crate) fn bytes(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.data.as_bytes().get(offset..end)
    }

    pub(crate) fn bytes_mut(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
        let end = offset.checked_add(len)?;
        self.data.as_bytes_mut().get_mut(offset..end)
    }

    pub(crate) fn limit(&self) -> usize {
        self.data.len()
    }

    /// Bytes handed out since the last rewind, alignment padding included.
    pub(crate) fn used(&self) -> usize {
        self.cursor - self.data_start
    }

    pub(crate) fn info(&self, index: usize) -> BlockInfo {
        let base = self.data.base_addr();
        BlockInfo {
            index,
            data_start: self.data_start,
            cursor: self.cursor,
            limit: self.limit(),
            failed: self.failed,
            data_addr_range: base + self.data_start..base + self.limit(),
        }
    }
}

/// Read-only view of one block's bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Position in the chain (0 is the head block).
    pub index: usize,
    /// Offset of the first allocatable byte.
    pub data_start: usize,
    /// Offset of the next free byte.
    pub cursor: usize,
    /// Offset one past the last byte.
    pub limit: usize,
    /// Times growth passed over this block since the last reset.
    pub failed: u32,
    /// Address range of the data region, for containment checks.
    pub data_addr_range: Range<usize>,
}

impl BlockInfo {
    /// Free bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.limit - self.cursor
    }
}

/// Seam through which internal records reserve their footprint.
///
/// Oversized records and cleanup entries charge their size against the
/// block chain, the same storage the public small path uses.
pub(crate) trait MetadataAlloc {
    /// Reserve `size` aligned bytes of record metadata.
    fn alloc_metadata(&mut self, size: usize) -> Result<(usize, usize), PoolError>;
}

/// The pool's ordered chain of blocks.
pub(crate) struct BlockChain {
    blocks: SmallVec<[Block; 4]>,
    /// Total size of every block (taken from the head block).
    block_size: usize,
    /// First block considered for small allocations.
    current: usize,
    failure_budget: u32,
}

impl BlockChain {
    /// Create a chain holding only the head block, whose data region starts
    /// after `head_header` bytes.
    pub(crate) fn new(
        block_size: usize,
        head_header: usize,
        failure_budget: u32,
    ) -> Result<Self, PoolError> {
        let mut blocks = SmallVec::new();
        blocks.push(Block::new(block_size, head_header)?);
        Ok(Self {
            blocks,
            block_size,
            current: 0,
            failure_budget,
        })
    }

    /// Bump-allocate `size` bytes from the first block at or after `current`
    /// that has room, growing the chain if none does.
    ///
    /// Returns `(block_index, offset)`.
    pub(crate) fn alloc(&mut self, size: usize, align: bool) -> Result<(usize, usize), PoolError> {
        for index in self.current..self.blocks.len() {
            if let Some(offset) = self.blocks[index].try_bump(size, align) {
                return Ok((index, offset));
            }
        }
        self.grow(size)
    }

    /// Append a new block and serve `size` bytes from it.
    fn grow(&mut self, size: usize) -> Result<(usize, usize), PoolError> {
        let data_start = align_up(BLOCK_HEADER_SIZE, ALIGNMENT);
        let mut block = Block::new(self.block_size, data_start)?;
        let offset = block
            .try_bump(size, false)
            .ok_or(PoolError::CapacityExceeded {
                requested: size,
                capacity: self.block_size - data_start,
            })?;

        // Every block from `current` up to the tail missed this request.
        let tail = self.blocks.len() - 1;
        for index in self.current..tail {
            let passed = &mut self.blocks[index];
            let failed = passed.failed;
            passed.failed += 1;
            if failed > self.failure_budget {
                self.current = index + 1;
            }
        }

        self.blocks.push(block);
        let index = self.blocks.len() - 1;
        debug!(
            block = index,
            block_size = self.block_size,
            current = self.current,
            "appended block"
        );
        Ok((index, offset))
    }

    /// Rewind every block and point `current` back at the head.
    pub(crate) fn rewind_all(&mut self) {
        for block in &mut self.blocks {
            block.rewind();
        }
        self.current = 0;
    }

    /// Drop every block, head to tail. Returns how many were released.
    pub(crate) fn release_all(&mut self) -> usize {
        let count = self.blocks.len();
        // Elements drop in index order.
        self.blocks.clear();
        count
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.blocks.len()
    }

    pub(crate) fn current(&self) -> usize {
        self.current
    }

    /// Total bytes reserved across all blocks, headers included.
    pub(crate) fn reserved_bytes(&self) -> usize {
        self.blocks.len() * self.block_size
    }

    pub(crate) fn used_bytes(&self) -> usize {
        self.blocks.iter().map(Block::used).sum()
    }
}

impl MetadataAlloc for BlockChain {
    fn alloc_metadata(&mut self, size: usize) -> Result<(usize, usize), PoolError> {
        self.alloc(size, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAD_HEADER: usize = 64;

    fn chain(block_size: usize) -> BlockChain {
        BlockChain::new(block_size, HEAD_HEADER, 4).unwrap()
    }

    #[test]
    fn block_starts_after_header() {
        let mut block = Block::new(256, HEAD_HEADER).unwrap();
        assert_eq!(block.try_bump(10, true), Some(HEAD_HEADER));
        assert_eq!(block.used(), 10);
    }

    #[test]
    fn block_sequential_alloc() {
        let mut block = Block::new(256, HEAD_HEADER).unwrap();
        let a = block.try_bump(10, true).unwrap();
        let b = block.try_bump(10, true).unwrap();
        assert_eq!(a, HEAD_HEADER);
        assert_eq!(b, align_up(HEAD_HEADER + 10, ALIGNMENT));
    }

    #[test]
    fn unaligned_allocs_are_adjacent() {
        let mut block = Block::new(256, HEAD_HEADER).unwrap();
        let a = block.try_bump(3, false).unwrap();
        let b = block.try_bump(5, false).unwrap();
        assert_eq!(b, a + 3);
    }

    #[test]
    fn block_alloc_fails_when_full() {
        let mut block = Block::new(128, HEAD_HEADER).unwrap();
        assert!(block.try_bump(64, true).is_some());
        assert!(block.try_bump(1, false).is_none());
    }

    #[test]
    fn byte_range_outside_block_is_none() {
        let block = Block::new(128, HEAD_HEADER).unwrap();
        assert_eq!(block.bytes(HEAD_HEADER, 8).map(<[u8]>::len), Some(8));
        assert!(block.bytes(120, 16).is_none());
        assert!(block.bytes(usize::MAX, 2).is_none());
    }

    #[test]
    fn aligned_cursor_past_limit_is_a_miss() {
        let mut block = Block::new(HEAD_HEADER + 5, HEAD_HEADER).unwrap();
        assert!(block.try_bump(3, false).is_some());
        // Rounding the cursor up lands beyond the limit.
        assert!(block.try_bump(0, true).is_none());
    }

    #[test]
    fn block_rewind_allows_realloc() {
        let mut block = Block::new(128, HEAD_HEADER).unwrap();
        block.try_bump(64, true).unwrap();
        block.failed = 3;
        block.rewind();
        assert_eq!(block.used(), 0);
        assert_eq!(block.failed, 0);
        assert_eq!(block.try_bump(8, true), Some(HEAD_HEADER));
    }

    #[test]
    fn chain_alloc_within_head_block() {
        let mut chain = chain(512);
        assert_eq!(chain.alloc(10, true).unwrap(), (0, HEAD_HEADER));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn chain_grows_on_overflow() {
        let mut chain = chain(256);
        chain.alloc(192, true).unwrap();
        let (index, offset) = chain.alloc(100, true).unwrap();
        assert_eq!(index, 1);
        assert_eq!(offset, align_up(BLOCK_HEADER_SIZE, ALIGNMENT));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.reserved_bytes(), 512);
    }

    #[test]
    fn earlier_block_with_room_is_used_first() {
        let mut chain = chain(256);
        chain.alloc(150, true).unwrap();
        chain.alloc(150, true).unwrap(); // grows to block 1
        let (index, _) = chain.alloc(16, true).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn request_larger_than_fresh_block_is_rejected() {
        let mut chain = chain(256);
        let result = chain.alloc(1024, true);
        assert!(matches!(result, Err(PoolError::CapacityExceeded { .. })));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn current_advances_past_exhausted_block() {
        let block_size = 256;
        let mut chain = chain(block_size);
        let big = block_size - align_up(BLOCK_HEADER_SIZE, ALIGNMENT);
        chain.alloc(block_size - HEAD_HEADER, true).unwrap();
        // Each growth passes over the head block once more.
        // The first growth has nothing before the tail; the next six charge
        // the head, and the sixth charge sees a count above the budget.
        for _ in 0..7 {
            chain.alloc(big, true).unwrap();
        }
        assert_eq!(chain.blocks[0].failed, 6);
        assert_eq!(chain.current(), 1);
    }

    #[test]
    fn tail_is_not_charged_during_growth() {
        let mut chain = chain(256);
        chain.alloc(192, true).unwrap();
        // Only one block: nothing before the tail to charge.
        chain.alloc(192, true).unwrap();
        assert_eq!(chain.blocks[0].failed, 0);
        chain.alloc(192, true).unwrap();
        assert_eq!(chain.blocks[0].failed, 1);
        assert_eq!(chain.blocks[1].failed, 0);
    }

    #[test]
    fn rewind_all_resets_current_and_cursors() {
        let mut chain = chain(256);
        chain.alloc(192, true).unwrap();
        chain.alloc(192, true).unwrap();
        chain.rewind_all();
        assert_eq!(chain.current(), 0);
        assert_eq!(chain.used_bytes(), 0);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.alloc(8, true).unwrap(), (0, HEAD_HEADER));
    }

    #[test]
    fn release_all_drops_every_block() {
        let mut chain = chain(256);
        chain.alloc(192, true).unwrap();
        chain.alloc(192, true).unwrap();
        assert_eq!(chain.release_all(), 2);
        assert_eq!(chain.len(), 0);
    }

    #[test]
    fn block_info_reports_address_range() {
        let chain = chain(256);
        let info = chain.get(0).unwrap().info(0);
        assert_eq!(info.data_addr_range.len(), 256 - HEAD_HEADER);
        assert_eq!(info.remaining(), 256 - HEAD_HEADER);
    }
}

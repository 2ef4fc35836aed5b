//! Word-aligned owned byte buffers.
//!
//! All pool memory (blocks and oversized regions) is a `Box<[u64]>` viewed
//! as bytes through `bytemuck`, so an offset that is a multiple of
//! [`ALIGNMENT`](crate::config::consts::ALIGNMENT) is also an aligned address.
//! Storage is reserved with `try_reserve_exact`, so exhaustion surfaces as
//! [`PoolError::AllocationFailed`] rather than an abort.

use crate::error::PoolError;

const WORD_BYTES: usize = std::mem::size_of::<u64>();

/// A fallibly allocated, zero-initialised, 8-byte aligned byte buffer.
pub(crate) struct WordBuffer {
    words: Box<[u64]>,
    /// Usable length in bytes (may be less than `words.len() * 8`).
    len: usize,
}

impl WordBuffer {
    /// Allocate `len` zeroed bytes.
    pub(crate) fn try_new(len: usize) -> Result<Self, PoolError> {
        let word_count = len.div_ceil(WORD_BYTES);
        let mut words: Vec<u64> = Vec::new();
        words
            .try_reserve_exact(word_count)
            .map_err(|_| PoolError::AllocationFailed { requested: len })?;
        words.resize(word_count, 0);
        Ok(Self {
            words: words.into_boxed_slice(),
            len,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len]
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..self.len]
    }

    /// Address of the first byte.
    pub(crate) fn base_addr(&self) -> usize {
        self.words.as_ptr() as usize
    }
}

//! Allocation and cleanup handles.
//!
//! An [`AllocHandle`] encodes where an allocation lives: inside a block of
//! the chain (block index + byte offset) or in the oversized registry
//! (opaque token). Every handle carries the id of the pool that issued it,
//! so another pool rejects it instead of resolving it against its own
//! storage. Block handles also carry the pool generation so that a handle
//! issued before a reset can be rejected instead of aliasing rewound memory.

use std::fmt;

/// Location of one allocation handed out by a [`Pool`](crate::Pool).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct AllocHandle {
    /// Id of the issuing pool.
    pub(crate) pool_id: u64,
    /// Pool generation when this allocation was made.
    pub(crate) generation: u64,
    /// Length of the allocation in bytes.
    pub(crate) len: usize,
    /// Which storage this handle points into.
    pub(crate) location: AllocLocation,
}

impl AllocHandle {
    pub(crate) fn block(
        pool_id: u64,
        generation: u64,
        block_index: usize,
        offset: usize,
        len: usize,
    ) -> Self {
        Self {
            pool_id,
            generation,
            len,
            location: AllocLocation::Block {
                block_index,
                offset,
            },
        }
    }

    pub(crate) fn oversized(pool_id: u64, generation: u64, token: u64, len: usize) -> Self {
        Self {
            pool_id,
            generation,
            len,
            location: AllocLocation::Oversized { token },
        }
    }

    /// Id of the pool that issued this handle.
    pub fn pool_id(&self) -> u64 {
        self.pool_id
    }

    /// The pool generation this handle belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Length of the allocation in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether this is a zero-length allocation.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The location descriptor.
    pub fn location(&self) -> AllocLocation {
        self.location
    }

    /// Whether the allocation was served by the oversized path.
    pub fn is_oversized(&self) -> bool {
        matches!(self.location, AllocLocation::Oversized { .. })
    }
}

impl fmt::Display for AllocHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AllocHandle(pool={}, gen={}, len={}, {:?})",
            self.pool_id, self.generation, self.len, self.location
        )
    }
}

/// Describes which storage an [`AllocHandle`] points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AllocLocation {
    /// Bump-allocated inside a block of the chain.
    Block {
        /// Position of the block in the chain (0 is the head block).
        block_index: usize,
        /// Byte offset from the start of the block.
        offset: usize,
    },
    /// A separate heap region tracked by the oversized registry.
    Oversized {
        /// Unique token assigned when the region was allocated.
        token: u64,
    },
}

/// Handle to a registered cleanup entry.
///
/// Returned by [`Pool::register_cleanup`](crate::Pool::register_cleanup)
/// and used to attach the handler and context afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct CleanupHandle {
    pub(crate) pool_id: u64,
    pub(crate) index: usize,
}

impl CleanupHandle {
    /// Id of the pool that issued this handle.
    pub fn pool_id(&self) -> u64 {
        self.pool_id
    }

    /// Registration index (0 is the first entry ever registered).
    pub fn index(&self) -> usize {
        self.index
    }
}

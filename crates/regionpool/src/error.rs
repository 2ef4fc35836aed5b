//! Pool-specific error types.

use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The underlying allocator could not supply the requested memory.
    #[error("allocation failed: {requested} bytes")]
    AllocationFailed {
        /// Number of bytes requested from the underlying allocator.
        requested: usize,
    },
    /// A request cannot fit in a single block, even a fresh one.
    #[error("block capacity exceeded: requested {requested} bytes, capacity {capacity} bytes")]
    CapacityExceeded {
        /// Number of bytes requested.
        requested: usize,
        /// Data capacity of a fresh block.
        capacity: usize,
    },
    /// The pool configuration was rejected at creation.
    #[error("invalid pool config: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// A block handle issued before the most recent reset.
    #[error("stale handle: generation {handle_generation}, current {current_generation}")]
    StaleHandle {
        /// The generation encoded in the handle.
        handle_generation: u64,
        /// The pool's current generation.
        current_generation: u64,
    },
    /// A handle issued by a different pool.
    #[error("handle belongs to pool {handle_pool}, not pool {pool}")]
    ForeignHandle {
        /// Id of the pool that issued the handle.
        handle_pool: u64,
        /// Id of the pool it was presented to.
        pool: u64,
    },
    /// An oversized token that is no longer tracked (freed or reset).
    #[error("unknown oversized allocation: token {token}")]
    UnknownAllocation {
        /// The token that failed to resolve.
        token: u64,
    },
    /// A cleanup handle that does not name a registered entry.
    #[error("unknown cleanup entry: {index}")]
    UnknownCleanup {
        /// Index carried by the handle.
        index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_request() {
        let err = PoolError::AllocationFailed { requested: 4096 };
        assert_eq!(err.to_string(), "allocation failed: 4096 bytes");
    }

    #[test]
    fn stale_handle_reports_both_generations() {
        let err = PoolError::StaleHandle {
            handle_generation: 1,
            current_generation: 3,
        };
        assert_eq!(err.to_string(), "stale handle: generation 1, current 3");
    }

    #[test]
    fn foreign_handle_names_both_pools() {
        let err = PoolError::ForeignHandle {
            handle_pool: 2,
            pool: 5,
        };
        assert_eq!(err.to_string(), "handle belongs to pool 2, not pool 5");
    }
}

//! Region-based pool allocation.
//!
//! A [`Pool`] amortises many small allocations into a few large blocks,
//! sends oversized requests to dedicated heap regions, and releases
//! everything it owns in one teardown, running caller-registered cleanup
//! handlers first. It suits call- or session-scoped work where individual
//! frees are unnecessary.
//!
//! # Architecture
//!
//! ```text
//! Pool (facade, routes by size against the threshold)
//! ├── BlockChain → Block[] (bump allocation, same total size per block)
//! ├── OversizedRegistry (size >= threshold, freeable, slots reused)
//! └── CleanupChain (two-phase registration, runs newest-first at teardown)
//! ```
//!
//! # Handles
//!
//! Allocations are returned as [`AllocHandle`]s and resolved with
//! [`Pool::bytes`] / [`Pool::bytes_mut`]. A reset bumps the pool
//! generation, so block handles from before it resolve to
//! [`PoolError::StaleHandle`] instead of rewound memory. Handles also name
//! the pool that issued them; any other pool answers
//! [`PoolError::ForeignHandle`].
//!
//! ```
//! use regionpool::Pool;
//!
//! let mut pool = Pool::with_size(512)?;
//! let small = pool.allocate_zeroed(64)?;
//! let large = pool.allocate(8192)?;
//! assert!(!small.is_oversized());
//! assert!(large.is_oversized());
//! pool.free(&large);
//! pool.reset();
//! pool.destroy();
//! # Ok::<(), regionpool::PoolError>(())
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

mod block;
mod buffer;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod handle;
mod oversized;
pub mod pool;

// Public re-exports for the primary API surface.
pub use block::BlockInfo;
pub use cleanup::{CleanupContext, CleanupData, CleanupHandler};
pub use config::{consts, PoolConfig};
pub use error::PoolError;
pub use handle::{AllocHandle, AllocLocation, CleanupHandle};
pub use pool::{Pool, PoolStats, TeardownReport};

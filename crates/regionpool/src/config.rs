//! Pool configuration parameters and build-time layout constants.

use serde::{Deserialize, Serialize};

use crate::error::PoolError;

/// Build-time constants describing the pool's memory layout.
///
/// The header sizes model the bookkeeping that a pointer-based pool keeps
/// inline at the front of each region. They are reserved (never handed out)
/// so the small-allocation threshold and per-block capacity match that layout.
pub mod consts {
    const WORD: usize = std::mem::size_of::<usize>();

    /// Virtual-memory page size assumed by the threshold computation.
    pub const PAGE_SIZE: usize = 4096;

    /// Largest request the small-allocation path may ever serve: one page minus one byte.
    pub const MAX_ALLOC_FROM_POOL: usize = PAGE_SIZE - 1;

    /// Default total size of the first block: 16 KiB.
    pub const DEFAULT_POOL_SIZE: usize = 16 * 1024;

    /// Alignment unit for aligned small allocations: one machine word.
    pub const ALIGNMENT: usize = WORD;

    /// Structural alignment used when computing [`MIN_POOL_SIZE`].
    pub const POOL_ALIGNMENT: usize = 16;

    /// Per-block header: cursor, limit, next link, failure count.
    pub const BLOCK_HEADER_SIZE: usize = 4 * WORD;

    /// Head-block header: the per-block header plus threshold, current
    /// block, oversized head and cleanup head.
    pub const POOL_HEADER_SIZE: usize = BLOCK_HEADER_SIZE + 4 * WORD;

    /// Footprint of one oversized-allocation record: next link and region.
    pub const LARGE_RECORD_SIZE: usize = 2 * WORD;

    /// Footprint of one cleanup entry: handler, context, next link.
    pub const CLEANUP_ENTRY_SIZE: usize = 3 * WORD;

    /// Smallest accepted pool size: the pool header plus two oversized
    /// records, rounded up to [`POOL_ALIGNMENT`].
    pub const MIN_POOL_SIZE: usize =
        align_up(POOL_HEADER_SIZE + 2 * LARGE_RECORD_SIZE, POOL_ALIGNMENT);

    /// Round `n` up to the next multiple of `align` (a power of two).
    pub const fn align_up(n: usize, align: usize) -> usize {
        (n + (align - 1)) & !(align - 1)
    }
}

/// Configuration for a [`Pool`](crate::Pool).
///
/// Validated at construction; all values are immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Total size in bytes of the first block, header included.
    ///
    /// Every block appended later has the same total footprint.
    /// Default: 16384. Must be at least [`consts::MIN_POOL_SIZE`].
    pub size: usize,

    /// Upper bound on the small-allocation threshold.
    ///
    /// Default: [`consts::MAX_ALLOC_FROM_POOL`] (4095).
    pub max_alloc_from_pool: usize,

    /// How many times a block may be passed over during growth before the
    /// current-block pointer skips it. Default: 4.
    pub failure_budget: u32,

    /// How many oversized records are inspected for a freed slot before a
    /// new record is created. Default: 3. Zero disables slot reuse.
    pub large_reuse_scan: usize,
}

impl PoolConfig {
    /// Default failure budget before a block is skipped.
    pub const DEFAULT_FAILURE_BUDGET: u32 = 4;

    /// Default bound on the oversized-slot reuse scan.
    pub const DEFAULT_LARGE_REUSE_SCAN: usize = 3;

    /// Create a config for a pool of `size` bytes with default tuning.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            max_alloc_from_pool: consts::MAX_ALLOC_FROM_POOL,
            failure_budget: Self::DEFAULT_FAILURE_BUDGET,
            large_reuse_scan: Self::DEFAULT_LARGE_REUSE_SCAN,
        }
    }

    /// Check the config for values the pool cannot honour.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.size < consts::MIN_POOL_SIZE {
            return Err(PoolError::InvalidConfig {
                reason: format!(
                    "size must be >= {} bytes (got {})",
                    consts::MIN_POOL_SIZE,
                    self.size
                ),
            });
        }
        if self.max_alloc_from_pool == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "max_alloc_from_pool must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Small-allocation threshold: `min(size - POOL_HEADER_SIZE, max_alloc_from_pool)`.
    ///
    /// Only meaningful for a validated config.
    pub fn threshold(&self) -> usize {
        self.size
            .saturating_sub(consts::POOL_HEADER_SIZE)
            .min(self.max_alloc_from_pool)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(consts::DEFAULT_POOL_SIZE)
    }
}

//! The pool facade.
//!
//! [`Pool`] routes every request by size: below the threshold it is
//! bump-allocated from the block chain, otherwise it becomes an oversized
//! region. The lifecycle is:
//! 1. `create()`: reserve the head block
//! 2. `allocate*()` / `free()` / `register_cleanup()`: any number of times
//! 3. `reset()`: release oversized regions and rewind every block
//! 4. `destroy()` (or drop): run cleanups, release oversized regions, release blocks

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace, warn};

use crate::block::{BlockChain, BlockInfo, MetadataAlloc};
use crate::cleanup::{CleanupChain, CleanupContext, CleanupData, CleanupEntry, CleanupOutcome};
use crate::config::consts::{CLEANUP_ENTRY_SIZE, POOL_HEADER_SIZE};
use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::handle::{AllocHandle, AllocLocation, CleanupHandle};
use crate::oversized::OversizedRegistry;

/// Source of pool ids, unique within the process.
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Region-based pool allocator.
///
/// Small requests are served by bumping a cursor inside a chain of
/// equally sized blocks; large requests get their own heap region. Nothing
/// small is freed individually: [`reset`](Pool::reset) rewinds everything
/// at once and [`destroy`](Pool::destroy) releases it all.
///
/// # Layout
///
/// ```text
/// Pool
/// ├── BlockChain → Block[] (head reserves POOL_HEADER_SIZE, others BLOCK_HEADER_SIZE)
/// ├── OversizedRegistry → records (footprint charged to the chain)
/// └── CleanupChain → entries (footprint charged to the chain), run newest-first
/// ```
///
/// Handles are stamped with the id of the pool that issued them. Presenting
/// one to another pool yields [`PoolError::ForeignHandle`], and
/// [`free`](Pool::free) ignores it.
///
/// A pool has a single owner and no internal synchronisation.
///
/// # Unwinding
///
/// A pool dropped while its thread is already panicking releases its
/// memory but does not run cleanup handlers: a second panic from a handler
/// would abort the process. The skipped entries are counted in
/// [`TeardownReport::handlers_skipped`] and logged.
pub struct Pool {
    id: u64,
    blocks: BlockChain,
    oversized: OversizedRegistry,
    cleanups: CleanupChain,
    /// Requests strictly below this size use the block chain.
    threshold: usize,
    /// Incremented on every reset; stamped into block handles.
    generation: u64,
    config: PoolConfig,
    torn_down: bool,
}

/// Counts reported by a completed teardown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Handlers that ran to completion.
    pub handlers_run: usize,
    /// Handlers that panicked (later steps still ran).
    pub handlers_failed: usize,
    /// Entries whose handler was never assigned.
    pub handlers_unset: usize,
    /// Handlers not run because teardown happened during a panic.
    pub handlers_skipped: usize,
    /// Oversized regions released.
    pub oversized_released: usize,
    /// Blocks released.
    pub blocks_released: usize,
}

/// Point-in-time usage figures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    /// Blocks in the chain.
    pub block_count: usize,
    /// Bytes reserved by blocks, headers included.
    pub reserved_bytes: usize,
    /// Bytes handed out from blocks since the last reset, padding included.
    pub used_bytes: usize,
    /// Oversized regions currently allocated.
    pub oversized_live: usize,
    /// Bytes held by live oversized regions.
    pub oversized_bytes: usize,
    /// Oversized records, including cleared slots.
    pub oversized_records: usize,
    /// Registered cleanup entries.
    pub cleanup_entries: usize,
    /// Index of the first block considered for small allocations.
    pub current_block: usize,
    /// Small-allocation threshold.
    pub threshold: usize,
    /// Resets performed so far.
    pub generation: u64,
}

impl Pool {
    /// Create a pool from `config`.
    ///
    /// Reserves the head block of `config.size` bytes. Fails if the config
    /// is invalid or the underlying allocation fails.
    pub fn create(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let blocks = BlockChain::new(config.size, POOL_HEADER_SIZE, config.failure_budget)?;
        let threshold = config.threshold();
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        debug!(id, size = config.size, threshold, "created pool");
        Ok(Self {
            id,
            blocks,
            oversized: OversizedRegistry::new(config.large_reuse_scan),
            cleanups: CleanupChain::new(),
            threshold,
            generation: 0,
            config,
            torn_down: false,
        })
    }

    /// Create a pool of `size` bytes with default tuning.
    pub fn with_size(size: usize) -> Result<Self, PoolError> {
        Self::create(PoolConfig::new(size))
    }

    /// Create a pool of the default size (16 KiB).
    pub fn new() -> Result<Self, PoolError> {
        Self::create(PoolConfig::default())
    }

    /// Allocate `size` bytes aligned to [`ALIGNMENT`](crate::config::consts::ALIGNMENT).
    pub fn allocate(&mut self, size: usize) -> Result<AllocHandle, PoolError> {
        self.route(size, true)
    }

    /// Allocate `size` bytes with no alignment padding.
    ///
    /// Consecutive small requests may be exactly adjacent.
    pub fn allocate_unaligned(&mut self, size: usize) -> Result<AllocHandle, PoolError> {
        self.route(size, false)
    }

    /// Allocate `size` aligned bytes, all zero.
    pub fn allocate_zeroed(&mut self, size: usize) -> Result<AllocHandle, PoolError> {
        let handle = self.route(size, true)?;
        self.bytes_mut(&handle)?.fill(0);
        Ok(handle)
    }

    fn route(&mut self, size: usize, align: bool) -> Result<AllocHandle, PoolError> {
        if size < self.threshold {
            let (block_index, offset) = self.blocks.alloc(size, align)?;
            trace!(size, align, block = block_index, offset, "small alloc");
            Ok(AllocHandle::block(
                self.id,
                self.generation,
                block_index,
                offset,
                size,
            ))
        } else {
            let token = self.oversized.alloc(size, &mut self.blocks)?;
            trace!(size, token, "oversized alloc");
            Ok(AllocHandle::oversized(self.id, self.generation, token, size))
        }
    }

    /// Release an oversized allocation early.
    ///
    /// Its record stays behind for reuse. Block handles, handles from
    /// another pool, and handles that are no longer tracked are ignored.
    pub fn free(&mut self, handle: &AllocHandle) {
        if handle.pool_id != self.id {
            trace!(
                handle_pool = handle.pool_id,
                pool = self.id,
                "free of foreign handle ignored"
            );
            return;
        }
        if let AllocLocation::Oversized { token } = handle.location {
            let released = self.oversized.free(token);
            trace!(token, released, "free");
        }
    }

    /// Release every oversized region and rewind every block.
    ///
    /// Block memory is kept, so the chain does not grow again until demand
    /// exceeds its previous high-water mark. Cleanup entries are untouched.
    /// Handles issued before the reset stop resolving. The generation is a
    /// `u64`, so it cannot wrap back to an earlier value in practice.
    pub fn reset(&mut self) {
        let released = self.oversized.release_all();
        self.blocks.rewind_all();
        self.generation += 1;
        debug!(
            generation = self.generation,
            oversized_released = released,
            blocks = self.blocks.len(),
            "reset pool"
        );
    }

    /// Run every cleanup handler newest-first, then release all oversized
    /// regions and all blocks.
    pub fn destroy(mut self) -> TeardownReport {
        self.teardown()
    }

    fn teardown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        let entries: Vec<CleanupEntry> = self.cleanups.drain_newest_first().collect();
        if std::thread::panicking() {
            report.handlers_skipped = entries.len();
            if !entries.is_empty() {
                warn!(
                    skipped = entries.len(),
                    "pool dropped during a panic; cleanup handlers not run"
                );
            }
            drop(entries);
            return self.release_storage(report);
        }
        for entry in entries {
            let (handler, context) = entry.into_parts();
            let outcome = match context {
                CleanupContext::None => CleanupEntry::invoke(handler, CleanupData::None),
                CleanupContext::External(value) => {
                    CleanupEntry::invoke(handler, CleanupData::External(value))
                }
                CleanupContext::Payload(payload) => match self.bytes_mut(&payload) {
                    Ok(bytes) => CleanupEntry::invoke(handler, CleanupData::Payload(bytes)),
                    Err(err) => {
                        debug!(%err, "cleanup payload no longer resolves");
                        CleanupEntry::invoke(handler, CleanupData::None)
                    }
                },
            };
            match outcome {
                CleanupOutcome::Ran => report.handlers_run += 1,
                CleanupOutcome::Panicked => {
                    warn!("cleanup handler panicked; continuing teardown");
                    report.handlers_failed += 1;
                }
                CleanupOutcome::Unset => report.handlers_unset += 1,
            }
        }
        self.release_storage(report)
    }

    fn release_storage(&mut self, mut report: TeardownReport) -> TeardownReport {
        report.oversized_released = self.oversized.release_all();
        report.blocks_released = self.blocks.release_all();
        self.torn_down = true;
        debug!(?report, "destroyed pool");
        report
    }

    /// Reserve a cleanup entry, with a `payload_size`-byte payload if non-zero.
    ///
    /// The entry is visited at teardown whether or not a handler is ever
    /// attached with [`set_cleanup_handler`](Pool::set_cleanup_handler).
    /// Payloads below the threshold come from the block chain; larger ones
    /// become oversized allocations.
    pub fn register_cleanup(&mut self, payload_size: usize) -> Result<CleanupHandle, PoolError> {
        self.blocks.alloc_metadata(CLEANUP_ENTRY_SIZE)?;
        let context = if payload_size > 0 {
            CleanupContext::Payload(self.allocate(payload_size)?)
        } else {
            CleanupContext::None
        };
        let handle = self.cleanups.register(self.id, context);
        trace!(index = handle.index, payload_size, "registered cleanup");
        Ok(handle)
    }

    /// Attach (or replace) the handler for a registered entry.
    pub fn set_cleanup_handler<F>(
        &mut self,
        handle: CleanupHandle,
        handler: F,
    ) -> Result<(), PoolError>
    where
        F: FnOnce(CleanupData<'_>) + 'static,
    {
        self.check_cleanup_owner(handle)?;
        if self.cleanups.set_handler(handle, Box::new(handler)) {
            Ok(())
        } else {
            Err(PoolError::UnknownCleanup {
                index: handle.index,
            })
        }
    }

    /// Replace the context of a registered entry.
    ///
    /// Typically used to attach an external resource to an entry registered
    /// with a zero payload size.
    pub fn set_cleanup_context(
        &mut self,
        handle: CleanupHandle,
        context: CleanupContext,
    ) -> Result<(), PoolError> {
        self.check_cleanup_owner(handle)?;
        let entry = self
            .cleanups
            .get_mut(handle)
            .ok_or(PoolError::UnknownCleanup {
                index: handle.index,
            })?;
        entry.context = context;
        Ok(())
    }

    /// The payload handle of a registered entry, if it has one.
    pub fn cleanup_payload(
        &mut self,
        handle: CleanupHandle,
    ) -> Result<Option<AllocHandle>, PoolError> {
        self.check_cleanup_owner(handle)?;
        let entry = self
            .cleanups
            .get_mut(handle)
            .ok_or(PoolError::UnknownCleanup {
                index: handle.index,
            })?;
        match entry.context {
            CleanupContext::Payload(payload) => Ok(Some(payload)),
            _ => Ok(None),
        }
    }

    /// Resolve a handle to its bytes.
    ///
    /// Fails with [`PoolError::ForeignHandle`] for another pool's handle,
    /// [`PoolError::StaleHandle`] for a block handle from before the last
    /// reset, and [`PoolError::UnknownAllocation`] for a freed oversized one.
    pub fn bytes(&self, handle: &AllocHandle) -> Result<&[u8], PoolError> {
        self.check_owner(handle.pool_id)?;
        match handle.location {
            AllocLocation::Block {
                block_index,
                offset,
            } => {
                self.check_generation(handle)?;
                self.blocks
                    .get(block_index)
                    .and_then(|block| block.bytes(offset, handle.len))
                    .ok_or_else(|| self.stale(handle))
            }
            AllocLocation::Oversized { token } => self
                .oversized
                .bytes(token)
                .ok_or(PoolError::UnknownAllocation { token }),
        }
    }

    /// Resolve a handle to its bytes, mutably. Fails like [`bytes`](Pool::bytes).
    pub fn bytes_mut(&mut self, handle: &AllocHandle) -> Result<&mut [u8], PoolError> {
        self.check_owner(handle.pool_id)?;
        match handle.location {
            AllocLocation::Block {
                block_index,
                offset,
            } => {
                self.check_generation(handle)?;
                let stale = self.stale(handle);
                self.blocks
                    .get_mut(block_index)
                    .and_then(|block| block.bytes_mut(offset, handle.len))
                    .ok_or(stale)
            }
            AllocLocation::Oversized { token } => self
                .oversized
                .bytes_mut(token)
                .ok_or(PoolError::UnknownAllocation { token }),
        }
    }

    /// Start address of an allocation.
    pub fn address(&self, handle: &AllocHandle) -> Result<usize, PoolError> {
        Ok(self.bytes(handle)?.as_ptr() as usize)
    }

    fn check_owner(&self, handle_pool: u64) -> Result<(), PoolError> {
        if handle_pool == self.id {
            Ok(())
        } else {
            Err(PoolError::ForeignHandle {
                handle_pool,
                pool: self.id,
            })
        }
    }

    fn check_cleanup_owner(&self, handle: CleanupHandle) -> Result<(), PoolError> {
        self.check_owner(handle.pool_id)
    }

    fn check_generation(&self, handle: &AllocHandle) -> Result<(), PoolError> {
        if handle.generation == self.generation {
            Ok(())
        } else {
            Err(self.stale(handle))
        }
    }

    fn stale(&self, handle: &AllocHandle) -> PoolError {
        PoolError::StaleHandle {
            handle_generation: handle.generation,
            current_generation: self.generation,
        }
    }

    /// Process-unique id stamped into every handle this pool issues.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Small-allocation threshold, fixed at creation.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// The configuration this pool was created with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of resets performed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Bookkeeping for every block, head first.
    pub fn blocks(&self) -> Vec<BlockInfo> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(index, block)| block.info(index))
            .collect()
    }

    /// Current usage figures.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            block_count: self.blocks.len(),
            reserved_bytes: self.blocks.reserved_bytes(),
            used_bytes: self.blocks.used_bytes(),
            oversized_live: self.oversized.live_count(),
            oversized_bytes: self.oversized.live_bytes(),
            oversized_records: self.oversized.record_count(),
            cleanup_entries: self.cleanups.len(),
            current_block: self.blocks.current(),
            threshold: self.threshold,
            generation: self.generation,
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if !self.torn_down {
            self.teardown();
        }
    }
}

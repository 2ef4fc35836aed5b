//! Test utilities for regionpool development.
//!
//! Provides a [`CleanupLog`] that records handler invocations in order,
//! helpers that register recording or panicking cleanup entries, and pool
//! constructors sized for the common test scenarios.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::cell::RefCell;
use std::rc::Rc;

use regionpool::{CleanupHandle, Pool, PoolConfig, PoolError};

/// Shared, ordered record of which cleanup handlers ran.
///
/// Clones share the same log, so one clone can be moved into each handler
/// while the test keeps another for assertions.
#[derive(Clone, Default)]
pub struct CleanupLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl CleanupLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, label: impl Into<String>) {
        self.entries.borrow_mut().push(label.into());
    }

    /// Labels in invocation order.
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Register an entry whose handler appends `label` to `log`.
pub fn register_recording(
    pool: &mut Pool,
    log: &CleanupLog,
    label: &str,
    payload_size: usize,
) -> Result<CleanupHandle, PoolError> {
    let handle = pool.register_cleanup(payload_size)?;
    let log = log.clone();
    let label = label.to_string();
    pool.set_cleanup_handler(handle, move |_| log.push(label))?;
    Ok(handle)
}

/// Register an entry whose handler panics with `message`.
pub fn register_panicking(pool: &mut Pool, message: &'static str) -> Result<CleanupHandle, PoolError> {
    let handle = pool.register_cleanup(0)?;
    pool.set_cleanup_handler(handle, move |_| panic!("{message}"))?;
    Ok(handle)
}

/// A pool of `size` bytes with default tuning.
pub fn pool_of(size: usize) -> Pool {
    Pool::with_size(size).expect("test pool creation")
}

/// A pool with explicit growth and reuse tuning.
pub fn tuned_pool(size: usize, failure_budget: u32, large_reuse_scan: usize) -> Pool {
    Pool::create(PoolConfig {
        failure_budget,
        large_reuse_scan,
        ..PoolConfig::new(size)
    })
    .expect("test pool creation")
}

/// Allocate until the pool has `blocks` blocks, using requests of `size` bytes.
pub fn grow_to(pool: &mut Pool, blocks: usize, size: usize) {
    while pool.stats().block_count < blocks {
        pool.allocate(size).expect("growth allocation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_clones_share_entries() {
        let log = CleanupLog::new();
        let other = log.clone();
        other.push("x");
        assert_eq!(log.entries(), vec!["x".to_string()]);
    }

    #[test]
    fn recording_entry_logs_on_destroy() {
        let log = CleanupLog::new();
        let mut pool = pool_of(512);
        register_recording(&mut pool, &log, "only", 0).unwrap();
        assert!(log.is_empty());
        pool.destroy();
        assert_eq!(log.entries(), vec!["only".to_string()]);
    }

    #[test]
    fn grow_to_reaches_block_count() {
        let mut pool = pool_of(512);
        grow_to(&mut pool, 3, 300);
        assert_eq!(pool.stats().block_count, 3);
    }
}

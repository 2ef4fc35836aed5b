//! Workload profiles for benchmarking the regionpool allocator.
//!
//! - [`request_sizes`]: deterministic mix of small request sizes
//! - [`session_workload`]: one call-scoped session (small allocs, a few
//!   oversized ones, a cleanup entry) replayed against a pool

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use regionpool::{Pool, PoolError};

/// Deterministic small request sizes in `1..max`, from a fixed LCG seed.
pub fn request_sizes(count: usize, max: usize, seed: u64) -> Vec<usize> {
    let mut state = seed;
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            1 + (state >> 33) as usize % (max - 1)
        })
        .collect()
}

/// Replay one session: every size in `sizes` as a small allocation, one
/// oversized allocation per `large_every` requests (freed immediately when
/// `free_large` is set), and a single cleanup entry.
///
/// Returns the number of bytes handed out.
pub fn session_workload(
    pool: &mut Pool,
    sizes: &[usize],
    large_every: usize,
    free_large: bool,
) -> Result<usize, PoolError> {
    let mut total = 0;
    let cleanup = pool.register_cleanup(0)?;
    pool.set_cleanup_handler(cleanup, |_| {})?;
    for (i, &size) in sizes.iter().enumerate() {
        let handle = pool.allocate(size)?;
        total += handle.len();
        if large_every > 0 && i % large_every == 0 {
            let large = pool.allocate(pool.threshold() * 2)?;
            total += large.len();
            if free_large {
                pool.free(&large);
            }
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_sizes_are_deterministic_and_bounded() {
        let a = request_sizes(100, 64, 7);
        let b = request_sizes(100, 64, 7);
        assert_eq!(a, b);
        assert!(a.iter().all(|&s| (1..64).contains(&s)));
    }

    #[test]
    fn session_counts_all_bytes() {
        let mut pool = Pool::new().unwrap();
        let sizes = [10, 20, 30];
        let total = session_workload(&mut pool, &sizes, 0, false).unwrap();
        assert_eq!(total, 60);
    }
}

//! Property tests for allocation placement, alignment, and teardown order.

use proptest::prelude::*;
use regionpool::consts::{ALIGNMENT, MIN_POOL_SIZE, POOL_HEADER_SIZE};
use regionpool::{AllocLocation, Pool};
use regionpool_test_utils::{register_recording, CleanupLog};

#[derive(Clone, Debug)]
enum Request {
    Aligned(usize),
    Unaligned(usize),
    Zeroed(usize),
}

fn request() -> impl Strategy<Value = Request> {
    prop_oneof![
        (0usize..600).prop_map(Request::Aligned),
        (0usize..600).prop_map(Request::Unaligned),
        (0usize..600).prop_map(Request::Zeroed),
    ]
}

proptest! {
    #[test]
    fn threshold_formula_holds(size in MIN_POOL_SIZE..64 * 1024usize) {
        let pool = Pool::with_size(size).unwrap();
        prop_assert_eq!(pool.threshold(), (size - POOL_HEADER_SIZE).min(4095));
    }

    #[test]
    fn small_allocations_stay_in_one_block_without_overlap(
        size in 256usize..4096,
        requests in proptest::collection::vec(request(), 1..64),
    ) {
        let mut pool = Pool::with_size(size).unwrap();
        let threshold = pool.threshold();
        // (block, start, end) of every small allocation so far.
        let mut placed: Vec<(usize, usize, usize)> = Vec::new();

        for req in requests {
            let handle = match req {
                Request::Aligned(n) => pool.allocate(n).unwrap(),
                Request::Unaligned(n) => pool.allocate_unaligned(n).unwrap(),
                Request::Zeroed(n) => pool.allocate_zeroed(n).unwrap(),
            };
            let addr = pool.address(&handle).unwrap();
            let len = handle.len();

            if let Request::Aligned(_) | Request::Zeroed(_) = req {
                prop_assert_eq!(addr % ALIGNMENT, 0);
            }
            if let Request::Zeroed(_) = req {
                prop_assert!(pool.bytes(&handle).unwrap().iter().all(|&b| b == 0));
            }

            let blocks = pool.blocks();
            let containing: Vec<_> = blocks
                .iter()
                .filter(|b| b.data_addr_range.contains(&addr) || (len == 0 && b.data_addr_range.end == addr))
                .collect();

            match handle.location() {
                AllocLocation::Block { block_index, offset } => {
                    prop_assert!(len < threshold);
                    let info = &blocks[block_index];
                    prop_assert!(offset >= info.data_start);
                    prop_assert!(offset + len <= info.limit);
                    if len > 0 {
                        prop_assert_eq!(containing.len(), 1);
                    }
                    for &(b, start, end) in &placed {
                        if b == block_index && len > 0 && end > start {
                            prop_assert!(offset >= end || offset + len <= start);
                        }
                    }
                    placed.push((block_index, offset, offset + len));
                }
                AllocLocation::Oversized { .. } => {
                    prop_assert!(len >= threshold);
                    prop_assert!(containing.is_empty());
                }
            }
        }
    }

    #[test]
    fn cleanups_run_in_reverse_registration_order(count in 1usize..20) {
        let log = CleanupLog::new();
        let mut pool = Pool::with_size(1024).unwrap();
        for i in 0..count {
            register_recording(&mut pool, &log, &i.to_string(), i % 3 * 8).unwrap();
        }
        let report = pool.destroy();
        let expected: Vec<String> = (0..count).rev().map(|i| i.to_string()).collect();
        prop_assert_eq!(log.entries(), expected);
        prop_assert_eq!(report.handlers_run, count);
    }

    #[test]
    fn reset_restores_first_address(
        sizes in proptest::collection::vec(1usize..400, 1..40),
    ) {
        let mut pool = Pool::with_size(512).unwrap();
        let first = pool.allocate(sizes[0]).unwrap();
        let first_addr = pool.address(&first).unwrap();
        for &n in &sizes[1..] {
            pool.allocate(n).unwrap();
        }
        pool.reset();
        let again = pool.allocate(sizes[0]).unwrap();
        prop_assert_eq!(pool.address(&again).unwrap(), first_addr);
    }
}

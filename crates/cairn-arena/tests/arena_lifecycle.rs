//! Integration test: arena block chaining, in-place growth and reset replay.
//!
//! Exercises the arena through the `Allocator` contract the way a consumer
//! would: containers on top of it, phases separated by `reset`, and the
//! shared compliance suite.

use cairn_arena::{Arena, ArenaConfig, OversizePolicy, HEADER};
use cairn_collections::GrowVec;
use cairn_core::{AllocError, Allocator, BulkFree, Handle};
use cairn_test_utils::compliance::run_allocator_compliance;
use cairn_test_utils::CountingAllocator;
use proptest::prelude::*;

// ── The 64-byte block walkthrough ───────────────────────────────────

#[test]
fn small_block_overflow_and_reset_replay() {
    let mut arena = Arena::with_block_size(64).unwrap();

    let first: Vec<Handle> = (0..3).map(|_| arena.alloc(1, 4).unwrap()).collect();
    for &h in &first {
        assert_eq!(arena.block_of(h).unwrap(), 0);
    }
    assert_eq!(arena.used_bytes(), 48);

    let big = arena.alloc(1, 40).unwrap();
    assert_eq!(arena.block_count(), 2);
    assert_eq!(arena.block_of(big).unwrap(), 1);

    arena.reset();
    let second: Vec<Handle> = (0..3).map(|_| arena.alloc(1, 4).unwrap()).collect();
    assert_eq!(first, second);
    for &h in &second {
        assert_eq!(arena.block_of(h).unwrap(), 0);
    }
    assert_eq!(arena.block_count(), 2);
}

#[test]
fn reset_reuses_chained_blocks_without_growing() {
    let mut arena = Arena::with_block_size(64).unwrap();
    for _ in 0..10 {
        arena.alloc(1, 24).unwrap();
    }
    let blocks = arena.block_count();
    let capacity = arena.capacity_bytes();
    for _ in 0..5 {
        arena.reset();
        for _ in 0..10 {
            arena.alloc(1, 24).unwrap();
        }
    }
    assert_eq!(arena.block_count(), blocks);
    assert_eq!(arena.capacity_bytes(), capacity);
}

#[test]
fn oversize_policies() {
    let mut rejecting = Arena::with_block_size(64).unwrap();
    assert!(matches!(
        rejecting.alloc(1, 100),
        Err(AllocError::CapacityExceeded { .. })
    ));

    let config = ArenaConfig::new(64).with_oversize(OversizePolicy::DedicatedBlock);
    let mut dedicated = Arena::new(config).unwrap();
    let h = dedicated.alloc(1, 100).unwrap();
    assert_eq!(dedicated.block_of(h).unwrap(), 1);
    assert_eq!(dedicated.capacity_bytes(), 64 + 112);
}

// ── Containers on top of the arena ──────────────────────────────────

#[test]
fn growvec_grows_in_place_on_a_fresh_arena() {
    let arena = Arena::new(ArenaConfig::default()).unwrap();
    let mut counting = CountingAllocator::new(arena);
    {
        let mut vec = GrowVec::new(&mut counting);
        vec.push(0u32).unwrap();
        let first = vec.storage();
        for i in 1..200 {
            vec.push(i).unwrap();
        }
        assert_eq!(vec.get(199).unwrap(), Some(199));
        assert_eq!(vec.storage(), first);
    }
    assert_eq!(counting.allocs(), 1);
    assert!(counting.reallocs() >= 5);
    assert_eq!(counting.inner.block_count(), 1);
}

#[test]
fn free_all_then_use_reports_released() {
    let mut arena = Arena::with_block_size(128).unwrap();
    let h = arena.alloc(2, 8).unwrap();
    arena.free_all();
    assert_eq!(arena.free(h), Err(AllocError::Released));
    assert_eq!(arena.payload_len(h), Err(AllocError::Released));
    assert_eq!(arena.used_bytes(), 0);
}

#[test]
fn arena_is_compliant() {
    run_allocator_compliance(&mut Arena::new(ArenaConfig::default()).unwrap());
}

#[test]
fn arena_is_usable_as_trait_object() {
    let mut arena = Arena::with_block_size(256).unwrap();
    let dynamic: &mut dyn Allocator = &mut arena;
    let h = dynamic.alloc(4, 4).unwrap();
    dynamic.write(h, 0, &[1; 16]).unwrap();
    assert_eq!(arena.bytes(h).unwrap(), &[1; 16]);
}

// ── Exact block-end boundaries ──────────────────────────────────────

#[test]
fn zero_size_node_filling_block_end_stays_valid() {
    let mut arena = Arena::with_block_size(64).unwrap();
    arena.alloc(1, 48).unwrap();
    let h = arena.alloc(0, 1).unwrap();
    assert_eq!(arena.block_of(h).unwrap(), 0);
    assert_eq!(arena.used_bytes(), 64);
    assert_eq!(arena.payload_len(h).unwrap(), 0);
    arena.read(h, 0, &mut []).unwrap();
    arena.write(h, 0, &[]).unwrap();
    assert_eq!(arena.realloc(h, 0).unwrap(), h);
    arena.free(h).unwrap();

    // Growing past the block end moves the node into a new block.
    let grown = arena.realloc(h, 8).unwrap();
    assert_eq!(arena.block_of(grown).unwrap(), 1);
    assert_eq!(arena.payload_len(grown).unwrap(), 8);
}

#[test]
fn block_end_handle_is_not_confused_with_next_block() {
    // Page-sized blocks sit back to back, so a zero-size payload at the end
    // of one block has the address of the next block's first byte.
    let mut arena = Arena::with_block_size(4096).unwrap();
    arena.alloc(4080, 1).unwrap();
    let end = arena.alloc(0, 1).unwrap();
    let next = arena.alloc(1, 8).unwrap();
    assert_eq!(arena.block_count(), 2);
    assert_eq!(arena.block_of(end).unwrap(), 0);
    assert_eq!(arena.block_of(next).unwrap(), 1);
    assert_eq!(arena.payload_len(end).unwrap(), 0);
    assert_eq!(arena.payload_len(next).unwrap(), 8);
    arena.free(end).unwrap();
}

// ── Properties ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn bump_addresses_increase_without_overlap(sizes in prop::collection::vec(0usize..48, 1..40)) {
        let mut arena = Arena::with_block_size(64).unwrap();
        let mut issued: Vec<(Handle, usize)> = Vec::new();
        let mut prev: Option<(usize, u64, usize)> = None;
        for size in sizes {
            let h = arena.alloc(size, 1).unwrap();
            let block = arena.block_of(h).unwrap();
            prop_assert_eq!(h.addr() % 8, 0);
            prop_assert_eq!(arena.payload_len(h).unwrap(), size);
            if let Some((prev_block, addr, len)) = prev {
                prop_assert!(block >= prev_block);
                if block == prev_block {
                    prop_assert!(h.addr() >= addr + len as u64 + HEADER as u64);
                }
            }
            prev = Some((block, h.addr(), size));
            issued.push((h, size));
        }
        for (h, size) in issued {
            prop_assert_eq!(arena.payload_len(h).unwrap(), size);
        }
    }

    #[test]
    fn replay_after_reset_is_identical(sizes in prop::collection::vec(1usize..200, 1..60)) {
        let mut arena = Arena::with_block_size(256).unwrap();
        let first: Vec<Handle> = sizes.iter().map(|&s| arena.alloc(s, 1).unwrap()).collect();
        arena.reset();
        let second: Vec<Handle> = sizes.iter().map(|&s| arena.alloc(s, 1).unwrap()).collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn latest_growth_within_block_keeps_handle(start in 1usize..64, grow in 0usize..64) {
        let mut arena = Arena::with_block_size(1024).unwrap();
        let h = arena.alloc(start, 1).unwrap();
        let data: Vec<u8> = (0..start as u8).collect();
        arena.write(h, 0, &data).unwrap();
        let same = arena.realloc(h, start + grow).unwrap();
        prop_assert_eq!(same, h);
        prop_assert_eq!(&arena.bytes(h).unwrap()[..start], &data[..]);
    }
}

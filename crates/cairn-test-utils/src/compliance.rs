//! Allocator contract compliance helpers.
//!
//! These functions verify that an allocator satisfies the invariants of the
//! [`Allocator`] contract. Reused by the arena, array-tracked, map-indexed
//! and locked allocator test suites.

use cairn_core::{AllocError, Allocator, Handle};

/// Assert that fresh allocations are zero-filled and report their size.
pub fn assert_alloc_zeroed(alloc: &mut dyn Allocator) {
    for (count, elem) in [(1, 1), (3, 4), (16, 8), (5, 7)] {
        let h = alloc.alloc(count, elem).expect("alloc");
        let len = alloc.payload_len(h).expect("payload_len");
        assert_eq!(len, count * elem, "payload_len({h}) = {len}, expected {}", count * elem);
        let mut buf = vec![0xFFu8; len];
        alloc.read(h, 0, &mut buf).expect("read");
        assert!(buf.iter().all(|&b| b == 0), "alloc({count}, {elem}) not zeroed: {buf:?}");
    }
}

/// Assert that live handles never alias and their payloads do not overlap.
pub fn assert_handles_distinct(alloc: &mut dyn Allocator) {
    let handles: Vec<Handle> = (0..32u8)
        .map(|i| {
            let h = alloc.alloc(1, 8).expect("alloc");
            alloc.write(h, 0, &[i; 8]).expect("write");
            h
        })
        .collect();
    for (i, &a) in handles.iter().enumerate() {
        for &b in &handles[i + 1..] {
            assert_ne!(a, b, "handle {a} issued twice");
        }
    }
    for (i, &h) in handles.iter().enumerate() {
        let mut buf = [0u8; 8];
        alloc.read(h, 0, &mut buf).expect("read");
        assert_eq!(buf, [i as u8; 8], "payload of {h} was overwritten");
    }
}

/// Assert that growing and shrinking with `realloc` keeps the common
/// prefix and that growth exposes zeroed bytes.
pub fn assert_realloc_preserves_prefix(alloc: &mut dyn Allocator) {
    let h = alloc.alloc(4, 1).expect("alloc");
    alloc.write(h, 0, &[1, 2, 3, 4]).expect("write");
    // An intervening allocation forces a move on strategies that only grow
    // their most recent allocation in place.
    let other = alloc.alloc(1, 1).expect("alloc");

    let grown = alloc.realloc(h, 64).expect("grow");
    assert_eq!(alloc.payload_len(grown).expect("payload_len"), 64);
    let mut buf = [0u8; 64];
    alloc.read(grown, 0, &mut buf).expect("read");
    assert_eq!(&buf[..4], &[1, 2, 3, 4], "prefix lost on grow");
    assert!(buf[4..].iter().all(|&b| b == 0), "grown tail not zeroed");

    let shrunk = alloc.realloc(grown, 2).expect("shrink");
    assert_eq!(alloc.payload_len(shrunk).expect("payload_len"), 2);
    let mut buf = [0u8; 2];
    alloc.read(shrunk, 0, &mut buf).expect("read");
    assert_eq!(buf, [1, 2], "prefix lost on shrink");

    let mut probe = [0u8; 1];
    alloc.read(other, 0, &mut probe).expect("unrelated handle still live");
}

/// Assert that reads and writes past the payload are rejected.
pub fn assert_bounds_checked(alloc: &mut dyn Allocator) {
    let h = alloc.alloc(2, 4).expect("alloc");
    let err = alloc.write(h, 6, &[0; 4]).unwrap_err();
    assert!(matches!(err, AllocError::OutOfBounds { size: 8, .. }), "got {err:?}");
    let mut buf = [0u8; 9];
    let err = alloc.read(h, 0, &mut buf).unwrap_err();
    assert!(matches!(err, AllocError::OutOfBounds { .. }), "got {err:?}");
    alloc.write(h, 4, &[9; 4]).expect("in-bounds write");
}

/// Assert that a size product overflow is reported instead of wrapping.
pub fn assert_size_overflow_rejected(alloc: &mut dyn Allocator) {
    let err = alloc.alloc(usize::MAX, 2).unwrap_err();
    assert_eq!(
        err,
        AllocError::SizeOverflow {
            count: usize::MAX,
            elem_size: 2
        }
    );
}

/// Run every compliance check against one allocator instance.
pub fn run_allocator_compliance(alloc: &mut dyn Allocator) {
    assert_alloc_zeroed(alloc);
    assert_handles_distinct(alloc);
    assert_realloc_preserves_prefix(alloc);
    assert_bounds_checked(alloc);
    assert_size_overflow_rejected(alloc);
}

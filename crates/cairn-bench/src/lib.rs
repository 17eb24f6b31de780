//! Benchmark workloads for the Cairn allocators.
//!
//! Provides deterministic request streams and a uniform way to build each
//! strategy so the criterion benches compare like with like:
//!
//! - [`Strategy`]: every allocator under test, buildable as a trait object
//! - [`request_sizes`]: seeded allocation sizes in a bounded range
//! - [`churn`]: an alloc/free workload that keeps a bounded live set

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use cairn_arena::{Arena, ArenaConfig, OversizePolicy};
use cairn_core::{AllocError, Allocator, Handle, SystemAllocator};
use cairn_tracked::{ArrayAllocator, MapAllocator};

/// Block size used for arena workloads. Larger requests get a dedicated
/// block.
pub const BENCH_BLOCK_SIZE: usize = 64 * 1024;

/// The allocation strategies the benches compare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Plain heap allocator.
    System,
    /// Block-chained bump arena.
    Arena,
    /// Heap allocator with a positional ledger.
    Array,
    /// Heap allocator with a hash index of live addresses.
    Map,
}

impl Strategy {
    /// Every strategy, in report order.
    pub const ALL: [Strategy; 4] = [Strategy::System, Strategy::Arena, Strategy::Array, Strategy::Map];

    /// Short name used as the criterion parameter label.
    pub fn name(self) -> &'static str {
        match self {
            Strategy::System => "system",
            Strategy::Arena => "arena",
            Strategy::Array => "array",
            Strategy::Map => "map",
        }
    }

    /// Build a fresh allocator of this kind.
    pub fn build(self) -> Result<Box<dyn Allocator>, AllocError> {
        Ok(match self {
            Strategy::System => Box::new(SystemAllocator::new()),
            Strategy::Arena => Box::new(Arena::new(
                ArenaConfig::new(BENCH_BLOCK_SIZE).with_oversize(OversizePolicy::DedicatedBlock),
            )?),
            Strategy::Array => Box::new(ArrayAllocator::new()),
            Strategy::Map => Box::new(MapAllocator::new()),
        })
    }
}

/// Generate `n` allocation sizes in `1..=max`, deterministic in `seed`.
pub fn request_sizes(n: usize, max: usize, seed: u64) -> Vec<usize> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            // LCG step, high bits only
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as usize % max.max(1)) + 1
        })
        .collect()
}

/// Allocate every size in `sizes`, freeing the oldest allocation whenever
/// more than `window` are live. Returns the number of frees issued.
///
/// Bulk-only strategies treat the frees as no-ops, so the same workload
/// measures both reclamation models.
pub fn churn(alloc: &mut dyn Allocator, sizes: &[usize], window: usize) -> Result<usize, AllocError> {
    let mut live: std::collections::VecDeque<Handle> = std::collections::VecDeque::with_capacity(window + 1);
    let mut frees = 0;
    for &size in sizes {
        live.push_back(alloc.alloc(size, 1)?);
        if live.len() > window {
            if let Some(oldest) = live.pop_front() {
                alloc.free(oldest)?;
                frees += 1;
            }
        }
    }
    for handle in live {
        alloc.free(handle)?;
        frees += 1;
    }
    Ok(frees)
}

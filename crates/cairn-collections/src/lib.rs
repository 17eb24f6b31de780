//! Allocator-generic containers for Cairn.
//!
//! Every container here owns (or borrows) an [`Allocator`](cairn_core::Allocator)
//! and keeps its elements inside that allocator's payloads through the
//! [`Element`](cairn_core::Element) codec:
//!
//! - [`GrowVec`]: contiguous array with doubling growth.
//! - [`HashMap`]: open-addressing set with linear probing and tombstones.
//! - [`RingQueue`]: circular FIFO buffer.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod hash_map;
pub mod queue;
mod slots;
pub mod vec;

pub use hash_map::{Bucket, HashMap, Probe, Slot, DEFAULT_LOAD_FACTOR};
pub use queue::RingQueue;
pub use vec::GrowVec;

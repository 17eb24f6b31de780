//! System-backed allocators that remember every live allocation.
//!
//! Both strategies give per-allocation `free` and `realloc` like a plain
//! heap, and both can release everything still live in one
//! [`free_all`](cairn_core::BulkFree::free_all) pass:
//!
//! - [`ArrayAllocator`] keeps a positional ledger and stores each
//!   allocation's ledger index in a header in front of the payload.
//! - [`MapAllocator`] keeps the live addresses in an open-addressing
//!   [`HashMap`](cairn_collections::HashMap) and needs no header.
//!
//! A second `free` of the same handle is detected and reported as
//! [`AllocError::DoubleFree`](cairn_core::AllocError::DoubleFree).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod array;
pub mod map;

pub use array::ArrayAllocator;
pub use map::MapAllocator;

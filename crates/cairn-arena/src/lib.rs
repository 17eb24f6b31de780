//! Bump-pointer arena allocation for Cairn.
//!
//! An [`Arena`] serves requests from a chain of fixed-capacity blocks,
//! spilling into a new block when the current one is full. Memory is
//! reclaimed in bulk: [`Arena::reset`] rewinds every block for reuse and
//! [`free_all`](cairn_core::BulkFree::free_all) releases them.
//!
//! # Architecture
//!
//! ```text
//! Arena
//! ├── ArenaConfig (block size, oversize policy)
//! └── BlockChain → Block[] (zeroed Box<[u8]>, virtual base address)
//!     └── node: [NodeHeader { next, size } | payload | padding]
//! ```
//!
//! Handles are virtual addresses: `block.base + node + HEADER`. The owning
//! block is recovered by binary search over the block bases.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod arena;
pub mod block;
pub mod config;

pub use arena::Arena;
pub use block::{Block, BlockChain, NodeHeader, HEADER};
pub use config::{ArenaConfig, OversizePolicy};

//! Test utilities for Cairn development.
//!
//! - [`compliance`]: assertions every [`Allocator`](cairn_core::Allocator)
//!   implementation must pass, shared by each strategy's test suite.
//! - [`fixtures`]: allocator test doubles ([`CountingAllocator`],
//!   [`FailingAllocator`]) for exercising container error paths.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod compliance;
pub mod fixtures;

pub use fixtures::{CountingAllocator, FailingAllocator};

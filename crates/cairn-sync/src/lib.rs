//! Thread-safe façades over Cairn allocators.
//!
//! The base allocators are single-threaded. [`Locked`] wraps any of them in
//! a `parking_lot::Mutex` so every operation runs under one lock, totally
//! ordered by lock acquisition. [`AllocatorPool`] hands out up to `N`
//! independent allocators for per-worker use.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod locked;
pub mod pool;

pub use locked::{Locked, LockedArena, LockedArrayAllocator, LockedMapAllocator};
pub use pool::AllocatorPool;

//! Core types and traits for the Cairn allocator family.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! abstractions every other Cairn crate builds on: allocation handles, the
//! shared error type, the [`Allocator`] capability trait, the element codec
//! containers use to store values in allocator payloads, map hashing, and
//! the explicit default [`SystemAllocator`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod element;
pub mod error;
pub mod handle;
pub mod hash;
pub mod layout;
pub mod system;
pub mod traits;

pub use element::Element;
pub use error::AllocError;
pub use handle::Handle;
pub use hash::MapHash;
pub use system::SystemAllocator;
pub use traits::{Allocator, BulkFree};

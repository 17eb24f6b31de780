//! Cairn: interchangeable allocation strategies behind one trait.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Cairn sub-crates. For most users, adding `cairn` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use cairn::prelude::*;
//!
//! // A small arena: every block holds 256 bytes of nodes.
//! let mut arena = Arena::new(ArenaConfig::new(256)).unwrap();
//!
//! {
//!     // Containers borrow the allocator they grow in.
//!     let mut squares: GrowVec<u32, _> = GrowVec::new(&mut arena);
//!     for i in 0..10 {
//!         squares.push(i * i).unwrap();
//!     }
//!     assert_eq!(squares.get(9).unwrap(), Some(81));
//! }
//!
//! // The arena keeps every byte until it is reset.
//! assert!(arena.used_bytes() > 0);
//! arena.reset();
//! assert_eq!(arena.used_bytes(), 0);
//!
//! // A tracked allocator can release everything it still owns at once.
//! let mut tracked = MapAllocator::new();
//! let mut ids: HashMap<u64, _> = HashMap::new(&mut tracked);
//! ids.insert(7).unwrap();
//! assert!(ids.contains(&7).unwrap());
//! drop(ids);
//! tracked.free_all();
//! assert_eq!(tracked.live_count(), 0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `cairn-core` | Handles, errors, the `Allocator` trait, element codec, system allocator |
//! | [`collections`] | `cairn-collections` | `GrowVec`, open-addressing `HashMap`, `RingQueue` |
//! | [`arena`] | `cairn-arena` | Block-chained bump arena and its configuration |
//! | [`tracked`] | `cairn-tracked` | Heap allocators that remember every live allocation |
//! | [`sync`] | `cairn-sync` | Mutex wrappers and allocator pools |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Handles, errors, and the allocator contract (`cairn-core`).
///
/// Contains [`types::Handle`], [`types::AllocError`], the
/// [`types::Allocator`] and [`types::BulkFree`] traits, and the explicit
/// [`types::SystemAllocator`] default.
pub use cairn_core as types;

/// Allocator-generic containers (`cairn-collections`).
///
/// [`collections::GrowVec`], [`collections::HashMap`] and
/// [`collections::RingQueue`] store their elements in whatever allocator
/// they are given.
pub use cairn_collections as collections;

/// Block-chained bump arena (`cairn-arena`).
///
/// [`arena::Arena`] carves nodes out of fixed-size blocks and reclaims
/// them only through `reset` or `free_all`.
pub use cairn_arena as arena;

/// Tracked heap allocators (`cairn-tracked`).
///
/// [`tracked::ArrayAllocator`] keeps a positional ledger and
/// [`tracked::MapAllocator`] a hash index of live addresses; both detect
/// double frees and support `free_all`.
pub use cairn_tracked as tracked;

/// Thread-safe wrappers (`cairn-sync`).
///
/// [`sync::Locked`] serializes any allocator behind a mutex and
/// [`sync::AllocatorPool`] hands out independent allocators.
pub use cairn_sync as sync;

/// Common imports for typical Cairn usage.
///
/// ```rust
/// use cairn::prelude::*;
/// ```
///
/// This imports the allocator traits, every allocation strategy, and the
/// three containers.
pub mod prelude {
    // Contract
    pub use cairn_core::{AllocError, Allocator, BulkFree, Element, Handle, MapHash};

    // Strategies
    pub use cairn_arena::{Arena, ArenaConfig, OversizePolicy};
    pub use cairn_core::SystemAllocator;
    pub use cairn_tracked::{ArrayAllocator, MapAllocator};

    // Containers
    pub use cairn_collections::{GrowVec, HashMap, RingQueue};

    // Threading
    pub use cairn_sync::{AllocatorPool, Locked, LockedArena, LockedArrayAllocator, LockedMapAllocator};
}

//! Allocation handles.
//!
//! A [`Handle`] is the opaque address an allocator hands out for a live
//! allocation. It is a plain integer in the issuing allocator's own address
//! space, never a raw pointer, so resolving it always goes through the
//! allocator's bookkeeping and safe slice indexing.

use std::fmt;
use std::num::NonZeroU64;

/// Opaque address of a live allocation.
///
/// Handles are never null: `Option<Handle>` is the same size as `Handle`.
/// A handle is valid until it is freed or superseded by `realloc`; after
/// that the issuing allocator rejects it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(NonZeroU64);

impl Handle {
    /// Create a handle from a raw address. Returns `None` for address zero.
    pub fn new(addr: u64) -> Option<Self> {
        NonZeroU64::new(addr).map(Self)
    }

    /// The raw address.
    pub fn addr(self) -> u64 {
        self.0.get()
    }

    /// The handle `bytes` past this one.
    ///
    /// Returns `None` on address-space overflow.
    pub fn offset(self, bytes: u64) -> Option<Self> {
        self.0.checked_add(bytes).map(Self)
    }

    /// The handle `bytes` before this one.
    ///
    /// Returns `None` if the result would be zero or underflow. This is how
    /// header-before-payload layouts recover the header address.
    pub fn checked_sub(self, bytes: u64) -> Option<Self> {
        self.0.get().checked_sub(bytes).and_then(Self::new)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

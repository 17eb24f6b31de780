//! Error types shared by every allocator and container.

use thiserror::Error;

use crate::handle::Handle;

/// Errors that can occur during allocator and container operations.
///
/// The conditions the allocators treat as fatal (capacity overflow, double
/// free, system allocation failure) are reported through this type at the
/// call site that detected them. They are checked before any state is
/// mutated, so an `Err` never leaves the allocator half-updated.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AllocError {
    /// A single request does not fit the fixed capacity it must live in
    /// (one arena block, one allocator pool).
    #[error("capacity exceeded: requested {requested} bytes, capacity {capacity} bytes")]
    CapacityExceeded {
        /// Number of bytes requested, including any header.
        requested: usize,
        /// Capacity that could not hold the request.
        capacity: usize,
    },
    /// The handle was already freed or superseded by `realloc`.
    #[error("double free of {handle}")]
    DoubleFree {
        /// The stale handle.
        handle: Handle,
    },
    /// The handle was never issued by this allocator.
    #[error("invalid handle {handle}")]
    InvalidHandle {
        /// The unrecognised handle.
        handle: Handle,
    },
    /// The system allocator could not provide the memory.
    #[error("out of memory: requested {requested} bytes")]
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
    },
    /// `count * elem_size` overflowed `usize`.
    #[error("allocation size overflow: {count} x {elem_size} bytes")]
    SizeOverflow {
        /// Element count.
        count: usize,
        /// Size of one element in bytes.
        elem_size: usize,
    },
    /// A read or write reached past the end of a payload.
    #[error("access out of bounds on {handle}: offset {offset} + len {len} > size {size}")]
    OutOfBounds {
        /// The handle being accessed.
        handle: Handle,
        /// Byte offset into the payload.
        offset: usize,
        /// Number of bytes accessed.
        len: usize,
        /// Payload size.
        size: usize,
    },
    /// The allocator released all of its memory and cannot serve requests.
    #[error("allocator has been released")]
    Released,
    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong.
        reason: &'static str,
    },
}

/// `count * elem_size`, or [`AllocError::SizeOverflow`].
pub fn checked_size(count: usize, elem_size: usize) -> Result<usize, AllocError> {
    count
        .checked_mul(elem_size)
        .ok_or(AllocError::SizeOverflow { count, elem_size })
}

/// Check that `offset..offset + len` lies within a payload of `size` bytes.
pub fn check_bounds(
    handle: Handle,
    offset: usize,
    len: usize,
    size: usize,
) -> Result<std::ops::Range<usize>, AllocError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(offset..end),
        _ => Err(AllocError::OutOfBounds {
            handle,
            offset,
            len,
            size,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_size_reports_overflow() {
        assert_eq!(checked_size(4, 8), Ok(32));
        assert_eq!(
            checked_size(usize::MAX, 2),
            Err(AllocError::SizeOverflow {
                count: usize::MAX,
                elem_size: 2
            })
        );
    }

    #[test]
    fn bounds_accept_exact_fit() {
        let h = Handle::new(8).unwrap();
        assert_eq!(check_bounds(h, 4, 4, 8), Ok(4..8));
        assert!(check_bounds(h, 5, 4, 8).is_err());
        assert!(check_bounds(h, usize::MAX, 1, 8).is_err());
    }

    #[test]
    fn display_names_the_handle() {
        let h = Handle::new(0x40).unwrap();
        let msg = AllocError::DoubleFree { handle: h }.to_string();
        assert_eq!(msg, "double free of 0x40");
    }
}

//! The allocator capability contract.
//!
//! Every allocation strategy implements [`Allocator`]; every container is
//! generic over it, so any strategy can back any container. The trait is
//! object safe: `&mut dyn Allocator` works wherever a concrete allocator
//! does.

use crate::error::AllocError;
use crate::handle::Handle;

/// The capability every allocation strategy provides.
///
/// Handles are opaque addresses. Payload bytes are reached through
/// [`read`](Allocator::read) and [`write`](Allocator::write) rather than by
/// dereferencing the handle, so an allocator can validate every access.
pub trait Allocator {
    /// Allocate `count * elem_size` zeroed bytes.
    ///
    /// The product is checked; overflow reports
    /// [`AllocError::SizeOverflow`].
    fn alloc(&mut self, count: usize, elem_size: usize) -> Result<Handle, AllocError>;

    /// Release one allocation.
    ///
    /// Strategies that only release in bulk treat this as a no-op.
    fn free(&mut self, handle: Handle) -> Result<(), AllocError>;

    /// Resize an allocation to `new_size` bytes, preserving the common
    /// prefix of its contents.
    ///
    /// May return the same handle (in-place) or a new one. After a move the
    /// old handle must not be used again.
    fn realloc(&mut self, handle: Handle, new_size: usize) -> Result<Handle, AllocError>;

    /// Size of the payload behind `handle` in bytes.
    fn payload_len(&self, handle: Handle) -> Result<usize, AllocError>;

    /// Copy `dst.len()` payload bytes starting at `offset` into `dst`.
    fn read(&self, handle: Handle, offset: usize, dst: &mut [u8]) -> Result<(), AllocError>;

    /// Copy `src` into the payload starting at `offset`.
    fn write(&mut self, handle: Handle, offset: usize, src: &[u8]) -> Result<(), AllocError>;
}

/// Release everything an allocator owns in one pass.
pub trait BulkFree {
    /// Free every live allocation and the allocator's own bookkeeping.
    fn free_all(&mut self);
}

impl<A: Allocator + ?Sized> Allocator for &mut A {
    fn alloc(&mut self, count: usize, elem_size: usize) -> Result<Handle, AllocError> {
        (**self).alloc(count, elem_size)
    }

    fn free(&mut self, handle: Handle) -> Result<(), AllocError> {
        (**self).free(handle)
    }

    fn realloc(&mut self, handle: Handle, new_size: usize) -> Result<Handle, AllocError> {
        (**self).realloc(handle, new_size)
    }

    fn payload_len(&self, handle: Handle) -> Result<usize, AllocError> {
        (**self).payload_len(handle)
    }

    fn read(&self, handle: Handle, offset: usize, dst: &mut [u8]) -> Result<(), AllocError> {
        (**self).read(handle, offset, dst)
    }

    fn write(&mut self, handle: Handle, offset: usize, src: &[u8]) -> Result<(), AllocError> {
        (**self).write(handle, offset, src)
    }
}

impl<A: Allocator + ?Sized> Allocator for Box<A> {
    fn alloc(&mut self, count: usize, elem_size: usize) -> Result<Handle, AllocError> {
        (**self).alloc(count, elem_size)
    }

    fn free(&mut self, handle: Handle) -> Result<(), AllocError> {
        (**self).free(handle)
    }

    fn realloc(&mut self, handle: Handle, new_size: usize) -> Result<Handle, AllocError> {
        (**self).realloc(handle, new_size)
    }

    fn payload_len(&self, handle: Handle) -> Result<usize, AllocError> {
        (**self).payload_len(handle)
    }

    fn read(&self, handle: Handle, offset: usize, dst: &mut [u8]) -> Result<(), AllocError> {
        (**self).read(handle, offset, dst)
    }

    fn write(&mut self, handle: Handle, offset: usize, src: &[u8]) -> Result<(), AllocError> {
        (**self).write(handle, offset, src)
    }
}

impl<A: BulkFree + ?Sized> BulkFree for &mut A {
    fn free_all(&mut self) {
        (**self).free_all()
    }
}

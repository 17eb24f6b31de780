//! Mutex-guarded allocator wrapper.
//!
//! [`Locked`] owns one allocator behind one `parking_lot::Mutex`. Each
//! operation locks, delegates to the inner allocator and unlocks before
//! returning, so operations from different threads are totally ordered by
//! lock acquisition. The lock is not reentrant: calling back into the same
//! `Locked` from inside [`Locked::with`] deadlocks.
//!
//! `&Locked<A>` implements [`Allocator`], so many containers on many
//! threads can share one wrapped allocator by reference.

use cairn_arena::{Arena, ArenaConfig};
use cairn_core::{AllocError, Allocator, BulkFree, Handle};
use cairn_tracked::{ArrayAllocator, MapAllocator};
use parking_lot::{Mutex, MutexGuard};

/// A thread-safe arena.
pub type LockedArena = Locked<Arena>;
/// A thread-safe array-tracked allocator.
pub type LockedArrayAllocator = Locked<ArrayAllocator>;
/// A thread-safe map-indexed allocator.
pub type LockedMapAllocator = Locked<MapAllocator>;

/// An allocator whose every operation runs under one mutex.
pub struct Locked<A> {
    inner: Mutex<A>,
}

impl<A> Locked<A> {
    /// Wrap `inner`.
    pub fn new(inner: A) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Unwrap the inner allocator.
    pub fn into_inner(self) -> A {
        self.inner.into_inner()
    }

    /// Lock for exclusive access. Holding the guard blocks every other
    /// operation on this wrapper.
    pub fn lock(&self) -> MutexGuard<'_, A> {
        self.inner.lock()
    }

    /// Lock without blocking.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, A>> {
        self.inner.try_lock()
    }

    /// Run a compound operation under a single lock acquisition.
    pub fn with<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Direct access when the wrapper is exclusively borrowed.
    pub fn get_mut(&mut self) -> &mut A {
        self.inner.get_mut()
    }
}

impl<A: Allocator> Locked<A> {
    /// Locked [`Allocator::alloc`].
    pub fn alloc(&self, count: usize, elem_size: usize) -> Result<Handle, AllocError> {
        self.inner.lock().alloc(count, elem_size)
    }

    /// Locked [`Allocator::free`].
    pub fn free(&self, handle: Handle) -> Result<(), AllocError> {
        self.inner.lock().free(handle)
    }

    /// Locked [`Allocator::realloc`].
    pub fn realloc(&self, handle: Handle, new_size: usize) -> Result<Handle, AllocError> {
        self.inner.lock().realloc(handle, new_size)
    }

    /// Locked [`Allocator::payload_len`].
    pub fn payload_len(&self, handle: Handle) -> Result<usize, AllocError> {
        self.inner.lock().payload_len(handle)
    }

    /// Locked [`Allocator::read`].
    pub fn read(&self, handle: Handle, offset: usize, dst: &mut [u8]) -> Result<(), AllocError> {
        self.inner.lock().read(handle, offset, dst)
    }

    /// Locked [`Allocator::write`].
    pub fn write(&self, handle: Handle, offset: usize, src: &[u8]) -> Result<(), AllocError> {
        self.inner.lock().write(handle, offset, src)
    }
}

impl<A: BulkFree> Locked<A> {
    /// Locked [`BulkFree::free_all`].
    pub fn free_all(&self) {
        self.inner.lock().free_all();
    }
}

impl Locked<Arena> {
    /// Create a locked arena from `config`.
    pub fn arena(config: ArenaConfig) -> Result<Self, AllocError> {
        Arena::new(config).map(Self::new)
    }

    /// Locked [`Arena::reset`].
    pub fn reset(&self) {
        self.inner.lock().reset();
    }
}

impl<A: Default> Default for Locked<A> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A> From<A> for Locked<A> {
    fn from(inner: A) -> Self {
        Self::new(inner)
    }
}

impl<A: Allocator> Allocator for &Locked<A> {
    fn alloc(&mut self, count: usize, elem_size: usize) -> Result<Handle, AllocError> {
        Locked::alloc(self, count, elem_size)
    }

    fn free(&mut self, handle: Handle) -> Result<(), AllocError> {
        Locked::free(self, handle)
    }

    fn realloc(&mut self, handle: Handle, new_size: usize) -> Result<Handle, AllocError> {
        Locked::realloc(self, handle, new_size)
    }

    fn payload_len(&self, handle: Handle) -> Result<usize, AllocError> {
        Locked::payload_len(self, handle)
    }

    fn read(&self, handle: Handle, offset: usize, dst: &mut [u8]) -> Result<(), AllocError> {
        Locked::read(self, handle, offset, dst)
    }

    fn write(&mut self, handle: Handle, offset: usize, src: &[u8]) -> Result<(), AllocError> {
        Locked::write(self, handle, offset, src)
    }
}

impl<A: Allocator> Allocator for Locked<A> {
    fn alloc(&mut self, count: usize, elem_size: usize) -> Result<Handle, AllocError> {
        self.get_mut().alloc(count, elem_size)
    }

    fn free(&mut self, handle: Handle) -> Result<(), AllocError> {
        self.get_mut().free(handle)
    }

    fn realloc(&mut self, handle: Handle, new_size: usize) -> Result<Handle, AllocError> {
        self.get_mut().realloc(handle, new_size)
    }

    fn payload_len(&self, handle: Handle) -> Result<usize, AllocError> {
        Locked::payload_len(self, handle)
    }

    fn read(&self, handle: Handle, offset: usize, dst: &mut [u8]) -> Result<(), AllocError> {
        Locked::read(self, handle, offset, dst)
    }

    fn write(&mut self, handle: Handle, offset: usize, src: &[u8]) -> Result<(), AllocError> {
        self.get_mut().write(handle, offset, src)
    }
}

impl<A: BulkFree> BulkFree for &Locked<A> {
    fn free_all(&mut self) {
        Locked::free_all(self);
    }
}

impl<A: BulkFree> BulkFree for Locked<A> {
    fn free_all(&mut self) {
        self.get_mut().free_all();
    }
}

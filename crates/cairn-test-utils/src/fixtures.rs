//! Allocator test doubles.
//!
//! - [`CountingAllocator`]: forwards to an inner allocator and counts calls.
//! - [`FailingAllocator`]: forwards until a budget of allocations is spent,
//!   then reports out-of-memory. Frees can be made to fail on demand.

use std::sync::atomic::{AtomicUsize, Ordering};

use cairn_core::{AllocError, Allocator, BulkFree, Handle};

/// Forwards to `inner`, counting `alloc`, `free` and `realloc` calls.
pub struct CountingAllocator<A> {
    pub inner: A,
    allocs: AtomicUsize,
    frees: AtomicUsize,
    reallocs: AtomicUsize,
}

impl<A: Allocator> CountingAllocator<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            allocs: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            reallocs: AtomicUsize::new(0),
        }
    }

    pub fn allocs(&self) -> usize {
        self.allocs.load(Ordering::Relaxed)
    }

    pub fn frees(&self) -> usize {
        self.frees.load(Ordering::Relaxed)
    }

    pub fn reallocs(&self) -> usize {
        self.reallocs.load(Ordering::Relaxed)
    }
}

impl<A: Allocator> Allocator for CountingAllocator<A> {
    fn alloc(&mut self, count: usize, elem_size: usize) -> Result<Handle, AllocError> {
        self.allocs.fetch_add(1, Ordering::Relaxed);
        self.inner.alloc(count, elem_size)
    }

    fn free(&mut self, handle: Handle) -> Result<(), AllocError> {
        self.frees.fetch_add(1, Ordering::Relaxed);
        self.inner.free(handle)
    }

    fn realloc(&mut self, handle: Handle, new_size: usize) -> Result<Handle, AllocError> {
        self.reallocs.fetch_add(1, Ordering::Relaxed);
        self.inner.realloc(handle, new_size)
    }

    fn payload_len(&self, handle: Handle) -> Result<usize, AllocError> {
        self.inner.payload_len(handle)
    }

    fn read(&self, handle: Handle, offset: usize, dst: &mut [u8]) -> Result<(), AllocError> {
        self.inner.read(handle, offset, dst)
    }

    fn write(&mut self, handle: Handle, offset: usize, src: &[u8]) -> Result<(), AllocError> {
        self.inner.write(handle, offset, src)
    }
}

impl<A: BulkFree> BulkFree for CountingAllocator<A> {
    fn free_all(&mut self) {
        self.inner.free_all();
    }
}

/// Forwards to `inner` until `budget` successful `alloc`/`realloc` calls
/// have been made, then fails every further one with
/// [`AllocError::OutOfMemory`].
pub struct FailingAllocator<A> {
    pub inner: A,
    budget: usize,
    spent: usize,
    reject_frees: bool,
}

impl<A: Allocator> FailingAllocator<A> {
    pub fn new(inner: A, budget: usize) -> Self {
        Self {
            inner,
            budget,
            spent: 0,
            reject_frees: false,
        }
    }

    /// While set, every `free` is refused with [`AllocError::InvalidHandle`]
    /// and the handle stays live in `inner`.
    pub fn reject_frees(&mut self, reject: bool) {
        self.reject_frees = reject;
    }

    /// Grant `more` additional successful calls.
    pub fn refill(&mut self, more: usize) {
        self.budget += more;
    }

    fn spend(&mut self, requested: usize) -> Result<(), AllocError> {
        if self.spent >= self.budget {
            return Err(AllocError::OutOfMemory { requested });
        }
        self.spent += 1;
        Ok(())
    }
}

impl<A: Allocator> Allocator for FailingAllocator<A> {
    fn alloc(&mut self, count: usize, elem_size: usize) -> Result<Handle, AllocError> {
        self.spend(count.saturating_mul(elem_size))?;
        self.inner.alloc(count, elem_size)
    }

    fn free(&mut self, handle: Handle) -> Result<(), AllocError> {
        if self.reject_frees {
            return Err(AllocError::InvalidHandle { handle });
        }
        self.inner.free(handle)
    }

    fn realloc(&mut self, handle: Handle, new_size: usize) -> Result<Handle, AllocError> {
        self.spend(new_size)?;
        self.inner.realloc(handle, new_size)
    }

    fn payload_len(&self, handle: Handle) -> Result<usize, AllocError> {
        self.inner.payload_len(handle)
    }

    fn read(&self, handle: Handle, offset: usize, dst: &mut [u8]) -> Result<(), AllocError> {
        self.inner.read(handle, offset, dst)
    }

    fn write(&mut self, handle: Handle, offset: usize, src: &[u8]) -> Result<(), AllocError> {
        self.inner.write(handle, offset, src)
    }
}

//! A bounded set of independent allocators.
//!
//! [`AllocatorPool`] builds up to `N` allocators on demand, typically one
//! per worker thread so each worker allocates without contention, and
//! releases all of them in one [`free_all`](AllocatorPool::free_all) pass.

use cairn_core::{AllocError, BulkFree};
use tracing::{debug, error};

/// Up to `N` allocators created on demand.
pub struct AllocatorPool<A, const N: usize> {
    allocators: Vec<A>,
}

impl<A, const N: usize> AllocatorPool<A, N> {
    /// An empty pool.
    pub fn new() -> Self {
        Self {
            allocators: Vec::with_capacity(N),
        }
    }

    /// Append a new allocator built by `make` and return it.
    ///
    /// Fails with [`AllocError::CapacityExceeded`] once `N` allocators
    /// exist.
    pub fn get(&mut self, make: impl FnOnce() -> A) -> Result<&mut A, AllocError> {
        if self.allocators.len() >= N {
            error!(capacity = N, "allocator pool exhausted");
            return Err(AllocError::CapacityExceeded {
                requested: self.allocators.len() + 1,
                capacity: N,
            });
        }
        self.allocators.push(make());
        let index = self.allocators.len() - 1;
        debug!(index, capacity = N, "allocator pool grew");
        Ok(&mut self.allocators[index])
    }

    /// Number of allocators created so far.
    pub fn len(&self) -> usize {
        self.allocators.len()
    }

    /// Whether no allocator has been created.
    pub fn is_empty(&self) -> bool {
        self.allocators.is_empty()
    }

    /// The pool's fixed capacity `N`.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// The allocator created `index`-th.
    pub fn get_index(&mut self, index: usize) -> Option<&mut A> {
        self.allocators.get_mut(index)
    }

    /// Mutable access to every allocator, for handing one to each worker.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, A> {
        self.allocators.iter_mut()
    }
}

impl<A: BulkFree, const N: usize> AllocatorPool<A, N> {
    /// Release everything every allocator in the pool owns.
    pub fn free_all(&mut self) {
        for allocator in &mut self.allocators {
            allocator.free_all();
        }
        debug!(allocators = self.allocators.len(), "allocator pool free_all");
    }
}

impl<A, const N: usize> Default for AllocatorPool<A, N> {
    fn default() -> Self {
        Self::new()
    }
}

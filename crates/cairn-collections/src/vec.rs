//! Growable contiguous array backed by any [`Allocator`].
//!
//! [`GrowVec`] keeps its elements in a single allocation and doubles the
//! allocation with `realloc` when it runs out of room. It is the bookkeeping
//! structure allocators use for their own metadata (the array-tracked
//! allocator's cleanup ledger is a `GrowVec<Option<Handle>, _>`).

use std::marker::PhantomData;

use cairn_core::error::checked_size;
use cairn_core::layout::SIZE_MIN;
use cairn_core::{AllocError, Allocator, Element, Handle};
use tracing::debug;

use crate::slots;

/// A growable array of fixed-width elements.
///
/// Elements are copied in and out by value through the [`Element`] codec.
/// Index misuse (`set` past `len`) panics like slice indexing; allocator
/// failures are returned as [`AllocError`].
pub struct GrowVec<T: Element, A: Allocator> {
    alloc: A,
    storage: Option<Handle>,
    len: usize,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T: Element, A: Allocator> GrowVec<T, A> {
    /// Create an empty array. Nothing is allocated until the first push.
    pub fn new(alloc: A) -> Self {
        Self {
            alloc,
            storage: None,
            len: 0,
            capacity: 0,
            _marker: PhantomData,
        }
    }

    /// Create an empty array with room for `capacity` elements.
    pub fn with_capacity(alloc: A, capacity: usize) -> Result<Self, AllocError> {
        let mut vec = Self::new(alloc);
        if capacity > 0 {
            vec.grow(capacity)?;
        }
        Ok(vec)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the current allocation can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Handle of the backing allocation, if any.
    pub fn storage(&self) -> Option<Handle> {
        self.storage
    }

    /// The allocator backing this array.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Mutable access to the allocator backing this array.
    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.alloc
    }

    /// Append an element, doubling capacity when full.
    pub fn push(&mut self, value: T) -> Result<(), AllocError> {
        if self.len == self.capacity {
            self.grow((self.capacity * 2).max(SIZE_MIN))?;
        }
        let storage = self.live_storage()?;
        slots::store(&mut self.alloc, storage, self.len, &value)?;
        self.len += 1;
        Ok(())
    }

    /// Remove and return the last element.
    pub fn pop(&mut self) -> Result<Option<T>, AllocError> {
        if self.len == 0 {
            return Ok(None);
        }
        let value = slots::load(&self.alloc, self.live_storage()?, self.len - 1)?;
        self.len -= 1;
        Ok(Some(value))
    }

    /// The element at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Result<Option<T>, AllocError> {
        if index >= self.len {
            return Ok(None);
        }
        slots::load(&self.alloc, self.live_storage()?, index).map(Some)
    }

    /// Overwrite the element at `index`, returning the previous value.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn set(&mut self, index: usize, value: T) -> Result<T, AllocError> {
        assert!(
            index < self.len,
            "index {index} out of range for GrowVec of length {}",
            self.len
        );
        let storage = self.live_storage()?;
        let old = slots::load(&self.alloc, storage, index)?;
        slots::store(&mut self.alloc, storage, index, &value)?;
        Ok(old)
    }

    /// The first element.
    pub fn first(&self) -> Result<Option<T>, AllocError> {
        self.get(0)
    }

    /// The last element.
    pub fn last(&self) -> Result<Option<T>, AllocError> {
        match self.len {
            0 => Ok(None),
            n => self.get(n - 1),
        }
    }

    /// Resize to `new_len`, filling new slots with `fill`.
    pub fn resize(&mut self, new_len: usize, fill: T) -> Result<(), AllocError> {
        if new_len > self.capacity {
            self.grow(new_len)?;
        }
        if new_len > self.len {
            let storage = self.live_storage()?;
            for i in self.len..new_len {
                slots::store(&mut self.alloc, storage, i, &fill)?;
            }
        }
        self.len = new_len;
        Ok(())
    }

    /// Make room for at least `additional` more elements.
    pub fn reserve(&mut self, additional: usize) -> Result<(), AllocError> {
        let needed = self
            .len
            .checked_add(additional)
            .ok_or(AllocError::SizeOverflow {
                count: self.len,
                elem_size: T::SIZE,
            })?;
        if needed > self.capacity {
            self.grow(needed.max(self.capacity * 2).max(SIZE_MIN))?;
        }
        Ok(())
    }

    /// Drop every element, keeping the allocation.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Free the backing allocation. The array is empty and reusable
    /// afterwards.
    pub fn release(&mut self) -> Result<(), AllocError> {
        self.len = 0;
        self.capacity = 0;
        match self.storage.take() {
            Some(h) => self.alloc.free(h),
            None => Ok(()),
        }
    }

    /// Iterate over the elements front to back.
    pub fn iter(&self) -> Iter<'_, T, A> {
        Iter {
            vec: self,
            index: 0,
        }
    }

    /// Copy every element out into a `Vec`.
    pub fn to_vec(&self) -> Result<Vec<T>, AllocError> {
        self.iter().collect()
    }

    fn live_storage(&self) -> Result<Handle, AllocError> {
        self.storage.ok_or(AllocError::Released)
    }

    fn grow(&mut self, new_capacity: usize) -> Result<(), AllocError> {
        let bytes = checked_size(new_capacity, T::SIZE)?;
        let storage = match self.storage {
            Some(h) => self.alloc.realloc(h, bytes)?,
            None => self.alloc.alloc(new_capacity, T::SIZE)?,
        };
        debug!(
            from = self.capacity,
            to = new_capacity,
            moved = self.storage != Some(storage),
            "GrowVec grow"
        );
        self.storage = Some(storage);
        self.capacity = new_capacity;
        Ok(())
    }
}

impl<T: Element, A: Allocator> Drop for GrowVec<T, A> {
    fn drop(&mut self) {
        if let Some(h) = self.storage.take() {
            let _ = self.alloc.free(h);
        }
    }
}

/// Front-to-back iterator over a [`GrowVec`].
pub struct Iter<'a, T: Element, A: Allocator> {
    vec: &'a GrowVec<T, A>,
    index: usize,
}

impl<T: Element, A: Allocator> Iterator for Iter<'_, T, A> {
    type Item = Result<T, AllocError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.vec.get(self.index).transpose()?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.vec.len.saturating_sub(self.index);
        (rest, Some(rest))
    }
}

//! FIFO ring buffer backed by any [`Allocator`].

use std::marker::PhantomData;

use cairn_core::layout::SIZE_MIN;
use cairn_core::{AllocError, Allocator, Element, Handle};
use tracing::debug;

use crate::slots;

/// A circular FIFO queue in a single allocation.
///
/// When full, the queue rebuilds itself into a table of twice the capacity
/// with the elements unwrapped into FIFO order starting at slot 0.
pub struct RingQueue<T: Element, A: Allocator> {
    alloc: A,
    storage: Option<Handle>,
    head: usize,
    len: usize,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T: Element, A: Allocator> RingQueue<T, A> {
    /// Create an empty queue. Nothing is allocated until the first push.
    pub fn new(alloc: A) -> Self {
        Self {
            alloc,
            storage: None,
            head: 0,
            len: 0,
            capacity: 0,
            _marker: PhantomData,
        }
    }

    /// Number of queued elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots in the ring.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The backing allocator.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// The backing allocator, mutably.
    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.alloc
    }

    /// Enqueue at the back.
    pub fn push_back(&mut self, value: T) -> Result<(), AllocError> {
        if self.len == self.capacity {
            self.rebuild((self.capacity * 2).max(SIZE_MIN))?;
        }
        let storage = self.storage.ok_or(AllocError::Released)?;
        let tail = (self.head + self.len) % self.capacity;
        slots::store(&mut self.alloc, storage, tail, &value)?;
        self.len += 1;
        Ok(())
    }

    /// Dequeue from the front.
    pub fn pop_front(&mut self) -> Result<Option<T>, AllocError> {
        let Some(value) = self.front()? else {
            return Ok(None);
        };
        self.head = (self.head + 1) % self.capacity;
        self.len -= 1;
        Ok(Some(value))
    }

    /// The element that would be dequeued next.
    pub fn front(&self) -> Result<Option<T>, AllocError> {
        self.nth(0)
    }

    /// The most recently enqueued element.
    pub fn back(&self) -> Result<Option<T>, AllocError> {
        match self.len {
            0 => Ok(None),
            n => self.nth(n - 1),
        }
    }

    /// Iterate front to back.
    pub fn iter(&self) -> impl Iterator<Item = Result<T, AllocError>> + '_ {
        (0..self.len).filter_map(move |i| self.nth(i).transpose())
    }

    /// Free the ring. The queue is empty and reusable afterwards.
    pub fn release(&mut self) -> Result<(), AllocError> {
        self.head = 0;
        self.len = 0;
        self.capacity = 0;
        match self.storage.take() {
            Some(h) => self.alloc.free(h),
            None => Ok(()),
        }
    }

    fn nth(&self, i: usize) -> Result<Option<T>, AllocError> {
        if i >= self.len {
            return Ok(None);
        }
        let storage = self.storage.ok_or(AllocError::Released)?;
        slots::load(&self.alloc, storage, (self.head + i) % self.capacity).map(Some)
    }

    fn rebuild(&mut self, new_capacity: usize) -> Result<(), AllocError> {
        let fresh = self.alloc.alloc(new_capacity, T::SIZE)?;
        for i in 0..self.len {
            let moved = self.nth(i).and_then(|v| match v {
                Some(v) => slots::store(&mut self.alloc, fresh, i, &v),
                None => Ok(()),
            });
            if let Err(err) = moved {
                let _ = self.alloc.free(fresh);
                return Err(err);
            }
        }
        debug!(from = self.capacity, to = new_capacity, "ring queue grow");
        let old = self.storage.replace(fresh);
        self.head = 0;
        self.capacity = new_capacity;
        match old {
            Some(old) => self.alloc.free(old),
            None => Ok(()),
        }
    }
}

impl<T: Element, A: Allocator> Drop for RingQueue<T, A> {
    fn drop(&mut self) {
        if let Some(h) = self.storage.take() {
            let _ = self.alloc.free(h);
        }
    }
}

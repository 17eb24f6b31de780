//! Open-addressing hash table with linear probing and tombstones.
//!
//! The table is a single allocation of encoded [`Bucket`]s. A value's home
//! bucket is `map_hash(value) % capacity`; collisions probe forward one
//! bucket at a time, wrapping at the end. Removal leaves a
//! [`Bucket::Deleted`] tombstone so probe chains that cross it stay intact.
//! Tombstones are reusable by inserts and are dropped by the next rehash.
//!
//! The map is a set of values: entries are whole values compared with
//! `PartialEq`. The map-indexed allocator stores raw handles in it.

use std::marker::PhantomData;

use cairn_core::layout::SIZE_MIN;
use cairn_core::{AllocError, Allocator, Element, Handle, MapHash};
use tracing::debug;

use crate::slots;

/// Default maximum ratio of used buckets (live and tombstoned) to capacity.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.5;

const TAG_EMPTY: u8 = 0;
const TAG_OCCUPIED: u8 = 1;
const TAG_DELETED: u8 = 2;

/// One slot of the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bucket<T> {
    /// Never written since the last rehash. Ends a probe chain.
    Empty,
    /// Holds a live value.
    Occupied(T),
    /// Tombstone left by a removal. Probing continues past it.
    Deleted,
}

impl<T: Element> Element for Bucket<T> {
    const SIZE: usize = 1 + T::SIZE;

    fn encode(&self, out: &mut [u8]) {
        match self {
            Bucket::Empty => {
                out[0] = TAG_EMPTY;
                out[1..Self::SIZE].fill(0);
            }
            Bucket::Occupied(value) => {
                out[0] = TAG_OCCUPIED;
                value.encode(&mut out[1..Self::SIZE]);
            }
            Bucket::Deleted => {
                out[0] = TAG_DELETED;
                out[1..Self::SIZE].fill(0);
            }
        }
    }

    fn decode(bytes: &[u8]) -> Self {
        match bytes[0] {
            TAG_OCCUPIED => Bucket::Occupied(T::decode(&bytes[1..Self::SIZE])),
            TAG_DELETED => Bucket::Deleted,
            _ => Bucket::Empty,
        }
    }
}

/// Outcome of [`HashMap::search`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Probe {
    /// The value lives at this index.
    Found(usize),
    /// The value is absent; probing stopped at this index.
    Vacant(usize),
}

impl Probe {
    /// The index probing ended at, found or not.
    pub fn index(self) -> usize {
        match self {
            Probe::Found(i) | Probe::Vacant(i) => i,
        }
    }

    /// Index of the match, if any.
    pub fn found(self) -> Option<usize> {
        match self {
            Probe::Found(i) => Some(i),
            Probe::Vacant(_) => None,
        }
    }
}

/// Where an insert placed (or found) a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    /// Bucket index holding the value.
    pub index: usize,
    /// The value's hash.
    pub hash: u64,
    /// `false` when [`HashMap::try_insert`] found the value already present.
    pub inserted: bool,
}

/// Open-addressing hash set over any [`Allocator`].
pub struct HashMap<T, A>
where
    T: Element + MapHash + PartialEq,
    A: Allocator,
{
    alloc: A,
    table: Option<Handle>,
    capacity: usize,
    /// Occupied buckets.
    len: usize,
    /// Occupied plus tombstoned buckets.
    used: usize,
    max_load: f64,
    _marker: PhantomData<T>,
}

impl<T, A> HashMap<T, A>
where
    T: Element + MapHash + PartialEq,
    A: Allocator,
{
    /// Create an empty map with the default load factor. The table is
    /// allocated on first insert.
    pub fn new(alloc: A) -> Self {
        Self {
            alloc,
            table: None,
            capacity: 0,
            len: 0,
            used: 0,
            max_load: DEFAULT_LOAD_FACTOR,
            _marker: PhantomData,
        }
    }

    /// Create an empty map with an explicit load-factor threshold.
    ///
    /// # Panics
    ///
    /// Panics unless `0 < load_factor < 1`.
    pub fn with_load_factor(alloc: A, load_factor: f64) -> Self {
        assert!(
            load_factor > 0.0 && load_factor < 1.0,
            "load factor must be in (0, 1), got {load_factor}"
        );
        let mut map = Self::new(alloc);
        map.max_load = load_factor;
        map
    }

    /// Create an empty map with `capacity` buckets allocated up front.
    pub fn with_capacity(alloc: A, capacity: usize) -> Result<Self, AllocError> {
        let mut map = Self::new(alloc);
        if capacity > 0 {
            map.rehash(capacity)?;
        }
        Ok(map)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the map holds no live values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ratio of used buckets (live plus tombstones) to capacity. An
    /// unallocated table reports 1.0 so the first insert allocates.
    pub fn load_factor(&self) -> f64 {
        if self.capacity == 0 {
            1.0
        } else {
            self.used as f64 / self.capacity as f64
        }
    }

    /// The configured load-factor threshold.
    pub fn max_load_factor(&self) -> f64 {
        self.max_load
    }

    /// The allocator backing the table.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// The backing allocator, mutably.
    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.alloc
    }

    /// Insert `value`, rehashing first if the insert would push the load
    /// factor past the threshold. Does not check for an existing equal value.
    pub fn insert(&mut self, value: T) -> Result<Slot, AllocError> {
        self.reserve(1)?;
        let table = self.live_table()?;
        let hash = value.map_hash();
        let index = self.open_slot(table, self.capacity, hash)?;
        let reused_tombstone = matches!(self.bucket(table, index)?, Bucket::Deleted);
        slots::store(&mut self.alloc, table, index, &Bucket::Occupied(value))?;
        self.len += 1;
        if !reused_tombstone {
            self.used += 1;
        }
        Ok(Slot {
            index,
            hash,
            inserted: true,
        })
    }

    /// Make room for `additional` inserts without a rehash, doubling the
    /// table until they fit under the load-factor threshold.
    ///
    /// Bucket indices from earlier searches are stale after this returns.
    pub fn reserve(&mut self, additional: usize) -> Result<(), AllocError> {
        let fits = |used: usize, capacity: usize| {
            used.saturating_add(additional) as f64 <= self.max_load * capacity as f64
        };
        if fits(self.used, self.capacity) {
            return Ok(());
        }
        let mut target = (self.capacity * 2).max(SIZE_MIN);
        while !fits(self.len, target) {
            target = target.checked_mul(2).ok_or(AllocError::SizeOverflow {
                count: target,
                elem_size: Bucket::<T>::SIZE,
            })?;
        }
        self.rehash(target)
    }

    /// Insert `value` unless an equal value is already present.
    pub fn try_insert(&mut self, value: T) -> Result<Slot, AllocError> {
        if let Probe::Found(index) = self.search(&value)? {
            return Ok(Slot {
                index,
                hash: value.map_hash(),
                inserted: false,
            });
        }
        self.insert(value)
    }

    /// Find `value`'s bucket.
    ///
    /// Probing walks forward from the home bucket across occupied buckets
    /// and tombstones, stopping at the first empty bucket or after visiting
    /// every bucket once.
    pub fn search(&self, value: &T) -> Result<Probe, AllocError> {
        let Some(table) = self.table else {
            return Ok(Probe::Vacant(0));
        };
        let mut index = home(value.map_hash(), self.capacity);
        for _ in 0..self.capacity {
            match self.bucket(table, index)? {
                Bucket::Empty => return Ok(Probe::Vacant(index)),
                Bucket::Occupied(v) if v == *value => return Ok(Probe::Found(index)),
                Bucket::Occupied(_) | Bucket::Deleted => {}
            }
            index = (index + 1) % self.capacity;
        }
        Ok(Probe::Vacant(index))
    }

    /// Whether an equal value is present.
    pub fn contains(&self, value: &T) -> Result<bool, AllocError> {
        Ok(matches!(self.search(value)?, Probe::Found(_)))
    }

    /// The live value at `index`, if that bucket is occupied.
    pub fn get(&self, index: usize) -> Result<Option<T>, AllocError> {
        let Some(table) = self.table else {
            return Ok(None);
        };
        if index >= self.capacity {
            return Ok(None);
        }
        match self.bucket(table, index)? {
            Bucket::Occupied(v) => Ok(Some(v)),
            Bucket::Empty | Bucket::Deleted => Ok(None),
        }
    }

    /// Tombstone the bucket at `index`, returning the value it held.
    pub fn remove(&mut self, index: usize) -> Result<Option<T>, AllocError> {
        let Some(value) = self.get(index)? else {
            return Ok(None);
        };
        let table = self.live_table()?;
        slots::store(&mut self.alloc, table, index, &Bucket::<T>::Deleted)?;
        self.len -= 1;
        Ok(Some(value))
    }

    /// Search for `value` and remove it if present.
    pub fn remove_value(&mut self, value: &T) -> Result<Option<T>, AllocError> {
        match self.search(value)? {
            Probe::Found(index) => self.remove(index),
            Probe::Vacant(_) => Ok(None),
        }
    }

    /// Move every live value into a fresh table of at least `new_capacity`
    /// buckets, dropping tombstones.
    ///
    /// The capacity is raised as needed so the live values stay under the
    /// load-factor threshold. On failure the old table is left intact.
    pub fn rehash(&mut self, new_capacity: usize) -> Result<(), AllocError> {
        let floor = (self.len as f64 / self.max_load).floor() as usize + 1;
        let new_capacity = new_capacity.max(floor);
        let new_table = self.alloc.alloc(new_capacity, Bucket::<T>::SIZE)?;
        if let Err(err) = self.migrate(new_table, new_capacity) {
            let _ = self.alloc.free(new_table);
            return Err(err);
        }
        debug!(
            from = self.capacity,
            to = new_capacity,
            live = self.len,
            dropped_tombstones = self.used - self.len,
            "hash map rehash"
        );
        let old = self.table.replace(new_table);
        self.capacity = new_capacity;
        self.used = self.len;
        match old {
            Some(old) => self.alloc.free(old),
            None => Ok(()),
        }
    }

    /// Iterate over live values in bucket order.
    pub fn iter(&self) -> Iter<'_, T, A> {
        Iter {
            map: self,
            index: 0,
        }
    }

    /// Free the table. The map is empty and reusable afterwards.
    pub fn release(&mut self) -> Result<(), AllocError> {
        self.capacity = 0;
        self.len = 0;
        self.used = 0;
        match self.table.take() {
            Some(h) => self.alloc.free(h),
            None => Ok(()),
        }
    }

    fn live_table(&self) -> Result<Handle, AllocError> {
        self.table.ok_or(AllocError::Released)
    }

    fn bucket(&self, table: Handle, index: usize) -> Result<Bucket<T>, AllocError> {
        slots::load(&self.alloc, table, index)
    }

    /// First non-occupied bucket in `hash`'s probe order.
    fn open_slot(&self, table: Handle, capacity: usize, hash: u64) -> Result<usize, AllocError> {
        let mut index = home(hash, capacity);
        for _ in 0..capacity {
            if !matches!(self.bucket(table, index)?, Bucket::Occupied(_)) {
                return Ok(index);
            }
            index = (index + 1) % capacity;
        }
        Err(AllocError::CapacityExceeded {
            requested: self.len + 1,
            capacity,
        })
    }

    fn migrate(&mut self, new_table: Handle, new_capacity: usize) -> Result<(), AllocError> {
        let Some(old) = self.table else {
            return Ok(());
        };
        for i in 0..self.capacity {
            if let Bucket::Occupied(value) = self.bucket(old, i)? {
                let index = self.open_slot(new_table, new_capacity, value.map_hash())?;
                slots::store(&mut self.alloc, new_table, index, &Bucket::Occupied(value))?;
            }
        }
        Ok(())
    }
}

impl<T, A> Drop for HashMap<T, A>
where
    T: Element + MapHash + PartialEq,
    A: Allocator,
{
    fn drop(&mut self) {
        if let Some(h) = self.table.take() {
            let _ = self.alloc.free(h);
        }
    }
}

#[inline]
fn home(hash: u64, capacity: usize) -> usize {
    (hash % capacity as u64) as usize
}

/// Iterator over a [`HashMap`]'s live values in bucket order.
pub struct Iter<'a, T, A>
where
    T: Element + MapHash + PartialEq,
    A: Allocator,
{
    map: &'a HashMap<T, A>,
    index: usize,
}

impl<T, A> Iterator for Iter<'_, T, A>
where
    T: Element + MapHash + PartialEq,
    A: Allocator,
{
    type Item = Result<T, AllocError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.map.capacity {
            let i = self.index;
            self.index += 1;
            match self.map.get(i) {
                Ok(Some(v)) => return Some(Ok(v)),
                Ok(None) => {}
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

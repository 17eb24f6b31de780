//! Map-indexed allocator.
//!
//! Live addresses are kept in an open-addressing [`HashMap`]. Presence in
//! the map is the only evidence an address is live, so payloads carry no
//! header and `free`/`realloc` are driven purely by the handle value.

use cairn_collections::hash_map::Probe;
use cairn_collections::HashMap;
use cairn_core::{AllocError, Allocator, BulkFree, Handle, SystemAllocator};
use tracing::{debug, error, trace};

/// Heap allocator indexed by a hash map of live addresses.
pub struct MapAllocator {
    sys: SystemAllocator,
    live: HashMap<Handle, SystemAllocator>,
}

impl MapAllocator {
    /// Create an empty allocator. The map is allocated on first use.
    pub fn new() -> Self {
        Self {
            sys: SystemAllocator::new(),
            live: HashMap::new(SystemAllocator::new()),
        }
    }

    /// Number of live allocations.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Whether `handle` is live in this allocator.
    pub fn contains(&self, handle: Handle) -> Result<bool, AllocError> {
        self.live.contains(&handle)
    }

    /// Bucket index of a live handle, or the error a stale or foreign
    /// handle deserves.
    fn locate(&self, handle: Handle, op: &'static str) -> Result<usize, AllocError> {
        match self.live.search(&handle)? {
            Probe::Found(index) => Ok(index),
            Probe::Vacant(_) => {
                let err = self.sys.missing(handle);
                error!(%handle, %err, op, "map allocator rejected handle");
                Err(err)
            }
        }
    }

    fn live_region(&self, handle: Handle) -> Result<Handle, AllocError> {
        if self.live.contains(&handle)? {
            Ok(handle)
        } else {
            Err(self.sys.missing(handle))
        }
    }
}

impl Default for MapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for MapAllocator {
    fn alloc(&mut self, count: usize, elem_size: usize) -> Result<Handle, AllocError> {
        self.live.reserve(1)?;
        let handle = self.sys.alloc(count, elem_size)?;
        if let Err(err) = self.live.insert(handle) {
            let _ = self.sys.free(handle);
            return Err(err);
        }
        trace!(%handle, live = self.live.len(), "map alloc");
        Ok(handle)
    }

    fn free(&mut self, handle: Handle) -> Result<(), AllocError> {
        let index = self.locate(handle, "free")?;
        self.sys.free(handle)?;
        self.live.remove(index)?;
        trace!(%handle, "map free");
        Ok(())
    }

    fn realloc(&mut self, handle: Handle, new_size: usize) -> Result<Handle, AllocError> {
        // Room for the new address must exist before any index is taken.
        self.live.reserve(1)?;
        let index = self.locate(handle, "realloc")?;
        let moved = self.sys.realloc(handle, new_size)?;
        if moved != handle {
            self.live.remove(index)?;
            self.live.insert(moved)?;
        }
        trace!(from = %handle, to = %moved, new_size, "map realloc");
        Ok(moved)
    }

    fn payload_len(&self, handle: Handle) -> Result<usize, AllocError> {
        self.sys.payload_len(self.live_region(handle)?)
    }

    fn read(&self, handle: Handle, offset: usize, dst: &mut [u8]) -> Result<(), AllocError> {
        self.sys.read(self.live_region(handle)?, offset, dst)
    }

    fn write(&mut self, handle: Handle, offset: usize, src: &[u8]) -> Result<(), AllocError> {
        let region = self.live_region(handle)?;
        self.sys.write(region, offset, src)
    }
}

impl BulkFree for MapAllocator {
    fn free_all(&mut self) {
        let mut released = 0usize;
        for entry in self.live.iter() {
            match entry {
                Ok(handle) => match self.sys.free(handle) {
                    Ok(()) => released += 1,
                    Err(err) => error!(%handle, %err, "map free_all could not free region"),
                },
                Err(err) => error!(%err, "map free_all could not read bucket"),
            }
        }
        debug!(released, buckets = self.live.capacity(), "map free_all");
        if let Err(err) = self.live.release() {
            error!(%err, "map free_all could not release table");
        }
    }
}

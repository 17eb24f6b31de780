//! The system allocator.
//!
//! [`SystemAllocator`] is the explicit default allocator: each instance is
//! constructed by its owner and passed by ownership or reference to whatever
//! needs it. It serves every request with a fresh zeroed heap buffer and
//! hands out addresses from a private, monotonically increasing address
//! space. Addresses are never reissued and every region base is recorded,
//! which lets it tell a stale handle (double free) from a foreign or
//! interior one.

use indexmap::IndexMap;
use tracing::{error, trace};

use crate::error::{check_bounds, checked_size, AllocError};
use crate::handle::Handle;
use crate::layout::align_up;
use crate::traits::{Allocator, BulkFree};

/// First address handed out by a fresh allocator.
const BASE_ADDR: u64 = 0x1_0000;
/// Alignment of region addresses.
const REGION_ALIGN: usize = 16;

struct Region {
    data: Vec<u8>,
    /// Address span reserved for this region. Growth up to `span` keeps
    /// the same address.
    span: usize,
}

/// Heap-backed allocator with calloc/free/realloc semantics.
pub struct SystemAllocator {
    regions: IndexMap<u64, Region>,
    /// Every region base ever issued, ascending.
    bases: Vec<u64>,
    next_addr: u64,
    live_bytes: usize,
}

impl SystemAllocator {
    /// Create an empty allocator.
    pub fn new() -> Self {
        Self {
            regions: IndexMap::new(),
            bases: Vec::new(),
            next_addr: BASE_ADDR,
            live_bytes: 0,
        }
    }

    /// Allocate `size` zeroed bytes.
    pub fn alloc_bytes(&mut self, size: usize) -> Result<Handle, AllocError> {
        let data = zeroed(size)?;
        let (handle, span) = self.reserve(size)?;
        self.regions.insert(handle.addr(), Region { data, span });
        self.live_bytes += size;
        trace!(%handle, size, "system alloc");
        Ok(handle)
    }

    /// Shared view of a live region's bytes.
    pub fn bytes(&self, handle: Handle) -> Result<&[u8], AllocError> {
        self.regions
            .get(&handle.addr())
            .map(|r| r.data.as_slice())
            .ok_or_else(|| self.missing(handle))
    }

    /// Mutable view of a live region's bytes.
    pub fn bytes_mut(&mut self, handle: Handle) -> Result<&mut [u8], AllocError> {
        if !self.regions.contains_key(&handle.addr()) {
            return Err(self.missing(handle));
        }
        self.regions
            .get_mut(&handle.addr())
            .map(|r| r.data.as_mut_slice())
            .ok_or(AllocError::InvalidHandle { handle })
    }

    /// Whether `handle` is a live region base address.
    pub fn contains(&self, handle: Handle) -> bool {
        self.regions.contains_key(&handle.addr())
    }

    /// Whether `handle` was ever returned as a region base, live or not.
    pub fn was_issued(&self, handle: Handle) -> bool {
        self.bases.binary_search(&handle.addr()).is_ok()
    }

    /// Number of live regions.
    pub fn live_count(&self) -> usize {
        self.regions.len()
    }

    /// Total payload bytes across live regions.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    /// The error for a handle that is not a live region.
    pub fn missing(&self, handle: Handle) -> AllocError {
        if self.was_issued(handle) {
            AllocError::DoubleFree { handle }
        } else {
            AllocError::InvalidHandle { handle }
        }
    }

    fn reserve(&mut self, size: usize) -> Result<(Handle, usize), AllocError> {
        let span = align_up(size.max(1), REGION_ALIGN)
            .ok_or(AllocError::OutOfMemory { requested: size })?;
        let addr = self.next_addr;
        let next = addr
            .checked_add(span as u64)
            .ok_or(AllocError::OutOfMemory { requested: size })?;
        let handle = Handle::new(addr).ok_or(AllocError::OutOfMemory { requested: size })?;
        self.bases.push(addr);
        self.next_addr = next;
        Ok((handle, span))
    }
}

impl Default for SystemAllocator {
    fn default() -> Self {
        Self::new()
    }
}

fn zeroed(size: usize) -> Result<Vec<u8>, AllocError> {
    let mut data = Vec::new();
    if data.try_reserve_exact(size).is_err() {
        error!(size, "system allocation failed");
        return Err(AllocError::OutOfMemory { requested: size });
    }
    data.resize(size, 0);
    Ok(data)
}

impl Allocator for SystemAllocator {
    fn alloc(&mut self, count: usize, elem_size: usize) -> Result<Handle, AllocError> {
        self.alloc_bytes(checked_size(count, elem_size)?)
    }

    fn free(&mut self, handle: Handle) -> Result<(), AllocError> {
        match self.regions.swap_remove(&handle.addr()) {
            Some(region) => {
                self.live_bytes -= region.data.len();
                trace!(%handle, "system free");
                Ok(())
            }
            None => {
                let err = self.missing(handle);
                error!(%handle, %err, "system free rejected");
                Err(err)
            }
        }
    }

    fn realloc(&mut self, handle: Handle, new_size: usize) -> Result<Handle, AllocError> {
        let Some(region) = self.regions.get_mut(&handle.addr()) else {
            let err = self.missing(handle);
            error!(%handle, %err, "system realloc rejected");
            return Err(err);
        };
        let old_size = region.data.len();

        if new_size <= region.span {
            if new_size > old_size && region.data.try_reserve_exact(new_size - old_size).is_err() {
                error!(size = new_size, "system allocation failed");
                return Err(AllocError::OutOfMemory { requested: new_size });
            }
            region.data.resize(new_size, 0);
            self.live_bytes = self.live_bytes - old_size + new_size;
            trace!(%handle, old_size, new_size, "system realloc in place");
            return Ok(handle);
        }

        let mut data = zeroed(new_size)?;
        let keep = old_size.min(new_size);
        data[..keep].copy_from_slice(&region.data[..keep]);
        let (moved, span) = self.reserve(new_size)?;
        self.regions.swap_remove(&handle.addr());
        self.regions.insert(moved.addr(), Region { data, span });
        self.live_bytes = self.live_bytes - old_size + new_size;
        trace!(from = %handle, to = %moved, new_size, "system realloc moved");
        Ok(moved)
    }

    fn payload_len(&self, handle: Handle) -> Result<usize, AllocError> {
        self.bytes(handle).map(<[u8]>::len)
    }

    fn read(&self, handle: Handle, offset: usize, dst: &mut [u8]) -> Result<(), AllocError> {
        let bytes = self.bytes(handle)?;
        let range = check_bounds(handle, offset, dst.len(), bytes.len())?;
        dst.copy_from_slice(&bytes[range]);
        Ok(())
    }

    fn write(&mut self, handle: Handle, offset: usize, src: &[u8]) -> Result<(), AllocError> {
        let bytes = self.bytes_mut(handle)?;
        let range = check_bounds(handle, offset, src.len(), bytes.len())?;
        bytes[range].copy_from_slice(src);
        Ok(())
    }
}

impl BulkFree for SystemAllocator {
    fn free_all(&mut self) {
        trace!(regions = self.regions.len(), "system free_all");
        self.regions.clear();
        self.live_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_is_zeroed_and_sized() {
        let mut sys = SystemAllocator::new();
        let h = sys.alloc(3, 4).unwrap();
        assert_eq!(sys.bytes(h).unwrap(), &[0u8; 12]);
        assert_eq!(sys.live_bytes(), 12);
    }

    #[test]
    fn addresses_are_unique_and_aligned() {
        let mut sys = SystemAllocator::new();
        let a = sys.alloc_bytes(1).unwrap();
        let b = sys.alloc_bytes(0).unwrap();
        let c = sys.alloc_bytes(40).unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        for h in [a, b, c] {
            assert_eq!(h.addr() % REGION_ALIGN as u64, 0);
        }
    }

    #[test]
    fn free_then_free_is_double_free() {
        let mut sys = SystemAllocator::new();
        let h = sys.alloc_bytes(8).unwrap();
        sys.free(h).unwrap();
        assert_eq!(sys.free(h), Err(AllocError::DoubleFree { handle: h }));
    }

    #[test]
    fn foreign_handle_is_invalid() {
        let mut sys = SystemAllocator::new();
        let h = Handle::new(8).unwrap();
        assert_eq!(sys.free(h), Err(AllocError::InvalidHandle { handle: h }));
    }

    #[test]
    fn interior_address_is_invalid_not_double_free() {
        let mut sys = SystemAllocator::new();
        let h = sys.alloc_bytes(32).unwrap();
        let interior = h.offset(4).unwrap();
        assert_eq!(sys.free(interior), Err(AllocError::InvalidHandle { handle: interior }));
        sys.free(h).unwrap();
        assert_eq!(sys.free(interior), Err(AllocError::InvalidHandle { handle: interior }));
        assert_eq!(sys.free(h), Err(AllocError::DoubleFree { handle: h }));
    }

    #[test]
    fn realloc_within_span_keeps_address() {
        let mut sys = SystemAllocator::new();
        let h = sys.alloc_bytes(10).unwrap();
        sys.write(h, 0, b"abc").unwrap();
        let same = sys.realloc(h, 16).unwrap();
        assert_eq!(same, h);
        assert_eq!(&sys.bytes(h).unwrap()[..4], b"abc\0");
        assert_eq!(sys.payload_len(h).unwrap(), 16);
    }

    #[test]
    fn realloc_past_span_moves_and_copies() {
        let mut sys = SystemAllocator::new();
        let h = sys.alloc_bytes(4).unwrap();
        sys.write(h, 0, &[9, 8, 7, 6]).unwrap();
        let moved = sys.realloc(h, 64).unwrap();
        assert_ne!(moved, h);
        assert!(!sys.contains(h));
        let bytes = sys.bytes(moved).unwrap();
        assert_eq!(&bytes[..4], &[9, 8, 7, 6]);
        assert!(bytes[4..].iter().all(|&b| b == 0));
        assert_eq!(sys.live_count(), 1);
        assert_eq!(sys.live_bytes(), 64);
    }

    #[test]
    fn realloc_shrink_truncates() {
        let mut sys = SystemAllocator::new();
        let h = sys.alloc_bytes(8).unwrap();
        sys.write(h, 0, &[1; 8]).unwrap();
        assert_eq!(sys.realloc(h, 2).unwrap(), h);
        assert_eq!(sys.bytes(h).unwrap(), &[1, 1]);
    }

    #[test]
    fn out_of_bounds_access_is_rejected() {
        let mut sys = SystemAllocator::new();
        let h = sys.alloc_bytes(4).unwrap();
        let err = sys.write(h, 2, &[0; 4]).unwrap_err();
        assert!(matches!(err, AllocError::OutOfBounds { size: 4, .. }));
    }

    #[test]
    fn free_all_releases_everything_but_never_reissues() {
        let mut sys = SystemAllocator::new();
        let a = sys.alloc_bytes(8).unwrap();
        sys.alloc_bytes(8).unwrap();
        sys.free_all();
        assert_eq!(sys.live_count(), 0);
        assert_eq!(sys.live_bytes(), 0);
        let b = sys.alloc_bytes(8).unwrap();
        assert!(b > a);
        assert_eq!(sys.free(a), Err(AllocError::DoubleFree { handle: a }));
    }
}

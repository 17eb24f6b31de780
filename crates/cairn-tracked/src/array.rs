//! Array-tracked allocator.
//!
//! Every allocation is a system region laid out as
//! `[self_index: u64 LE | payload]`; the handle points at the payload. The
//! ledger slot `self_index` holds the region while it is live and `None`
//! after it is freed or superseded by a moving `realloc`. Slots are never
//! compacted, so a stale handle always finds its slot empty.

use cairn_collections::GrowVec;
use cairn_core::error::{check_bounds, checked_size};
use cairn_core::{AllocError, Allocator, BulkFree, Handle, SystemAllocator};
use tracing::{debug, error, trace};

/// Size of the index header in front of each payload.
pub const HEADER: usize = 8;

/// Heap allocator with a positional cleanup ledger.
pub struct ArrayAllocator {
    sys: SystemAllocator,
    ledger: GrowVec<Option<Handle>, SystemAllocator>,
    live: usize,
}

impl ArrayAllocator {
    /// Create an empty allocator. The ledger is allocated on first use.
    pub fn new() -> Self {
        Self {
            sys: SystemAllocator::new(),
            ledger: GrowVec::new(SystemAllocator::new()),
            live: 0,
        }
    }

    /// Create an allocator whose ledger has room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        Ok(Self {
            sys: SystemAllocator::new(),
            ledger: GrowVec::with_capacity(SystemAllocator::new(), capacity)?,
            live: 0,
        })
    }

    /// Number of live allocations.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of ledger slots, live or vacated.
    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    /// Map a payload handle to its region and ledger index.
    ///
    /// A region the system allocator no longer holds, or whose ledger slot
    /// no longer points back at it, is a double free.
    fn resolve(&self, handle: Handle) -> Result<(Handle, usize), AllocError> {
        let region = handle
            .checked_sub(HEADER as u64)
            .ok_or(AllocError::InvalidHandle { handle })?;
        let mut header = [0u8; HEADER];
        self.sys
            .read(region, 0, &mut header)
            .map_err(|err| match err {
                AllocError::DoubleFree { .. } => AllocError::DoubleFree { handle },
                AllocError::InvalidHandle { .. } => AllocError::InvalidHandle { handle },
                other => other,
            })?;
        let index = u64::from_le_bytes(header) as usize;
        match self.ledger.get(index)? {
            Some(Some(slot)) if slot == region => Ok((region, index)),
            _ => Err(AllocError::DoubleFree { handle }),
        }
    }

    fn resolve_logged(&self, handle: Handle, op: &'static str) -> Result<(Handle, usize), AllocError> {
        self.resolve(handle).inspect_err(|err| {
            error!(%handle, %err, op, "array allocator rejected handle");
        })
    }

    fn payload(region: Handle) -> Result<Handle, AllocError> {
        region
            .offset(HEADER as u64)
            .ok_or(AllocError::InvalidHandle { handle: region })
    }

    fn region_of(&self, handle: Handle) -> Result<(Handle, usize), AllocError> {
        let (region, _) = self.resolve(handle)?;
        let size = self.sys.payload_len(region)? - HEADER;
        Ok((region, size))
    }
}

impl Default for ArrayAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for ArrayAllocator {
    fn alloc(&mut self, count: usize, elem_size: usize) -> Result<Handle, AllocError> {
        let total = checked_size(count, elem_size)?
            .checked_add(HEADER)
            .ok_or(AllocError::SizeOverflow { count, elem_size })?;
        self.ledger.reserve(1)?;
        let region = self.sys.alloc_bytes(total)?;
        let index = self.ledger.len();
        self.ledger.push(Some(region))?;
        self.sys.write(region, 0, &(index as u64).to_le_bytes())?;
        self.live += 1;
        let handle = Self::payload(region)?;
        trace!(%handle, index, size = total - HEADER, "array alloc");
        Ok(handle)
    }

    fn free(&mut self, handle: Handle) -> Result<(), AllocError> {
        let (region, index) = self.resolve_logged(handle, "free")?;
        self.ledger.set(index, None)?;
        self.sys.free(region)?;
        self.live -= 1;
        trace!(%handle, index, "array free");
        Ok(())
    }

    fn realloc(&mut self, handle: Handle, new_size: usize) -> Result<Handle, AllocError> {
        let (region, index) = self.resolve_logged(handle, "realloc")?;
        let total = new_size.checked_add(HEADER).ok_or(AllocError::SizeOverflow {
            count: new_size,
            elem_size: 1,
        })?;
        self.ledger.reserve(1)?;
        let moved = self.sys.realloc(region, total)?;
        let new_index = self.ledger.len();
        self.ledger.set(index, None)?;
        self.ledger.push(Some(moved))?;
        self.sys.write(moved, 0, &(new_index as u64).to_le_bytes())?;
        let new_handle = Self::payload(moved)?;
        trace!(from = %handle, to = %new_handle, new_size, "array realloc");
        Ok(new_handle)
    }

    fn payload_len(&self, handle: Handle) -> Result<usize, AllocError> {
        self.region_of(handle).map(|(_, size)| size)
    }

    fn read(&self, handle: Handle, offset: usize, dst: &mut [u8]) -> Result<(), AllocError> {
        let (region, size) = self.region_of(handle)?;
        let range = check_bounds(handle, offset, dst.len(), size)?;
        self.sys.read(region, HEADER + range.start, dst)
    }

    fn write(&mut self, handle: Handle, offset: usize, src: &[u8]) -> Result<(), AllocError> {
        let (region, size) = self.region_of(handle)?;
        let range = check_bounds(handle, offset, src.len(), size)?;
        self.sys.write(region, HEADER + range.start, src)
    }
}

impl BulkFree for ArrayAllocator {
    fn free_all(&mut self) {
        let mut released = 0usize;
        for slot in self.ledger.iter() {
            match slot {
                Ok(Some(region)) => match self.sys.free(region) {
                    Ok(()) => released += 1,
                    Err(err) => error!(%region, %err, "array free_all could not free region"),
                },
                Ok(None) => {}
                Err(err) => error!(%err, "array free_all could not read ledger"),
            }
        }
        debug!(released, ledger = self.ledger.len(), "array free_all");
        if let Err(err) = self.ledger.release() {
            error!(%err, "array free_all could not release ledger");
        }
        self.live = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_records_index_in_header_and_ledger() {
        let mut array = ArrayAllocator::new();
        let a = array.alloc(2, 4).unwrap();
        let b = array.alloc(1, 1).unwrap();
        assert_eq!(array.ledger_len(), 2);
        assert_eq!(array.live_count(), 2);
        assert_eq!(array.resolve(a).unwrap().1, 0);
        assert_eq!(array.resolve(b).unwrap().1, 1);
        assert_eq!(array.payload_len(a).unwrap(), 8);
    }

    #[test]
    fn second_free_is_reported_once() {
        let mut array = ArrayAllocator::new();
        let h = array.alloc(1, 16).unwrap();
        assert_eq!(array.free(h), Ok(()));
        assert_eq!(array.free(h), Err(AllocError::DoubleFree { handle: h }));
        assert_eq!(array.live_count(), 0);
    }

    #[test]
    fn header_slot_mismatch_is_double_free() {
        let mut array = ArrayAllocator::new();
        let h = array.alloc(1, 8).unwrap();
        let (region, index) = array.resolve(h).unwrap();
        array.ledger.set(index, None).unwrap();
        assert_eq!(array.free(h), Err(AllocError::DoubleFree { handle: h }));
        assert!(array.sys.contains(region));
    }

    #[test]
    fn unknown_handles_are_invalid() {
        let mut array = ArrayAllocator::new();
        let tiny = Handle::new(4).unwrap();
        assert_eq!(array.free(tiny), Err(AllocError::InvalidHandle { handle: tiny }));
        let far = Handle::new(0x10).unwrap();
        assert_eq!(array.free(far), Err(AllocError::InvalidHandle { handle: far }));
    }

    #[test]
    fn interior_pointer_is_invalid_before_and_after_free() {
        let mut array = ArrayAllocator::new();
        let h = array.alloc(4, 4).unwrap();
        let interior = h.offset(4).unwrap();
        assert_eq!(array.free(interior), Err(AllocError::InvalidHandle { handle: interior }));
        array.free(h).unwrap();
        assert_eq!(array.free(interior), Err(AllocError::InvalidHandle { handle: interior }));
        assert_eq!(array.free(h), Err(AllocError::DoubleFree { handle: h }));
    }

    #[test]
    fn realloc_vacates_old_slot_and_appends() {
        let mut array = ArrayAllocator::new();
        let h = array.alloc(1, 4).unwrap();
        array.write(h, 0, &[1, 2, 3, 4]).unwrap();
        let moved = array.realloc(h, 100).unwrap();
        assert_ne!(moved, h);
        assert_eq!(array.ledger_len(), 2);
        assert_eq!(array.ledger.get(0).unwrap(), Some(None));
        assert_eq!(array.resolve(moved).unwrap().1, 1);
        let mut buf = [0u8; 4];
        array.read(moved, 0, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(array.free(h), Err(AllocError::DoubleFree { handle: h }));
        assert_eq!(array.live_count(), 1);
    }

    #[test]
    fn free_all_releases_live_regions_and_ledger() {
        let mut array = ArrayAllocator::new();
        let handles: Vec<_> = (0..10).map(|_| array.alloc(1, 32).unwrap()).collect();
        array.free(handles[3]).unwrap();
        array.free_all();
        assert_eq!(array.live_count(), 0);
        assert_eq!(array.ledger_len(), 0);
        assert_eq!(array.sys.live_count(), 0);
        assert_eq!(array.ledger.allocator().live_count(), 0);
        let again = array.alloc(1, 8).unwrap();
        assert_eq!(array.resolve(again).unwrap().1, 0);
    }
}

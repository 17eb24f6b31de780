//! The bump-pointer arena allocator.
//!
//! Allocation walks the block chain from the current block, placing each
//! node at the first block whose cursor leaves room and appending a fresh
//! block when none does. Individual frees are no-ops; memory comes back in
//! bulk through [`Arena::reset`] (keep the blocks, rewind every cursor) or
//! [`BulkFree::free_all`] (drop the blocks).
//!
//! The most recent node can grow in place while its block has room, which
//! makes the push-then-realloc pattern of growable containers cheap.

use cairn_core::error::{check_bounds, checked_size};
use cairn_core::layout::{word_aligned, WORD};
use cairn_core::{AllocError, Allocator, BulkFree, Handle};
use tracing::{debug, error, trace, warn};

use crate::block::{Block, BlockChain, NodeHeader, HEADER};
use crate::config::{ArenaConfig, OversizePolicy};

/// Position of a node in the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct NodeRef {
    block: usize,
    offset: usize,
}

/// A resolved, validated handle.
#[derive(Clone, Copy, Debug)]
struct Node {
    at: NodeRef,
    header: NodeHeader,
}

impl Node {
    fn payload(&self) -> usize {
        self.at.offset + HEADER
    }
}

/// Bump-pointer arena over a chain of fixed-capacity blocks.
pub struct Arena {
    config: ArenaConfig,
    chain: BlockChain,
    /// Block new allocations start searching from.
    current: usize,
    /// The most recent allocation, eligible for in-place growth.
    latest: Option<NodeRef>,
    released: bool,
}

impl Arena {
    /// Create an arena with one pre-allocated block.
    pub fn new(config: ArenaConfig) -> Result<Self, AllocError> {
        config.validate()?;
        let mut chain = BlockChain::new();
        chain.push(config.block_bytes())?;
        Ok(Self {
            config,
            chain,
            current: 0,
            latest: None,
            released: false,
        })
    }

    /// Create an arena with the given block size and default policy.
    pub fn with_block_size(block_size: usize) -> Result<Self, AllocError> {
        Self::new(ArenaConfig::new(block_size))
    }

    /// Rewind every block without releasing memory.
    ///
    /// All outstanding handles become invalid. Repeating an allocation
    /// sequence after a reset yields the same addresses.
    pub fn reset(&mut self) {
        self.chain.reset();
        self.current = 0;
        self.latest = None;
        debug!(blocks = self.chain.len(), "arena reset");
    }

    /// The arena's configuration.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Number of blocks in the chain.
    pub fn block_count(&self) -> usize {
        self.chain.len()
    }

    /// Bytes consumed by nodes (headers and padding included) across all
    /// blocks.
    pub fn used_bytes(&self) -> usize {
        self.chain.iter().map(|b| b.cursor()).sum()
    }

    /// Total block capacity in bytes.
    pub fn capacity_bytes(&self) -> usize {
        self.chain.iter().map(|b| b.capacity()).sum()
    }

    /// Index of the block that owns `handle`.
    pub fn block_of(&self, handle: Handle) -> Result<usize, AllocError> {
        self.resolve(handle).map(|node| node.at.block)
    }

    /// Whether [`BulkFree::free_all`] has released the arena.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// The payload behind `handle`.
    pub fn bytes(&self, handle: Handle) -> Result<&[u8], AllocError> {
        let node = self.resolve(handle)?;
        let block = self.block(node.at.block)?;
        let start = node.payload();
        Ok(&block.data()[start..start + node.header.size as usize])
    }

    /// Mutable view of the payload behind `handle`.
    pub fn bytes_mut(&mut self, handle: Handle) -> Result<&mut [u8], AllocError> {
        let node = self.resolve(handle)?;
        let start = node.payload();
        let end = start + node.header.size as usize;
        let block = self
            .chain
            .get_mut(node.at.block)
            .ok_or(AllocError::InvalidHandle { handle })?;
        Ok(&mut block.data_mut()[start..end])
    }

    fn block(&self, index: usize) -> Result<&Block, AllocError> {
        self.chain.get(index).ok_or(AllocError::Released)
    }

    fn ensure_live(&self) -> Result<(), AllocError> {
        if self.released {
            Err(AllocError::Released)
        } else {
            Ok(())
        }
    }

    /// Map a handle to its node, rejecting addresses that are not the
    /// payload start of a node below its block's cursor.
    ///
    /// The block is located by the node header address. A zero-size
    /// payload at the very end of a block sits one past the block's data.
    fn resolve(&self, handle: Handle) -> Result<Node, AllocError> {
        self.ensure_live()?;
        let invalid = AllocError::InvalidHandle { handle };
        let node_addr = handle
            .addr()
            .checked_sub(HEADER as u64)
            .ok_or(invalid.clone())?;
        let index = self.chain.locate(node_addr).ok_or(invalid.clone())?;
        let block = self.block(index)?;
        let node = (node_addr - block.base()) as usize;
        let offset = node + HEADER;
        let cursor = block.cursor();
        if node % WORD != 0 || node + HEADER > cursor {
            return Err(invalid);
        }
        let header = block.header(node);
        let next = header.next as usize;
        if next > cursor || offset + header.size as usize > next {
            return Err(invalid);
        }
        Ok(Node {
            at: NodeRef {
                block: index,
                offset: node,
            },
            header,
        })
    }

    fn node_bytes(requested: usize, count: usize, elem_size: usize) -> Result<usize, AllocError> {
        requested
            .checked_add(HEADER)
            .and_then(word_aligned)
            .ok_or(AllocError::SizeOverflow { count, elem_size })
    }

    fn place(&mut self, requested: usize, aligned: usize) -> Result<NodeRef, AllocError> {
        let block_bytes = self.config.block_bytes();
        let too_big = AllocError::CapacityExceeded {
            requested: aligned,
            capacity: block_bytes,
        };
        let payload = u32::try_from(requested).map_err(|_| too_big.clone())?;

        if aligned > block_bytes {
            return match self.config.oversize {
                OversizePolicy::Reject => {
                    error!(requested, block_bytes, "arena request larger than a block");
                    Err(too_big)
                }
                OversizePolicy::DedicatedBlock => {
                    if aligned > u32::MAX as usize {
                        error!(requested, "arena request larger than any block");
                        return Err(too_big);
                    }
                    let index = self.chain.push(aligned)?;
                    let offset = self
                        .chain
                        .get_mut(index)
                        .and_then(|b| b.bump(payload, aligned))
                        .ok_or(too_big)?;
                    Ok(NodeRef {
                        block: index,
                        offset,
                    })
                }
            };
        }

        let mut index = self.current;
        loop {
            let block = self.chain.get_mut(index).ok_or(AllocError::Released)?;
            if let Some(offset) = block.bump(payload, aligned) {
                self.current = index;
                return Ok(NodeRef {
                    block: index,
                    offset,
                });
            }
            index += 1;
            warn!(
                block = index,
                requested, "arena allocation overflowed into the next block"
            );
            if index == self.chain.len() {
                self.chain.push(block_bytes)?;
            }
        }
    }

    fn handle_of(&self, at: NodeRef) -> Result<Handle, AllocError> {
        let base = self.block(at.block)?.base();
        Handle::new(base + (at.offset + HEADER) as u64).ok_or(AllocError::Released)
    }
}

impl Allocator for Arena {
    fn alloc(&mut self, count: usize, elem_size: usize) -> Result<Handle, AllocError> {
        self.ensure_live()?;
        let requested = checked_size(count, elem_size)?;
        let aligned = Self::node_bytes(requested, count, elem_size)?;
        let at = self.place(requested, aligned)?;
        self.latest = Some(at);
        let handle = self.handle_of(at)?;
        trace!(%handle, requested, block = at.block, "arena alloc");
        Ok(handle)
    }

    fn free(&mut self, handle: Handle) -> Result<(), AllocError> {
        if let Err(err) = self.resolve(handle) {
            error!(%handle, %err, "arena free rejected");
            return Err(err);
        }
        Ok(())
    }

    fn realloc(&mut self, handle: Handle, new_size: usize) -> Result<Handle, AllocError> {
        let node = match self.resolve(handle) {
            Ok(node) => node,
            Err(err) => {
                error!(%handle, %err, "arena realloc rejected");
                return Err(err);
            }
        };
        let old_size = node.header.size as usize;
        let aligned = Self::node_bytes(new_size, new_size, 1)?;
        let is_latest = self.latest == Some(node.at);

        if let Ok(size) = u32::try_from(new_size) {
            let block = self
                .chain
                .get_mut(node.at.block)
                .ok_or(AllocError::Released)?;
            let end = node.at.offset + aligned;
            if is_latest && end <= block.capacity() {
                if new_size > old_size {
                    let start = node.payload();
                    block.data_mut()[start + old_size..start + new_size].fill(0);
                }
                block.set_header(
                    node.at.offset,
                    NodeHeader {
                        next: end as u32,
                        size,
                    },
                );
                trace!(%handle, old_size, new_size, "arena realloc in place");
                return Ok(handle);
            }
            if new_size <= old_size {
                block.set_header(
                    node.at.offset,
                    NodeHeader {
                        next: node.header.next,
                        size,
                    },
                );
                trace!(%handle, old_size, new_size, "arena shrink in place");
                return Ok(handle);
            }
        }

        let moved = self.alloc(new_size, 1)?;
        let dst = self.resolve(moved)?;
        self.chain.copy(
            (node.at.block, node.payload()),
            (dst.at.block, dst.payload()),
            old_size.min(new_size),
        );
        trace!(from = %handle, to = %moved, new_size, "arena realloc moved");
        Ok(moved)
    }

    fn payload_len(&self, handle: Handle) -> Result<usize, AllocError> {
        self.resolve(handle).map(|node| node.header.size as usize)
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

impl BulkFree for Arena {
    fn free_all(&mut self) {
        debug!(
            blocks = self.chain.len(),
            bytes = self.capacity_bytes(),
            "arena free_all"
        );
        self.chain.clear();
        self.current = 0;
        self.latest = None;
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Arena {
        Arena::with_block_size(64).unwrap()
    }

    #[test]
    fn alloc_places_nodes_back_to_back() {
        let mut arena = small();
        let a = arena.alloc(1, 4).unwrap();
        let b = arena.alloc(1, 4).unwrap();
        assert_eq!(b.addr() - a.addr(), 16);
        assert_eq!(arena.used_bytes(), 32);
        assert_eq!(arena.payload_len(a).unwrap(), 4);
    }

    #[test]
    fn payload_is_zeroed_and_writable() {
        let mut arena = small();
        let h = arena.alloc(3, 2).unwrap();
        assert_eq!(arena.bytes(h).unwrap(), &[0; 6]);
        arena.write(h, 2, &[7, 8]).unwrap();
        assert_eq!(arena.bytes(h).unwrap(), &[0, 0, 7, 8, 0, 0]);
        let err = arena.write(h, 5, &[1, 2]).unwrap_err();
        assert!(matches!(err, AllocError::OutOfBounds { .. }));
    }

    #[test]
    fn zero_sized_alloc_gets_a_distinct_handle() {
        let mut arena = small();
        let a = arena.alloc(0, 8).unwrap();
        let b = arena.alloc(0, 8).unwrap();
        assert_ne!(a, b);
        assert_eq!(arena.payload_len(a).unwrap(), 0);
    }

    #[test]
    fn overflow_chains_a_new_block() {
        let mut arena = small();
        arena.alloc(1, 40).unwrap();
        let h = arena.alloc(1, 40).unwrap();
        assert_eq!(arena.block_count(), 2);
        assert_eq!(arena.block_of(h).unwrap(), 1);
    }

    #[test]
    fn oversize_is_rejected_by_default() {
        let mut arena = small();
        let err = arena.alloc(1, 57).unwrap_err();
        assert_eq!(
            err,
            AllocError::CapacityExceeded {
                requested: 72,
                capacity: 64
            }
        );
        assert_eq!(arena.block_count(), 1);
        assert_eq!(arena.used_bytes(), 0);
    }

    #[test]
    fn exact_fit_succeeds() {
        let mut arena = small();
        let h = arena.alloc(1, 56).unwrap();
        assert_eq!(arena.block_of(h).unwrap(), 0);
        assert_eq!(arena.used_bytes(), 64);
    }

    #[test]
    fn dedicated_block_holds_oversize_request() {
        let config = ArenaConfig::new(64).with_oversize(OversizePolicy::DedicatedBlock);
        let mut arena = Arena::new(config).unwrap();
        let small = arena.alloc(1, 8).unwrap();
        let big = arena.alloc(1, 100).unwrap();
        assert_eq!(arena.block_count(), 2);
        assert_eq!(arena.block_of(big).unwrap(), 1);
        assert_eq!(arena.payload_len(big).unwrap(), 100);
        let next = arena.alloc(1, 8).unwrap();
        assert_eq!(arena.block_of(next).unwrap(), 0);
        assert_eq!(next.addr() - small.addr(), 16);
    }

    #[test]
    fn latest_grows_in_place() {
        let mut arena = small();
        let h = arena.alloc(1, 4).unwrap();
        arena.write(h, 0, &[1, 2, 3, 4]).unwrap();
        let same = arena.realloc(h, 20).unwrap();
        assert_eq!(same, h);
        assert_eq!(&arena.bytes(h).unwrap()[..6], &[1, 2, 3, 4, 0, 0]);
        assert_eq!(arena.used_bytes(), 32);
    }

    #[test]
    fn latest_grow_past_block_moves() {
        let mut arena = small();
        arena.alloc(1, 8).unwrap();
        let h = arena.alloc(1, 8).unwrap();
        arena.write(h, 0, &[9; 8]).unwrap();
        let moved = arena.realloc(h, 48).unwrap();
        assert_ne!(moved, h);
        assert_eq!(arena.block_of(moved).unwrap(), 1);
        assert_eq!(&arena.bytes(moved).unwrap()[..8], &[9; 8]);
        assert!(arena.bytes(moved).unwrap()[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn older_node_grows_by_moving() {
        let mut arena = small();
        let a = arena.alloc(1, 4).unwrap();
        arena.write(a, 0, &[5, 6, 7, 8]).unwrap();
        arena.alloc(1, 4).unwrap();
        let moved = arena.realloc(a, 8).unwrap();
        assert_ne!(moved, a);
        assert_eq!(&arena.bytes(moved).unwrap()[..4], &[5, 6, 7, 8]);
    }

    #[test]
    fn older_node_shrinks_in_place() {
        let mut arena = small();
        let a = arena.alloc(1, 8).unwrap();
        arena.write(a, 0, &[1; 8]).unwrap();
        let b = arena.alloc(1, 8).unwrap();
        assert_eq!(arena.realloc(a, 3).unwrap(), a);
        assert_eq!(arena.bytes(a).unwrap(), &[1, 1, 1]);
        assert_eq!(arena.payload_len(b).unwrap(), 8);
    }

    #[test]
    fn free_is_a_noop_but_validates() {
        let mut arena = small();
        let h = arena.alloc(1, 4).unwrap();
        arena.free(h).unwrap();
        arena.free(h).unwrap();
        assert_eq!(arena.used_bytes(), 16);
        let bogus = Handle::new(h.addr() + 1).unwrap();
        assert_eq!(arena.free(bogus), Err(AllocError::InvalidHandle { handle: bogus }));
        let foreign = Handle::new(8).unwrap();
        assert!(arena.free(foreign).is_err());
    }

    #[test]
    fn reset_rewinds_and_invalidates() {
        let mut arena = small();
        let h = arena.alloc(1, 40).unwrap();
        arena.alloc(1, 40).unwrap();
        arena.reset();
        assert_eq!(arena.block_count(), 2);
        assert_eq!(arena.used_bytes(), 0);
        assert_eq!(arena.payload_len(h), Err(AllocError::InvalidHandle { handle: h }));
    }

    #[test]
    fn free_all_releases_blocks() {
        let mut arena = small();
        let h = arena.alloc(1, 4).unwrap();
        arena.free_all();
        assert!(arena.is_released());
        assert_eq!(arena.block_count(), 0);
        assert_eq!(arena.alloc(1, 4), Err(AllocError::Released));
        assert_eq!(arena.realloc(h, 8), Err(AllocError::Released));
    }

    #[test]
    fn size_overflow_is_reported() {
        let mut arena = small();
        assert!(matches!(
            arena.alloc(usize::MAX, 2),
            Err(AllocError::SizeOverflow { .. })
        ));
    }
}

//! Fixed-capacity arena blocks and the append-only chain that holds them.
//!
//! A [`Block`] is a zeroed byte buffer with a bump cursor. Every allocation
//! is a node: an 8-byte [`NodeHeader`] followed by the payload, padded to
//! the word size. The header of the most recent node records where the next
//! node may begin, so the cursor is never stored separately.
//!
//! Each block owns a slice of a private virtual address space starting at
//! its `base`. Bases grow monotonically along the chain, so the block that
//! owns an address is found by binary search.

use cairn_core::layout::{align_up, SIZE_1K};
use cairn_core::AllocError;
use tracing::{debug, error};

/// Size of a node header in bytes.
pub const HEADER: usize = 8;

/// Address of the first block's first byte.
const FIRST_BASE: u64 = 0x1000;
/// Block bases are spaced to a multiple of this.
const BASE_SPACING: usize = 4 * SIZE_1K;

/// The 8-byte header stored in front of every node's payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeHeader {
    /// Block offset where the following node may begin.
    pub next: u32,
    /// Requested payload length in bytes.
    pub size: u32,
}

impl NodeHeader {
    fn read(bytes: &[u8]) -> Self {
        let mut next = [0u8; 4];
        let mut size = [0u8; 4];
        next.copy_from_slice(&bytes[0..4]);
        size.copy_from_slice(&bytes[4..8]);
        Self {
            next: u32::from_le_bytes(next),
            size: u32::from_le_bytes(size),
        }
    }

    fn write(self, bytes: &mut [u8]) {
        bytes[0..4].copy_from_slice(&self.next.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.size.to_le_bytes());
    }
}

/// A single contiguous block with bump allocation.
///
/// Blocks are never freed while the arena lives; `reset` rewinds them.
pub struct Block {
    base: u64,
    data: Box<[u8]>,
    /// Offset of the most recent node, `None` while the block is empty.
    last: Option<usize>,
}

impl Block {
    fn new(base: u64, capacity: usize) -> Result<Self, AllocError> {
        let mut data = Vec::new();
        if data.try_reserve_exact(capacity).is_err() {
            error!(capacity, "arena block allocation failed");
            return Err(AllocError::OutOfMemory {
                requested: capacity,
            });
        }
        data.resize(capacity, 0);
        Ok(Self {
            base,
            data: data.into_boxed_slice(),
            last: None,
        })
    }

    /// First virtual address of this block.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Offset where the next node would start.
    pub fn cursor(&self) -> usize {
        self.last.map_or(0, |node| self.header(node).next as usize)
    }

    /// Offset of the most recent node.
    pub fn last(&self) -> Option<usize> {
        self.last
    }

    /// Whether `addr` falls inside this block.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr - self.base < self.data.len() as u64
    }

    /// Header of the node at `node`.
    pub fn header(&self, node: usize) -> NodeHeader {
        NodeHeader::read(&self.data[node..node + HEADER])
    }

    pub(crate) fn set_header(&mut self, node: usize, header: NodeHeader) {
        header.write(&mut self.data[node..node + HEADER]);
    }

    /// Raw block bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Place a node of `aligned` bytes carrying a `requested`-byte payload
    /// at the cursor. Returns the node offset, or `None` when it does not
    /// fit. The payload and padding are zeroed.
    pub(crate) fn bump(&mut self, requested: u32, aligned: usize) -> Option<usize> {
        let node = self.cursor();
        let end = node.checked_add(aligned)?;
        if end > self.data.len() {
            return None;
        }
        self.set_header(
            node,
            NodeHeader {
                next: end as u32,
                size: requested,
            },
        );
        self.data[node + HEADER..end].fill(0);
        self.last = Some(node);
        Some(node)
    }

    /// Rewind the cursor to the start. Contents are left in place and
    /// zeroed again by the next `bump` over them.
    pub(crate) fn reset(&mut self) {
        self.last = None;
    }
}

/// Append-only list of [`Block`]s with monotonically increasing bases.
pub struct BlockChain {
    blocks: Vec<Block>,
    next_base: u64,
}

impl BlockChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            next_base: FIRST_BASE,
        }
    }

    /// Append a zeroed block of `capacity` bytes, returning its index.
    pub fn push(&mut self, capacity: usize) -> Result<usize, AllocError> {
        let span = align_up(capacity, BASE_SPACING)
            .ok_or(AllocError::OutOfMemory { requested: capacity })?;
        let base = self.next_base;
        let next_base = base
            .checked_add(span as u64)
            .ok_or(AllocError::OutOfMemory { requested: capacity })?;
        self.blocks.push(Block::new(base, capacity)?);
        self.next_base = next_base;
        let index = self.blocks.len() - 1;
        debug!(index, base, capacity, "arena block created");
        Ok(index)
    }

    /// Index of the block holding `addr`.
    pub fn locate(&self, addr: u64) -> Option<usize> {
        let after = self.blocks.partition_point(|b| b.base <= addr);
        let index = after.checked_sub(1)?;
        self.blocks[index].contains(addr).then_some(index)
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the chain holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The block at `index`.
    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }

    /// Iterate blocks in chain order.
    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    /// Rewind every block.
    pub(crate) fn reset(&mut self) {
        for block in &mut self.blocks {
            block.reset();
        }
    }

    /// Drop every block. Bases are not reused afterwards.
    pub(crate) fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Copy `len` bytes from `(src_block, src_off)` to `(dst_block, dst_off)`.
    ///
    /// # Panics
    ///
    /// Panics if either range is out of bounds.
    pub(crate) fn copy(
        &mut self,
        (src_block, src_off): (usize, usize),
        (dst_block, dst_off): (usize, usize),
        len: usize,
    ) {
        if src_block == dst_block {
            self.blocks[src_block]
                .data
                .copy_within(src_off..src_off + len, dst_off);
            return;
        }
        let (src, dst) = if src_block < dst_block {
            let (lo, hi) = self.blocks.split_at_mut(dst_block);
            (&lo[src_block], &mut hi[0])
        } else {
            let (lo, hi) = self.blocks.split_at_mut(src_block);
            (&hi[0], &mut lo[dst_block])
        };
        dst.data[dst_off..dst_off + len].copy_from_slice(&src.data[src_off..src_off + len]);
    }
}

impl Default for BlockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_little_endian() {
        let mut buf = [0u8; HEADER];
        NodeHeader { next: 0x0102, size: 7 }.write(&mut buf);
        assert_eq!(buf, [0x02, 0x01, 0, 0, 7, 0, 0, 0]);
        assert_eq!(NodeHeader::read(&buf), NodeHeader { next: 0x0102, size: 7 });
    }

    #[test]
    fn block_bumps_sequentially() {
        let mut block = Block::new(FIRST_BASE, 64).unwrap();
        assert_eq!(block.cursor(), 0);
        assert_eq!(block.bump(4, 16), Some(0));
        assert_eq!(block.bump(4, 16), Some(16));
        assert_eq!(block.cursor(), 32);
        assert_eq!(block.last(), Some(16));
        assert_eq!(block.header(16), NodeHeader { next: 32, size: 4 });
    }

    #[test]
    fn block_refuses_when_full() {
        let mut block = Block::new(FIRST_BASE, 32).unwrap();
        assert!(block.bump(20, 32).is_some());
        assert!(block.bump(0, 8).is_none());
    }

    #[test]
    fn bump_zeroes_reused_bytes() {
        let mut block = Block::new(FIRST_BASE, 32).unwrap();
        let node = block.bump(8, 16).unwrap();
        block.data_mut()[node + HEADER..node + 16].fill(0xAB);
        block.reset();
        let again = block.bump(8, 16).unwrap();
        assert_eq!(again, node);
        assert!(block.data()[again + HEADER..again + 16].iter().all(|&b| b == 0));
    }

    #[test]
    fn chain_bases_increase_and_locate_finds_owner() {
        let mut chain = BlockChain::new();
        let a = chain.push(64).unwrap();
        let b = chain.push(10_000).unwrap();
        let c = chain.push(64).unwrap();
        let (ba, bb, bc) = (
            chain.get(a).unwrap().base(),
            chain.get(b).unwrap().base(),
            chain.get(c).unwrap().base(),
        );
        assert!(ba < bb && bb < bc);
        assert!(bb - ba >= 64 && bc - bb >= 10_000);
        assert_eq!(chain.locate(ba + 63), Some(a));
        assert_eq!(chain.locate(ba + 64), None);
        assert_eq!(chain.locate(bb + 9_999), Some(b));
        assert_eq!(chain.locate(ba - 1), None);
    }

    #[test]
    fn copy_across_and_within_blocks() {
        let mut chain = BlockChain::new();
        chain.push(32).unwrap();
        chain.push(32).unwrap();
        chain.get_mut(1).unwrap().data_mut()[0..4].copy_from_slice(&[1, 2, 3, 4]);
        chain.copy((1, 0), (0, 8), 4);
        assert_eq!(&chain.get(0).unwrap().data()[8..12], &[1, 2, 3, 4]);
        chain.copy((0, 8), (0, 20), 4);
        assert_eq!(&chain.get(0).unwrap().data()[20..24], &[1, 2, 3, 4]);
        chain.copy((0, 20), (1, 16), 4);
        assert_eq!(&chain.get(1).unwrap().data()[16..20], &[1, 2, 3, 4]);
    }
}

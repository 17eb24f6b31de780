//! Arena configuration parameters.

use cairn_core::layout::{word_aligned, SIZE_8K};
use cairn_core::AllocError;

use crate::block::HEADER;

/// What the arena does with a single request larger than a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OversizePolicy {
    /// Fail with [`AllocError::CapacityExceeded`].
    #[default]
    Reject,
    /// Append a block sized exactly for the request and place it there.
    DedicatedBlock,
}

/// Configuration for the arena allocator.
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Capacity of each block in bytes, node headers included.
    ///
    /// Default: 8 KiB. Rounded up to the word size. Must hold at least one
    /// node header plus one word and fit in a `u32`.
    pub block_size: usize,

    /// Handling of requests that cannot fit in one block.
    pub oversize: OversizePolicy,
}

impl ArenaConfig {
    /// Default block capacity in bytes.
    pub const DEFAULT_BLOCK_SIZE: usize = SIZE_8K;

    /// Create a config with the given block size and the default
    /// oversize policy.
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            oversize: OversizePolicy::default(),
        }
    }

    /// Replace the oversize policy.
    pub fn with_oversize(mut self, oversize: OversizePolicy) -> Self {
        self.oversize = oversize;
        self
    }

    /// Block capacity after word rounding.
    pub fn block_bytes(&self) -> usize {
        word_aligned(self.block_size).unwrap_or(usize::MAX)
    }

    /// Check every parameter is in range.
    pub fn validate(&self) -> Result<(), AllocError> {
        if self.block_size == 0 {
            return Err(AllocError::InvalidConfig {
                reason: "block_size must be non-zero",
            });
        }
        let bytes = self.block_bytes();
        if bytes > u32::MAX as usize {
            return Err(AllocError::InvalidConfig {
                reason: "block_size must fit in u32",
            });
        }
        if bytes <= HEADER {
            return Err(AllocError::InvalidConfig {
                reason: "block_size must exceed the node header",
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BLOCK_SIZE)
    }
}

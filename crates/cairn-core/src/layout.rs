//! Size constants and alignment helpers.

/// Machine word size used for header and block alignment.
pub const WORD: usize = std::mem::size_of::<u64>();

/// Default initial element capacity of the containers.
pub const SIZE_MIN: usize = 8;
/// One kibibyte.
pub const SIZE_1K: usize = 1024;
/// Eight kibibytes.
pub const SIZE_8K: usize = 8 * SIZE_1K;
/// One mebibyte.
pub const SIZE_1M: usize = SIZE_1K * SIZE_1K;
/// Eight mebibytes.
pub const SIZE_8M: usize = 8 * SIZE_1M;
/// One gibibyte.
pub const SIZE_1G: usize = SIZE_1M * SIZE_1K;

/// Round `bytes` up to the next multiple of `align` (a power of two).
///
/// Returns `None` on overflow.
#[inline]
pub fn align_up(bytes: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    bytes.checked_add(align - 1).map(|b| b & !(align - 1))
}

/// Round `bytes` up to the word size.
#[inline]
pub fn word_aligned(bytes: usize) -> Option<usize> {
    align_up(bytes, WORD)
}

//! Hashing for the open-addressing map.
//!
//! Integers and handles hash to themselves: the map reduces the hash
//! modulo its capacity and linear probing absorbs clustering. Byte strings
//! use FNV-1a.

use crate::handle::Handle;

/// FNV-1a offset basis for 64-bit.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;

/// FNV-1a over a byte string.
#[inline]
pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |hash, &b| (hash ^ b as u64).wrapping_mul(FNV_PRIME))
}

/// Hash used to pick a value's home bucket.
pub trait MapHash {
    /// The 64-bit hash of `self`.
    fn map_hash(&self) -> u64;
}

macro_rules! impl_identity_hash {
    ($($ty:ty),* $(,)?) => {
        $(
            impl MapHash for $ty {
                #[inline]
                fn map_hash(&self) -> u64 {
                    *self as u64
                }
            }
        )*
    };
}

impl_identity_hash!(u8, u16, u32, u64, usize, i8, i16, i32, i64);

impl MapHash for Handle {
    #[inline]
    fn map_hash(&self) -> u64 {
        self.addr()
    }
}

impl MapHash for str {
    fn map_hash(&self) -> u64 {
        fnv1a(self.as_bytes())
    }
}

impl MapHash for [u8] {
    fn map_hash(&self) -> u64 {
        fnv1a(self)
    }
}

impl<T: MapHash + ?Sized> MapHash for &T {
    fn map_hash(&self) -> u64 {
        (**self).map_hash()
    }
}

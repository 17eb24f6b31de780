//! Fixed-width element codec for allocator-backed containers.
//!
//! Containers store their elements inside allocator payloads, which are
//! plain bytes. [`Element`] is the little-endian encoding that moves a value
//! in and out of those bytes. Every encoding has a fixed width, so element
//! `i` always lives at byte offset `i * SIZE`.

use crate::handle::Handle;

/// A value with a fixed-width byte encoding.
///
/// `decode` must accept any byte pattern `encode` can produce. Callers
/// always pass slices of exactly `SIZE` bytes.
pub trait Element: Copy {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Write the encoding into `out[..SIZE]`.
    fn encode(&self, out: &mut [u8]);

    /// Read a value back from `bytes[..SIZE]`.
    fn decode(bytes: &[u8]) -> Self;
}

#[inline]
fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&bytes[..N]);
    buf
}

macro_rules! impl_element_le {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Element for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn encode(&self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode(bytes: &[u8]) -> Self {
                    <$ty>::from_le_bytes(le_array(bytes))
                }
            }
        )*
    };
}

impl_element_le!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl Element for usize {
    const SIZE: usize = 8;

    fn encode(&self, out: &mut [u8]) {
        (*self as u64).encode(out);
    }

    fn decode(bytes: &[u8]) -> Self {
        u64::decode(bytes) as usize
    }
}

impl Element for bool {
    const SIZE: usize = 1;

    fn encode(&self, out: &mut [u8]) {
        out[0] = u8::from(*self);
    }

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

// Address zero is never a handle, so it doubles as the `None` encoding.
impl Element for Option<Handle> {
    const SIZE: usize = 8;

    fn encode(&self, out: &mut [u8]) {
        self.map_or(0, Handle::addr).encode(out);
    }

    fn decode(bytes: &[u8]) -> Self {
        Handle::new(u64::decode(bytes))
    }
}

impl Element for Handle {
    const SIZE: usize = 8;

    fn encode(&self, out: &mut [u8]) {
        self.addr().encode(out);
    }

    /// # Panics
    ///
    /// Panics on an all-zero encoding, which no live handle produces.
    fn decode(bytes: &[u8]) -> Self {
        match Handle::new(u64::decode(bytes)) {
            Some(h) => h,
            None => panic!("decoded a null handle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: Element + PartialEq + std::fmt::Debug>(v: T) {
        let mut buf = vec![0u8; T::SIZE];
        v.encode(&mut buf);
        assert_eq!(T::decode(&buf), v);
    }

    #[test]
    fn integers_are_little_endian() {
        let mut buf = [0u8; 4];
        0x0102_0304u32.encode(&mut buf);
        assert_eq!(buf, [4, 3, 2, 1]);
    }

    #[test]
    fn signed_and_float_values_survive() {
        roundtrip(-7i32);
        roundtrip(i64::MIN);
        roundtrip(1.5f64);
        roundtrip(true);
        roundtrip(usize::MAX);
    }

    #[test]
    fn option_handle_uses_zero_for_none() {
        let mut buf = [0xffu8; 8];
        None::<Handle>.encode(&mut buf);
        assert_eq!(buf, [0; 8]);
        assert_eq!(Option::<Handle>::decode(&buf), None);
        roundtrip(Handle::new(0x1010));
    }

    #[test]
    #[should_panic(expected = "null handle")]
    fn zero_bytes_are_not_a_handle() {
        let _ = Handle::decode(&[0u8; 8]);
    }
}

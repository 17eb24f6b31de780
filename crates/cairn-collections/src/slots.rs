//! Element-granular access to an allocator payload.
//!
//! A container's storage is one allocation holding `capacity` encoded
//! elements back to back. Slot `i` starts at byte `i * T::SIZE`.

use cairn_core::error::checked_size;
use cairn_core::{AllocError, Allocator, Element, Handle};
use smallvec::{smallvec, SmallVec};

/// Elements up to this width are encoded without touching the heap.
const INLINE_BYTES: usize = 32;

type Scratch = SmallVec<[u8; INLINE_BYTES]>;

/// Decode slot `index` of `storage`.
pub(crate) fn load<T: Element, A: Allocator + ?Sized>(
    alloc: &A,
    storage: Handle,
    index: usize,
) -> Result<T, AllocError> {
    let mut buf: Scratch = smallvec![0; T::SIZE];
    alloc.read(storage, checked_size(index, T::SIZE)?, &mut buf)?;
    Ok(T::decode(&buf))
}

/// Encode `value` into slot `index` of `storage`.
pub(crate) fn store<T: Element, A: Allocator + ?Sized>(
    alloc: &mut A,
    storage: Handle,
    index: usize,
    value: &T,
) -> Result<(), AllocError> {
    let mut buf: Scratch = smallvec![0; T::SIZE];
    value.encode(&mut buf);
    alloc.write(storage, checked_size(index, T::SIZE)?, &buf)
}

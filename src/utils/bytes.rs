//! Byte-slice helpers for bounds-oriented parsing.
//!
//! Two layers, as usual:
//! - **Option layer** (`read_*`): return `Option<T>`, for callers that map failures themselves
//!   (e.g. the payload header parser, which only reports "not a bitmap").
//! - **Result layer** (`*_r`): map `None` to `PackError::Truncated`.
//!
//! All numeric reads are **little-endian**. Offsets are `usize`, relative to the slice passed in.

use crate::err::PackError;

/// Read `N` raw bytes at `offset`.
pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    let bytes: [u8; N] = buf.get(offset..end)?.try_into().ok()?;
    Some(bytes)
}

/// Read a `u16` (little-endian) at `offset`.
pub(crate) fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_le_bytes(read_array::<2>(buf, offset)?))
}

/// Read a `u32` (little-endian) at `offset`.
pub(crate) fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_le_bytes(read_array::<4>(buf, offset)?))
}

#[inline]
fn truncated(what: &'static str, offset: usize, need: usize, len: usize) -> PackError {
    PackError::Truncated {
        what,
        offset: offset as u64,
        need,
        have: len.saturating_sub(offset),
    }
}

pub(crate) fn slice_r<'a>(
    buf: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], PackError> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))?;
    buf.get(offset..end)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))
}

/// Read a `u16` (little-endian) at `offset`, or return `PackError::Truncated`.
pub(crate) fn read_u16_le_r(buf: &[u8], offset: usize, what: &'static str) -> Result<u16, PackError> {
    read_u16_le(buf, offset).ok_or_else(|| truncated(what, offset, 2, buf.len()))
}

/// Read a `u32` (little-endian) at `offset`, or return `PackError::Truncated`.
pub(crate) fn read_u32_le_r(buf: &[u8], offset: usize, what: &'static str) -> Result<u32, PackError> {
    read_u32_le(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

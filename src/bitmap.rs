//! Bitmap payloads and a reference [`BitmapBinder`].
//!
//! Payloads written by [`PackBuilder`](crate::PackBuilder) are small image records:
//!
//! | offset | field                                         |
//! |--------|-----------------------------------------------|
//! | 0      | `row_stride` (u16)                            |
//! | 2      | `version << 12 \| format << 1` (u16)          |
//! | 4      | `x`, `y`, `width`, `height` (u16 each)        |
//! | 12     | `row_stride * height` pixel bytes             |
//! | ...    | palette, one ARGB2222 byte per colour         |
//!
//! All fields are little-endian.

use crate::binder::BitmapBinder;
use crate::utils::bytes;

use hashbrown::HashMap;
use log::{debug, warn};
use serde::Serialize;
use std::num::NonZeroU32;

pub const BITMAP_VERSION: u8 = 1;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PixelFormat {
    Bit8 = 1,
    Bit1Palettized = 2,
    Bit2Palettized = 3,
    Bit4Palettized = 4,
}

impl PixelFormat {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(PixelFormat::Bit8),
            2 => Some(PixelFormat::Bit1Palettized),
            3 => Some(PixelFormat::Bit2Palettized),
            4 => Some(PixelFormat::Bit4Palettized),
            _ => None,
        }
    }

    pub fn bits_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bit8 => 8,
            PixelFormat::Bit1Palettized => 1,
            PixelFormat::Bit2Palettized => 2,
            PixelFormat::Bit4Palettized => 4,
        }
    }

    /// Bytes per row of `width` pixels; rows are padded to a whole byte.
    pub fn row_stride(self, width: u16) -> u16 {
        let bits = usize::from(width) * self.bits_per_pixel();
        bits.div_ceil(8) as u16
    }

    /// Largest palette this format can index, `None` for direct colour.
    pub fn max_palette_len(self) -> Option<usize> {
        match self {
            PixelFormat::Bit8 => None,
            other => Some(1 << other.bits_per_pixel()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitmapHeader {
    pub row_stride: u16,
    pub version: u8,
    pub format: PixelFormat,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl BitmapHeader {
    pub const SIZE: usize = 12;

    pub fn new(format: PixelFormat, width: u16, height: u16) -> Self {
        BitmapHeader {
            row_stride: format.row_stride(width),
            version: BITMAP_VERSION,
            format,
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Parse the header at the start of `data`. Returns `None` if it is short or the format is unknown.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let version_and_format = bytes::read_u16_le(data, 2)?;
        let format = PixelFormat::from_u8(((version_and_format >> 1) & 0x7) as u8)?;

        Some(BitmapHeader {
            row_stride: bytes::read_u16_le(data, 0)?,
            version: (version_and_format >> 12) as u8,
            format,
            x: bytes::read_u16_le(data, 4)?,
            y: bytes::read_u16_le(data, 6)?,
            width: bytes::read_u16_le(data, 8)?,
            height: bytes::read_u16_le(data, 10)?,
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let version_and_format = (u16::from(self.version) << 12) | ((self.format as u16) << 1);
        let fields = [
            self.row_stride,
            version_and_format,
            self.x,
            self.y,
            self.width,
            self.height,
        ];

        let mut out = [0u8; Self::SIZE];
        for (chunk, field) in out.chunks_exact_mut(2).zip(fields) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        out
    }

    /// Size of the pixel rows following the header.
    pub fn pixel_data_len(&self) -> usize {
        usize::from(self.row_stride) * usize::from(self.height)
    }
}

/// A bitmap bound by [`BitmapArena`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundBitmap {
    pub header: BitmapHeader,
    /// Bytes available after the pixel rows (palette and padding).
    pub trailing_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitmapHandle(NonZeroU32);

impl BitmapHandle {
    pub fn id(self) -> u32 {
        self.0.get()
    }
}

/// Reference binder: validates payload records and keeps their metadata by handle.
#[derive(Debug, Default)]
pub struct BitmapArena {
    next_id: u32,
    live: HashMap<BitmapHandle, BoundBitmap>,
    binds: usize,
    releases: usize,
}

impl BitmapArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: BitmapHandle) -> Option<&BoundBitmap> {
        self.live.get(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn bind_count(&self) -> usize {
        self.binds
    }

    pub fn release_count(&self) -> usize {
        self.releases
    }

    fn validate(data: &[u8], width: u16, height: u16) -> Option<BoundBitmap> {
        let header = BitmapHeader::parse(data)?;

        if header.width != width || header.height != height {
            debug!(
                "declared size {width}x{height} does not match payload size {}x{}",
                header.width, header.height
            );
            return None;
        }

        if header.row_stride < header.format.row_stride(header.width) {
            debug!(
                "row stride {} too small for {} pixels of {:?}",
                header.row_stride, header.width, header.format
            );
            return None;
        }

        let pixels_end = BitmapHeader::SIZE.checked_add(header.pixel_data_len())?;
        if pixels_end > data.len() {
            debug!(
                "pixel data truncated: need {pixels_end} bytes, have {}",
                data.len()
            );
            return None;
        }

        Some(BoundBitmap {
            header,
            trailing_len: data.len() - pixels_end,
        })
    }
}

impl BitmapBinder for BitmapArena {
    type Handle = BitmapHandle;

    fn bind(&mut self, data: &[u8], width: u16, height: u16) -> Option<BitmapHandle> {
        let bitmap = Self::validate(data, width, height)?;

        self.next_id = self.next_id.checked_add(1)?;
        let handle = BitmapHandle(NonZeroU32::new(self.next_id)?);

        self.live.insert(handle, bitmap);
        self.binds += 1;
        Some(handle)
    }

    fn release(&mut self, handle: BitmapHandle) {
        if self.live.remove(&handle).is_some() {
            self.releases += 1;
        } else {
            warn!("release of unknown bitmap handle {}", handle.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn payload(header: BitmapHeader, extra: usize) -> Vec<u8> {
        let mut out = header.to_bytes().to_vec();
        out.resize(out.len() + header.pixel_data_len() + extra, 0xAA);
        out
    }

    #[test]
    fn test_row_strides() {
        assert_eq!(PixelFormat::Bit8.row_stride(5), 5);
        assert_eq!(PixelFormat::Bit4Palettized.row_stride(5), 3);
        assert_eq!(PixelFormat::Bit2Palettized.row_stride(5), 2);
        assert_eq!(PixelFormat::Bit1Palettized.row_stride(9), 2);

        assert_eq!(PixelFormat::Bit2Palettized.max_palette_len(), Some(4));
        assert_eq!(PixelFormat::Bit8.max_palette_len(), None);
    }

    #[test]
    fn test_header_layout() {
        let header = BitmapHeader::new(PixelFormat::Bit4Palettized, 3, 2);
        let raw = header.to_bytes();

        // row stride 2, version 1 + format 4 => 0x1008
        assert_eq!(raw, [2, 0, 0x08, 0x10, 0, 0, 0, 0, 3, 0, 2, 0]);
        assert_eq!(BitmapHeader::parse(&raw), Some(header));
    }

    #[test]
    fn test_unknown_format_is_not_a_bitmap() {
        let mut raw = BitmapHeader::new(PixelFormat::Bit8, 1, 1).to_bytes();
        raw[2] = 7 << 1;
        assert_eq!(BitmapHeader::parse(&raw), None);
    }

    #[test]
    fn test_arena_binds_and_releases() {
        let mut arena = BitmapArena::new();
        let data = payload(BitmapHeader::new(PixelFormat::Bit2Palettized, 6, 4), 4);

        let a = arena.bind(&data, 6, 4).unwrap();
        let b = arena.bind(&data, 6, 4).unwrap();
        assert_ne!(a, b);
        assert_eq!(arena.get(a).unwrap().trailing_len, 4);
        assert_eq!(arena.live_count(), 2);

        arena.release(a);
        arena.release(a);
        assert_eq!(arena.release_count(), 1);
        assert_eq!(arena.live_count(), 1);
    }

    #[test]
    fn test_arena_rejects_bad_payloads() {
        let mut arena = BitmapArena::new();
        let header = BitmapHeader::new(PixelFormat::Bit8, 4, 4);
        let data = payload(header, 0);

        assert!(arena.bind(&data, 4, 5).is_none());
        assert!(arena.bind(&data[..data.len() - 1], 4, 4).is_none());
        assert!(arena.bind(&data[..6], 4, 4).is_none());
        assert_eq!(arena.bind_count(), 0);
    }
}

//! Encoder for pack blobs.

use crate::bitmap::{BitmapHeader, PixelFormat};
use crate::descriptor::RawEntry;
use crate::err::BuildError;
use crate::pack_header::PackHeader;

use log::debug;

/// Quantise an 8-bit channel to 2 bits.
fn quantize_channel(c: u8) -> u8 {
    match c {
        0..85 => 0,
        85..170 => 1,
        170..255 => 2,
        255 => 3,
    }
}

/// Pack an RGBA pixel into one ARGB2222 byte.
pub fn pack_pixel(r: u8, g: u8, b: u8, a: u8) -> u8 {
    (quantize_channel(a) << 6)
        | (quantize_channel(r) << 4)
        | (quantize_channel(g) << 2)
        | quantize_channel(b)
}

/// An image ready to go into a pack: one ARGB2222 byte per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackImage {
    name: String,
    width: u16,
    height: u16,
    pixels: Vec<u8>,
}

impl PackImage {
    pub fn new(
        name: impl Into<String>,
        width: usize,
        height: usize,
        pixels: Vec<u8>,
    ) -> Result<Self, BuildError> {
        let name = name.into();

        if width == 0 || height == 0 {
            return Err(BuildError::EmptyImage { name });
        }

        let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(BuildError::DimensionsTooLarge {
                name,
                width,
                height,
            });
        };

        if pixels.len() != width * height {
            return Err(BuildError::PixelCountMismatch {
                name,
                width,
                height,
                found: pixels.len(),
            });
        }

        Ok(PackImage {
            name,
            width: w,
            height: h,
            pixels,
        })
    }

    /// Build from 8-bit RGBA data (4 bytes per pixel), quantising every channel to 2 bits.
    pub fn from_rgba8(
        name: impl Into<String>,
        width: usize,
        height: usize,
        rgba: &[u8],
    ) -> Result<Self, BuildError> {
        let pixels = rgba
            .chunks_exact(4)
            .map(|p| pack_pixel(p[0], p[1], p[2], p[3]))
            .collect();
        Self::new(name, width, height, pixels)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Encode as a bitmap payload, picking the smallest format that fits the colour count.
    pub fn encode(&self) -> Vec<u8> {
        let palette = palette_of(&self.pixels);
        let format = match palette.len() {
            0..=2 => PixelFormat::Bit1Palettized,
            3..=4 => PixelFormat::Bit2Palettized,
            5..=16 => PixelFormat::Bit4Palettized,
            _ => PixelFormat::Bit8,
        };
        debug!(
            "{} has {} colors, encoding as {:?}",
            self.name,
            palette.len(),
            format
        );

        let header = BitmapHeader::new(format, self.width, self.height);
        let mut out = Vec::with_capacity(BitmapHeader::SIZE + header.pixel_data_len() + palette.len());
        out.extend_from_slice(&header.to_bytes());

        if format == PixelFormat::Bit8 {
            out.extend_from_slice(&self.pixels);
            return out;
        }

        let bits = format.bits_per_pixel();
        let stride = usize::from(header.row_stride);
        for row in self.pixels.chunks_exact(usize::from(self.width)) {
            let mut packed = vec![0u8; stride];
            for (i, pixel) in row.iter().enumerate() {
                let index = palette.iter().position(|c| c == pixel).unwrap_or(0) as u8;
                let bit = i * bits;
                // Leftmost pixel in the most significant bits.
                packed[bit / 8] |= index << (8 - bits - bit % 8);
            }
            out.extend_from_slice(&packed);
        }
        out.extend_from_slice(&palette);
        out
    }
}

/// Distinct colours in first-seen order.
fn palette_of(pixels: &[u8]) -> Vec<u8> {
    let mut seen = [false; 256];
    let mut palette = Vec::new();
    for &p in pixels {
        if !seen[usize::from(p)] {
            seen[usize::from(p)] = true;
            palette.push(p);
        }
    }
    palette
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSource {
    Fixed(u32),
    /// CRC-32 of everything after the pack header.
    Crc32,
}

struct Entry {
    width: u16,
    height: u16,
    payload: Vec<u8>,
}

/// Lays out header, resource table and payloads into a single blob.
pub struct PackBuilder {
    tag: TagSource,
    entries: Vec<Entry>,
}

impl Default for PackBuilder {
    fn default() -> Self {
        PackBuilder::new(TagSource::Crc32)
    }
}

impl PackBuilder {
    pub fn new(tag: TagSource) -> Self {
        PackBuilder {
            tag,
            entries: Vec::new(),
        }
    }

    pub fn push_image(&mut self, image: &PackImage) -> &mut Self {
        self.push_raw(image.width, image.height, image.encode())
    }

    /// Append a payload as-is; the loader hands these bytes to the binder unchanged.
    pub fn push_raw(&mut self, width: u16, height: u16, payload: impl Into<Vec<u8>>) -> &mut Self {
        self.entries.push(Entry {
            width,
            height,
            payload: payload.into(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, BuildError> {
        let count = u32::try_from(self.entries.len()).map_err(|_| BuildError::PackTooLarge)?;
        let table_end = PackHeader::SIZE + self.entries.len() * RawEntry::SIZE;

        let mut body = Vec::new();
        let mut offset = table_end;
        for (index, entry) in self.entries.iter().enumerate() {
            // Every offset must point inside the blob, so no payload may be empty.
            if entry.payload.is_empty() {
                return Err(BuildError::EmptyPayload { index });
            }
            let raw = RawEntry {
                width: entry.width,
                height: entry.height,
                offset: u32::try_from(offset).map_err(|_| BuildError::PackTooLarge)?,
            };
            body.extend_from_slice(&raw.to_bytes());
            offset += entry.payload.len();
        }
        if u32::try_from(offset).is_err() {
            return Err(BuildError::PackTooLarge);
        }

        for entry in &self.entries {
            body.extend_from_slice(&entry.payload);
        }

        let tag = match self.tag {
            TagSource::Fixed(tag) => tag,
            TagSource::Crc32 => crc32fast::hash(&body),
        };

        let header = PackHeader {
            tag,
            resource_count: count,
        };
        let mut blob = Vec::with_capacity(PackHeader::SIZE + body.len());
        blob.extend_from_slice(&header.to_bytes());
        blob.extend_from_slice(&body);
        Ok(blob)
    }
}

use crate::err::{PackError, Result};
use crate::pack_header::PackHeader;
use crate::utils::bytes;

use serde::Serialize;

/// A single table slot, as stored in the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RawEntry {
    pub width: u16,
    pub height: u16,
    /// Byte offset of the pixel payload, relative to the start of the blob.
    pub offset: u32,
}

impl RawEntry {
    pub const SIZE: usize = 2 + 2 + 4;

    fn read(blob: &[u8], at: usize) -> Result<Self> {
        Ok(RawEntry {
            width: bytes::read_u16_le_r(blob, at, "resource width")?,
            height: bytes::read_u16_le_r(blob, at + 2, "resource height")?,
            offset: bytes::read_u32_le_r(blob, at + 4, "resource offset")?,
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..2].copy_from_slice(&self.width.to_le_bytes());
        out[2..4].copy_from_slice(&self.height.to_le_bytes());
        out[4..].copy_from_slice(&self.offset.to_le_bytes());
        out
    }
}

/// What a descriptor currently holds.
///
/// A slot starts as `Raw`, becomes `Bound` once the binder accepted it, and `Empty` once its
/// handle has been released. It never goes back to `Raw`.
#[derive(Debug, PartialEq, Eq)]
pub enum Payload<H> {
    Raw(u32),
    Bound(H),
    Empty,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ResourceDescriptor<H> {
    pub(crate) width: u16,
    pub(crate) height: u16,
    pub(crate) payload: Payload<H>,
}

impl<H> ResourceDescriptor<H> {
    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn payload(&self) -> &Payload<H> {
        &self.payload
    }

    pub fn handle(&self) -> Option<&H> {
        match &self.payload {
            Payload::Bound(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.handle().is_some()
    }

    /// Take the handle out of the slot, leaving it `Empty`.
    pub(crate) fn take_handle(&mut self) -> Option<H> {
        match std::mem::replace(&mut self.payload, Payload::Empty) {
            Payload::Bound(handle) => Some(handle),
            other => {
                self.payload = other;
                None
            }
        }
    }
}

impl<H> From<RawEntry> for ResourceDescriptor<H> {
    fn from(entry: RawEntry) -> Self {
        ResourceDescriptor {
            width: entry.width,
            height: entry.height,
            payload: Payload::Raw(entry.offset),
        }
    }
}

/// Decoded header plus raw resource table of a blob. Nothing is bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackLayout {
    pub header: PackHeader,
    pub entries: Vec<RawEntry>,
}

impl PackLayout {
    /// Decode the header and the whole table.
    ///
    /// The table must fit inside `blob`; payload offsets are *not* checked here.
    pub fn parse(blob: &[u8]) -> Result<Self> {
        let header = PackHeader::parse(blob)?;
        let entries = read_table(blob, &header)?;
        Ok(PackLayout { header, entries })
    }

    /// First byte after the resource table.
    pub fn table_end(&self) -> usize {
        table_end(&self.header).unwrap_or(usize::MAX)
    }
}

fn table_end(header: &PackHeader) -> Option<usize> {
    (header.resource_count as usize)
        .checked_mul(RawEntry::SIZE)?
        .checked_add(PackHeader::SIZE)
}

/// Read `header.resource_count` entries following the header.
pub(crate) fn read_table(blob: &[u8], header: &PackHeader) -> Result<Vec<RawEntry>> {
    let end = table_end(header)
        .filter(|end| *end <= blob.len())
        .ok_or(PackError::TableOutOfBounds {
            count: header.resource_count,
            table_end: PackHeader::SIZE as u64
                + u64::from(header.resource_count) * RawEntry::SIZE as u64,
            blob_size: blob.len(),
        })?;

    let mut out = Vec::with_capacity(header.resource_count as usize);
    for at in (PackHeader::SIZE..end).step_by(RawEntry::SIZE) {
        out.push(RawEntry::read(blob, at)?);
    }
    Ok(out)
}

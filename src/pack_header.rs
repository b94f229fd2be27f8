use crate::err::{PackError, Result};
use crate::utils::bytes;

use log::debug;
use serde::Serialize;

/// Raw tag value meaning "do not validate the tag".
pub const NO_CHECKSUM: u32 = 0;

/// Fixed-size prefix of every pack blob.
///
/// `tag` is either a content checksum or reserved, depending on how the pack was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PackHeader {
    pub tag: u32,
    pub resource_count: u32,
}

/// Caller-supplied expectation for [`PackHeader::tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpectedTag {
    #[default]
    Skip,
    Exactly(u32),
}

impl From<u32> for ExpectedTag {
    fn from(raw: u32) -> Self {
        if raw == NO_CHECKSUM {
            ExpectedTag::Skip
        } else {
            ExpectedTag::Exactly(raw)
        }
    }
}

impl From<Option<u32>> for ExpectedTag {
    fn from(tag: Option<u32>) -> Self {
        match tag {
            Some(tag) => ExpectedTag::Exactly(tag),
            None => ExpectedTag::Skip,
        }
    }
}

impl PackHeader {
    pub const SIZE: usize = 4 + 4;

    /// Decode the header from the start of `blob`. Does not look past the first [`Self::SIZE`] bytes.
    pub fn parse(blob: &[u8]) -> Result<Self> {
        let _ = bytes::slice_r(blob, 0, Self::SIZE, "pack header")?;

        Ok(PackHeader {
            tag: bytes::read_u32_le_r(blob, 0, "pack tag")?,
            resource_count: bytes::read_u32_le_r(blob, 4, "pack resource count")?,
        })
    }

    /// Decode and validate the tag against `expected`.
    pub fn parse_checked(blob: &[u8], expected: ExpectedTag) -> Result<Self> {
        let header = Self::parse(blob)?;
        header.validate(expected)?;
        Ok(header)
    }

    pub fn validate(&self, expected: ExpectedTag) -> Result<()> {
        match expected {
            ExpectedTag::Exactly(tag) if tag != self.tag => {
                debug!(
                    "[PREZR] Version fail: file {:#010x} vs expected {:#010x}",
                    self.tag, tag
                );
                Err(PackError::ChecksumMismatch {
                    expected: tag,
                    found: self.tag,
                })
            }
            _ => Ok(()),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..4].copy_from_slice(&self.tag.to_le_bytes());
        out[4..].copy_from_slice(&self.resource_count.to_le_bytes());
        out
    }
}

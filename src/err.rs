use crate::storage::ResourceId;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PackError>;

/// Everything that can go wrong while loading a pack.
///
/// Kinds up to and including `TableOutOfBounds` are *early* failures: the pack is left in its
/// zero state and any buffer acquired for it has already been released. `BitmapBindFailure` and
/// `OffsetOutOfBounds` are *partial* failures: the descriptors before `index` stay bound and the
/// caller must still destroy the pack.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PackError {
    #[error("resource {id} has zero size")]
    ZeroSizeBlob { id: ResourceId },

    #[error("out of memory while trying to allocate {requested} bytes ({} available)", DisplayAvailable(.available))]
    OutOfMemory {
        requested: usize,
        available: Option<usize>,
    },

    #[error("failed to load resource {id}: copied {copied} of {expected} bytes")]
    ResourceLoadFailure {
        id: ResourceId,
        expected: usize,
        copied: usize,
    },

    #[error("pack tag mismatch: file has {found:#010x}, expected {expected:#010x}")]
    ChecksumMismatch { expected: u32, found: u32 },

    #[error("container of {capacity} bytes is too small for a {required} byte resource")]
    ContainerTooSmall { capacity: usize, required: usize },

    #[error("buffer too small for {what} at offset {offset} (need {need} bytes, have {have})")]
    Truncated {
        what: &'static str,
        offset: u64,
        need: usize,
        have: usize,
    },

    #[error("resource table of {count} entries ends at {table_end}, past the blob end ({blob_size})")]
    TableOutOfBounds {
        count: u32,
        table_end: u64,
        blob_size: usize,
    },

    #[error("failed to create bitmap {index}")]
    BitmapBindFailure { index: u32 },

    #[error("bitmap {index} points at offset {offset}, outside of [{min}, {blob_size})")]
    OffsetOutOfBounds {
        index: u32,
        offset: u32,
        min: usize,
        blob_size: usize,
    },
}

impl PackError {
    /// The descriptor index a partial failure stopped at.
    pub fn failed_index(&self) -> Option<u32> {
        match self {
            PackError::BitmapBindFailure { index } | PackError::OffsetOutOfBounds { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.failed_index().is_some()
    }
}

struct DisplayAvailable<'a>(&'a Option<usize>);

impl std::fmt::Display for DisplayAvailable<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(bytes) => write!(f, "{bytes}"),
            None => f.write_str("unknown"),
        }
    }
}

/// Errors raised while encoding a pack with [`crate::PackBuilder`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("image `{name}` has no pixels")]
    EmptyImage { name: String },

    #[error("image `{name}` is {width}x{height} but has {found} pixels")]
    PixelCountMismatch {
        name: String,
        width: usize,
        height: usize,
        found: usize,
    },

    #[error("image `{name}` is too large ({width}x{height}), dimensions must fit in 16 bits")]
    DimensionsTooLarge {
        name: String,
        width: usize,
        height: usize,
    },

    #[error("entry {index} has an empty payload")]
    EmptyPayload { index: usize },

    #[error("pack does not fit the 32-bit offset space")]
    PackTooLarge,
}

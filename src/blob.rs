use crate::allocator::BlobAllocator;
use crate::err::{PackError, Result};
use crate::storage::{ResourceId, ResourceStorage};

use log::debug;
use std::ops::Deref;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The loader allocated the buffer and frees it on destroy.
    Owned,
    /// The caller supplied the buffer; the loader never frees it.
    Borrowed,
}

/// The full bytes of one pack, in one of the two ownership modes.
///
/// The mode is fixed when the blob is acquired.
#[derive(Debug)]
pub enum Blob<'buf> {
    Owned(Vec<u8>),
    Borrowed(&'buf [u8]),
}

impl Blob<'_> {
    pub fn ownership(&self) -> Ownership {
        match self {
            Blob::Owned(_) => Ownership::Owned,
            Blob::Borrowed(_) => Ownership::Borrowed,
        }
    }

    /// Hand the buffer back: owned buffers go to `allocator`, borrowed ones are left alone.
    pub(crate) fn release(self, allocator: &mut impl BlobAllocator) {
        match self {
            Blob::Owned(buffer) => allocator.free(buffer),
            Blob::Borrowed(_) => {}
        }
    }
}

impl Deref for Blob<'_> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        match self {
            Blob::Owned(buffer) => buffer,
            Blob::Borrowed(buffer) => buffer,
        }
    }
}

fn blob_size(storage: &impl ResourceStorage, id: ResourceId) -> Result<usize> {
    let size = storage.size(id);
    if size == 0 {
        debug!("[PREZR] zero size blob");
        return Err(PackError::ZeroSizeBlob { id });
    }
    Ok(size)
}

fn copy_resource(
    storage: &impl ResourceStorage,
    id: ResourceId,
    dest: &mut [u8],
) -> Result<()> {
    let copied = storage.load(id, dest);
    if copied != dest.len() {
        debug!("[PREZR] Failed to load resource {id}");
        return Err(PackError::ResourceLoadFailure {
            id,
            expected: dest.len(),
            copied,
        });
    }
    Ok(())
}

/// Allocate a buffer of exactly the resource size and copy the resource into it.
///
/// On failure nothing stays allocated.
pub(crate) fn acquire_owned(
    storage: &impl ResourceStorage,
    allocator: &mut impl BlobAllocator,
    id: ResourceId,
) -> Result<Blob<'static>> {
    let size = blob_size(storage, id)?;

    let Some(mut buffer) = allocator.alloc(size) else {
        let available = allocator.bytes_free();
        debug!(
            "[PREZR] OOM while trying to allocate {size} bytes ({} available)",
            available.map_or_else(|| "unknown".to_owned(), |n| n.to_string())
        );
        return Err(PackError::OutOfMemory {
            requested: size,
            available,
        });
    };

    if let Err(e) = copy_resource(storage, id, &mut buffer) {
        allocator.free(buffer);
        return Err(e);
    }

    Ok(Blob::Owned(buffer))
}

/// Copy the resource into the front of a caller-supplied buffer.
///
/// A buffer smaller than the resource is rejected before anything is written to it.
pub(crate) fn acquire_borrowed<'buf>(
    storage: &impl ResourceStorage,
    id: ResourceId,
    buffer: &'buf mut [u8],
) -> Result<Blob<'buf>> {
    let size = blob_size(storage, id)?;

    if buffer.len() < size {
        debug!(
            "[PREZR] container too small: {} bytes for a {size} byte resource",
            buffer.len()
        );
        return Err(PackError::ContainerTooSmall {
            capacity: buffer.len(),
            required: size,
        });
    }

    let dest = &mut buffer[..size];
    copy_resource(storage, id, dest)?;

    Ok(Blob::Borrowed(dest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::SystemAllocator;
    use crate::storage::MemoryStorage;

    struct ShortStorage;

    impl ResourceStorage for ShortStorage {
        fn size(&self, _id: ResourceId) -> usize {
            16
        }

        fn load(&self, _id: ResourceId, dest: &mut [u8]) -> usize {
            dest.len() / 2
        }
    }

    #[test]
    fn test_owned_acquisition_copies_everything() {
        let storage = MemoryStorage::new().with_resource(1, vec![9u8; 12]);
        let mut heap = SystemAllocator::new();

        let blob = acquire_owned(&storage, &mut heap, 1).unwrap();
        assert_eq!(blob.ownership(), Ownership::Owned);
        assert_eq!(&*blob, &[9u8; 12]);
        assert_eq!(heap.stats().allocations, 1);
    }

    #[test]
    fn test_zero_size_does_not_allocate() {
        let storage = MemoryStorage::new();
        let mut heap = SystemAllocator::new();

        let err = acquire_owned(&storage, &mut heap, 3).unwrap_err();
        assert_eq!(err, PackError::ZeroSizeBlob { id: 3 });
        assert_eq!(heap.stats().allocations, 0);
    }

    #[test]
    fn test_out_of_memory_reports_available_heap() {
        let storage = MemoryStorage::new().with_resource(1, vec![0u8; 64]);
        let mut heap = SystemAllocator::with_budget(32);

        let err = acquire_owned(&storage, &mut heap, 1).unwrap_err();
        assert_eq!(
            err,
            PackError::OutOfMemory {
                requested: 64,
                available: Some(32),
            }
        );
    }

    #[test]
    fn test_short_copy_frees_owned_buffer() {
        let mut heap = SystemAllocator::new();

        let err = acquire_owned(&ShortStorage, &mut heap, 1).unwrap_err();
        assert_eq!(
            err,
            PackError::ResourceLoadFailure {
                id: 1,
                expected: 16,
                copied: 8,
            }
        );
        assert_eq!(heap.stats().frees, 1);
        assert_eq!(heap.stats().bytes_in_use, 0);
    }

    #[test]
    fn test_borrowed_acquisition_uses_prefix_of_container() {
        let storage = MemoryStorage::new().with_resource(1, vec![5u8; 4]);
        let mut container = [0u8; 10];

        let blob = acquire_borrowed(&storage, 1, &mut container).unwrap();
        assert_eq!(blob.ownership(), Ownership::Borrowed);
        assert_eq!(blob.len(), 4);
        assert_eq!(container, [5, 5, 5, 5, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_small_container_is_left_untouched() {
        let storage = MemoryStorage::new().with_resource(1, vec![5u8; 12]);
        let mut container = [7u8; 10];

        let err = acquire_borrowed(&storage, 1, &mut container).unwrap_err();
        assert_eq!(
            err,
            PackError::ContainerTooSmall {
                capacity: 10,
                required: 12,
            }
        );
        assert_eq!(container, [7u8; 10]);
    }
}

use crate::allocator::BlobAllocator;
use crate::binder::BitmapBinder;
use crate::blob::{Blob, Ownership};
use crate::descriptor::ResourceDescriptor;
use crate::pack_header::PackHeader;

use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackState {
    Uninitialized,
    Loading,
    Ready,
    /// Binding stopped at `index`; entries before it are bound.
    Failed { index: u32 },
    Destroyed,
}

/// A loaded (or loading, or torn down) set of bitmaps.
///
/// A pack is created empty with [`Pack::new`], filled by
/// [`PackLoader::init_owned`](crate::PackLoader::init_owned) or
/// [`PackLoader::init_borrowed`](crate::PackLoader::init_borrowed), and emptied again by
/// [`PackLoader::destroy`](crate::PackLoader::destroy). `'buf` is the lifetime of a borrowed
/// container; owned packs can use any lifetime.
///
/// A borrowed pack holds its container mutably borrowed until the pack itself is dropped, even
/// after `destroy`. Scope the pack (or `drop` it) before reading the container again:
///
/// ```
/// # use prezr::{BitmapArena, MemoryStorage, Pack, PackBuilder, PackImage, PackLoader, SystemAllocator};
/// # let mut builder = PackBuilder::default();
/// # builder.push_image(&PackImage::new("dot", 1, 1, vec![0xFF]).unwrap());
/// # let blob = builder.encode().unwrap();
/// # let size = blob.len();
/// # let storage = MemoryStorage::new().with_resource(1, blob);
/// let mut loader = PackLoader::new(storage, SystemAllocator::new(), BitmapArena::new());
/// let mut container = vec![0u8; size];
/// {
///     let mut pack = Pack::new();
///     loader.init_borrowed(&mut pack, 1, &mut container).unwrap();
///     loader.destroy(&mut pack);
/// }
/// assert_ne!(container, vec![0u8; size]);
/// ```
#[derive(Debug)]
pub struct Pack<'buf, H> {
    state: PackState,
    header: Option<PackHeader>,
    resources: Vec<ResourceDescriptor<H>>,
    blob: Option<Blob<'buf>>,
}

impl<H> Default for Pack<'_, H> {
    fn default() -> Self {
        Pack {
            state: PackState::Uninitialized,
            header: None,
            resources: Vec::new(),
            blob: None,
        }
    }
}

impl<'buf, H> Pack<'buf, H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PackState {
        self.state
    }

    pub fn header(&self) -> Option<&PackHeader> {
        self.header.as_ref()
    }

    pub fn resources(&self) -> &[ResourceDescriptor<H>] {
        &self.resources
    }

    pub fn get(&self, index: usize) -> Option<&ResourceDescriptor<H>> {
        self.resources.get(index)
    }

    /// Handle of resource `index`, if it is bound.
    pub fn bitmap(&self, index: usize) -> Option<&H> {
        self.resources.get(index)?.handle()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn ownership(&self) -> Option<Ownership> {
        self.blob.as_ref().map(Blob::ownership)
    }

    /// The raw pack bytes, while the pack holds them.
    pub fn blob(&self) -> Option<&[u8]> {
        self.blob.as_deref()
    }

    pub fn bound_count(&self) -> usize {
        self.resources.iter().filter(|r| r.is_bound()).count()
    }

    /// True for a pack that holds nothing: never initialised, failed early, or destroyed.
    pub fn is_zeroed(&self) -> bool {
        self.header.is_none() && self.blob.is_none() && self.resources.is_empty()
    }

    pub(crate) fn begin(
        &mut self,
        header: PackHeader,
        blob: Blob<'buf>,
        resources: Vec<ResourceDescriptor<H>>,
    ) {
        debug_assert!(self.is_zeroed());
        self.state = PackState::Loading;
        self.header = Some(header);
        self.blob = Some(blob);
        self.resources = resources;
    }

    /// Split borrow for the fixup pass: the bytes stay read-only while the table is mutated.
    pub(crate) fn parts_mut(&mut self) -> (&[u8], &mut [ResourceDescriptor<H>]) {
        (self.blob.as_deref().unwrap_or(&[]), &mut self.resources)
    }

    pub(crate) fn finish(&mut self, failed_at: Option<u32>) {
        self.state = match failed_at {
            Some(index) => PackState::Failed { index },
            None => PackState::Ready,
        };
    }

    /// Release every bound handle, give an owned buffer back, and reset to the zero state.
    ///
    /// Safe to call on a pack in any state, any number of times.
    pub(crate) fn destroy<B, A>(&mut self, binder: &mut B, allocator: &mut A)
    where
        B: BitmapBinder<Handle = H>,
        A: BlobAllocator,
    {
        if self.header.is_none() {
            // Never loaded, or already torn down.
            if self.state != PackState::Uninitialized {
                self.state = PackState::Destroyed;
            }
            return;
        }

        let mut released = 0usize;
        for res in self.resources.iter_mut() {
            if let Some(handle) = res.take_handle() {
                binder.release(handle);
                released += 1;
            }
        }

        if let Some(blob) = self.blob.take() {
            blob.release(allocator);
        }

        info!(
            "[PREZR] destroyed pack ({released} of {} bitmaps released)",
            self.resources.len()
        );

        self.header = None;
        self.resources = Vec::new();
        self.state = PackState::Destroyed;
    }
}

impl<H> Drop for Pack<'_, H> {
    fn drop(&mut self) {
        let bound = self.bound_count();
        if bound > 0 {
            warn!("[PREZR] pack dropped without destroy, {bound} bitmaps were never released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::SystemAllocator;
    use crate::descriptor::{Payload, RawEntry};

    #[derive(Default)]
    struct Releases(Vec<u32>);

    impl BitmapBinder for Releases {
        type Handle = u32;

        fn bind(&mut self, _data: &[u8], _width: u16, _height: u16) -> Option<u32> {
            None
        }

        fn release(&mut self, handle: u32) {
            self.0.push(handle);
        }
    }

    fn loaded_pack(heap: &mut SystemAllocator) -> Pack<'static, u32> {
        let mut pack = Pack::new();
        let mut resources: Vec<ResourceDescriptor<u32>> = (0..3)
            .map(|_| {
                RawEntry {
                    width: 1,
                    height: 1,
                    offset: 32,
                }
                .into()
            })
            .collect();
        resources[0].payload = Payload::Bound(10);
        resources[1].payload = Payload::Bound(11);

        let buffer = heap.alloc(40).unwrap();
        pack.begin(
            PackHeader {
                tag: 0,
                resource_count: 3,
            },
            Blob::Owned(buffer),
            resources,
        );
        pack.finish(Some(2));
        pack
    }

    #[test]
    fn test_destroy_releases_bound_prefix_once() {
        let mut heap = SystemAllocator::new();
        let mut binder = Releases::default();
        let mut pack = loaded_pack(&mut heap);

        assert_eq!(pack.state(), PackState::Failed { index: 2 });
        assert_eq!(pack.bound_count(), 2);

        pack.destroy(&mut binder, &mut heap);
        pack.destroy(&mut binder, &mut heap);

        assert_eq!(binder.0, vec![10, 11]);
        assert_eq!(heap.stats().frees, 1);
        assert_eq!(pack.state(), PackState::Destroyed);
        assert!(pack.is_zeroed());
    }

    #[test]
    fn test_destroy_on_fresh_pack_is_a_no_op() {
        let mut heap = SystemAllocator::new();
        let mut binder = Releases::default();
        let mut pack: Pack<'_, u32> = Pack::new();

        pack.destroy(&mut binder, &mut heap);

        assert_eq!(pack.state(), PackState::Uninitialized);
        assert!(binder.0.is_empty());
        assert_eq!(heap.stats().frees, 0);
    }
}

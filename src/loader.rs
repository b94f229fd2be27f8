use crate::allocator::BlobAllocator;
use crate::binder::BitmapBinder;
use crate::blob::{self, Blob};
use crate::descriptor::{self, ResourceDescriptor};
use crate::err::Result;
use crate::fixup;
use crate::pack::Pack;
use crate::pack_header::{ExpectedTag, PackHeader};
use crate::storage::{ResourceId, ResourceStorage};

use log::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderSettings {
    expected_tag: ExpectedTag,
    expected_resource_count: Option<u32>,
}

impl LoaderSettings {
    pub fn new() -> Self {
        LoaderSettings::default()
    }

    /// Tag that borrowed loads must carry. Owned loads pass theirs explicitly.
    pub fn expected_tag(mut self, tag: impl Into<ExpectedTag>) -> Self {
        self.expected_tag = tag.into();
        self
    }

    /// Warn when a loaded pack does not hold exactly this many resources.
    pub fn expected_resource_count(mut self, count: Option<u32>) -> Self {
        self.expected_resource_count = count;
        self
    }

    pub fn get_expected_tag(&self) -> ExpectedTag {
        self.expected_tag
    }

    pub fn get_expected_resource_count(&self) -> Option<u32> {
        self.expected_resource_count
    }
}

/// Loads packs out of `storage`, binding their bitmaps through `binder`.
///
/// The loader owns its collaborators; pass `&mut` references if they need to outlive it (all
/// three traits are implemented for references).
pub struct PackLoader<S, A, B> {
    storage: S,
    allocator: A,
    binder: B,
    settings: LoaderSettings,
}

impl<S, A, B> PackLoader<S, A, B>
where
    S: ResourceStorage,
    A: BlobAllocator,
    B: BitmapBinder,
{
    pub fn new(storage: S, allocator: A, binder: B) -> Self {
        PackLoader {
            storage,
            allocator,
            binder,
            settings: LoaderSettings::default(),
        }
    }

    pub fn with_configuration(mut self, settings: LoaderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn binder(&self) -> &B {
        &self.binder
    }

    pub fn binder_mut(&mut self) -> &mut B {
        &mut self.binder
    }

    /// Load resource `id` into a freshly allocated buffer owned by `pack`.
    ///
    /// On an early failure `pack` is left zeroed. On a partial failure (see
    /// [`PackError::is_partial`](crate::PackError::is_partial)) it holds the bitmaps bound before
    /// the failing entry and must still be passed to [`PackLoader::destroy`].
    pub fn init_owned(
        &mut self,
        pack: &mut Pack<'_, B::Handle>,
        id: ResourceId,
        expected_tag: impl Into<ExpectedTag>,
    ) -> Result<()> {
        self.reset(pack);

        let blob = blob::acquire_owned(&self.storage, &mut self.allocator, id)?;
        self.load(pack, id, blob, expected_tag.into())
    }

    /// Load resource `id` into `buffer`, which `pack` then borrows.
    ///
    /// `buffer` must be at least as large as the resource. It is never freed by the loader.
    pub fn init_borrowed<'buf>(
        &mut self,
        pack: &mut Pack<'buf, B::Handle>,
        id: ResourceId,
        buffer: &'buf mut [u8],
    ) -> Result<()> {
        self.reset(pack);

        let blob = blob::acquire_borrowed(&self.storage, id, buffer)?;
        let expected_tag = self.settings.expected_tag;
        self.load(pack, id, blob, expected_tag)
    }

    /// Release everything `pack` holds and reset it. Never fails; repeated calls do nothing.
    pub fn destroy(&mut self, pack: &mut Pack<'_, B::Handle>) {
        pack.destroy(&mut self.binder, &mut self.allocator);
    }

    fn reset(&mut self, pack: &mut Pack<'_, B::Handle>) {
        if !pack.is_zeroed() {
            warn!("[PREZR] re-initialising a loaded pack, destroying it first");
            self.destroy(pack);
        }
    }

    fn load<'buf>(
        &mut self,
        pack: &mut Pack<'buf, B::Handle>,
        id: ResourceId,
        blob: Blob<'buf>,
        expected_tag: ExpectedTag,
    ) -> Result<()> {
        let (header, resources) = match decode(&blob, expected_tag) {
            Ok(decoded) => decoded,
            Err(e) => {
                blob.release(&mut self.allocator);
                return Err(e);
            }
        };

        if let Some(expected) = self.settings.expected_resource_count {
            if expected != header.resource_count {
                warn!(
                    "[PREZR] resource {id}: pack holds {} resources, expected {expected}",
                    header.resource_count
                );
            }
        }

        debug!(
            "[PREZR] resource {id}: tag {:#010x}, {} resources, {} bytes",
            header.tag,
            header.resource_count,
            blob.len()
        );

        pack.begin(header, blob, resources);

        let (bytes, resources) = pack.parts_mut();
        let result = fixup::bind_resources(bytes, resources, &mut self.binder);
        pack.finish(result.as_ref().err().and_then(|e| e.failed_index()));

        if result.is_ok() {
            info!(
                "[PREZR] loaded resource {id} with {} bitmaps",
                header.resource_count
            );
        }
        result
    }
}

fn decode<H>(blob: &[u8], expected_tag: ExpectedTag) -> Result<(PackHeader, Vec<ResourceDescriptor<H>>)> {
    let header = PackHeader::parse_checked(blob, expected_tag)?;
    let resources = descriptor::read_table(blob, &header)?
        .into_iter()
        .map(ResourceDescriptor::from)
        .collect();
    Ok((header, resources))
}

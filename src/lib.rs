#![deny(unused_must_use)]
#![forbid(unsafe_code)]
// Don't allow dbg! prints in release.
#![cfg_attr(not(debug_assertions), deny(clippy::dbg_macro))]

//! Loader for packed bitmap resources.
//!
//! A pack is one blob: an 8-byte header, a table of `width/height/offset` entries, and the pixel
//! payloads the offsets point at. [`PackLoader`] acquires the blob from a [`ResourceStorage`]
//! (into a buffer it allocates, or one the caller lends it), validates it, and binds every entry
//! through a [`BitmapBinder`]. [`PackLoader::destroy`] gives everything back.
//!
//! ```
//! use prezr::{BitmapArena, MemoryStorage, Pack, PackBuilder, PackImage, PackLoader, SystemAllocator, TagSource};
//!
//! let mut builder = PackBuilder::new(TagSource::Fixed(7));
//! builder.push_image(&PackImage::new("dot", 1, 1, vec![0xFF]).unwrap());
//! let blob = builder.encode().unwrap();
//!
//! let storage = MemoryStorage::new().with_resource(1, blob);
//! let mut loader = PackLoader::new(storage, SystemAllocator::new(), BitmapArena::new());
//!
//! let mut pack = Pack::new();
//! loader.init_owned(&mut pack, 1, 7u32).unwrap();
//! assert!(pack.bitmap(0).is_some());
//!
//! loader.destroy(&mut pack);
//! assert!(pack.is_zeroed());
//! ```

pub mod allocator;
pub mod binder;
pub mod bitmap;
pub mod blob;
pub mod builder;
pub mod descriptor;
pub mod err;
pub mod loader;
pub mod pack;
pub mod pack_header;
pub mod storage;

mod fixup;
mod utils;

pub use allocator::{AllocStats, BlobAllocator, SystemAllocator};
pub use binder::BitmapBinder;
pub use bitmap::{BitmapArena, BitmapHandle, BitmapHeader, BoundBitmap, PixelFormat};
pub use blob::{Blob, Ownership};
pub use builder::{PackBuilder, PackImage, TagSource};
pub use descriptor::{PackLayout, Payload, RawEntry, ResourceDescriptor};
pub use err::{BuildError, PackError, Result};
pub use loader::{LoaderSettings, PackLoader};
pub use pack::{Pack, PackState};
pub use pack_header::{ExpectedTag, NO_CHECKSUM, PackHeader};
pub use storage::{FileStorage, MemoryStorage, ResourceId, ResourceStorage};

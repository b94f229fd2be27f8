//! Where pack bytes come from.
//!
//! The loader only needs two things from storage: how large a resource is, and a way to copy it
//! into a buffer the loader picked. A size of `0` means "no such resource" as far as the loader is
//! concerned.

use hashbrown::HashMap;
use log::debug;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

pub type ResourceId = u32;

pub trait ResourceStorage {
    /// Size of resource `id` in bytes.
    fn size(&self, id: ResourceId) -> usize;

    /// Copy resource `id` into `dest`, returning the number of bytes copied.
    fn load(&self, id: ResourceId, dest: &mut [u8]) -> usize;
}

impl<T: ResourceStorage + ?Sized> ResourceStorage for &T {
    fn size(&self, id: ResourceId) -> usize {
        (**self).size(id)
    }

    fn load(&self, id: ResourceId, dest: &mut [u8]) -> usize {
        (**self).load(id, dest)
    }
}

/// Resources held in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    resources: HashMap<ResourceId, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, id: ResourceId, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(id, bytes);
        self
    }

    pub fn insert(&mut self, id: ResourceId, bytes: impl Into<Vec<u8>>) {
        self.resources.insert(id, bytes.into());
    }

    pub fn get(&self, id: ResourceId) -> Option<&[u8]> {
        self.resources.get(&id).map(Vec::as_slice)
    }
}

impl ResourceStorage for MemoryStorage {
    fn size(&self, id: ResourceId) -> usize {
        self.resources.get(&id).map_or(0, Vec::len)
    }

    fn load(&self, id: ResourceId, dest: &mut [u8]) -> usize {
        let Some(bytes) = self.resources.get(&id) else {
            return 0;
        };
        let n = bytes.len().min(dest.len());
        dest[..n].copy_from_slice(&bytes[..n]);
        n
    }
}

/// Resources backed by files on disk, registered by id.
#[derive(Debug, Default, Clone)]
pub struct FileStorage {
    paths: HashMap<ResourceId, PathBuf>,
}

impl FileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, id: ResourceId, path: impl AsRef<Path>) -> Self {
        self.paths.insert(id, path.as_ref().to_path_buf());
        self
    }
}

impl ResourceStorage for FileStorage {
    fn size(&self, id: ResourceId) -> usize {
        let Some(path) = self.paths.get(&id) else {
            debug!("[PREZR] no file registered for resource {id}");
            return 0;
        };

        match std::fs::metadata(path) {
            Ok(meta) => usize::try_from(meta.len()).unwrap_or(0),
            Err(e) => {
                debug!("[PREZR] failed to stat `{}`: {e}", path.display());
                0
            }
        }
    }

    fn load(&self, id: ResourceId, dest: &mut [u8]) -> usize {
        let Some(path) = self.paths.get(&id) else {
            return 0;
        };

        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                debug!("[PREZR] failed to open `{}`: {e}", path.display());
                return 0;
            }
        };

        // Read until `dest` is full or the file ends; a short count is reported to the caller.
        let mut copied = 0;
        while copied < dest.len() {
            match file.read(&mut dest[copied..]) {
                Ok(0) => break,
                Ok(n) => copied += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("[PREZR] failed to read `{}`: {e}", path.display());
                    break;
                }
            }
        }
        copied
    }
}

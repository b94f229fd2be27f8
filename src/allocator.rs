//! Buffer acquisition for owned packs.

use log::trace;

/// Allocates and frees blob buffers.
///
/// `bytes_free` is diagnostics only: it shows up in out-of-memory reports and nowhere else.
pub trait BlobAllocator {
    /// Allocate a zero-filled buffer of exactly `size` bytes, or `None` if that is not possible.
    fn alloc(&mut self, size: usize) -> Option<Vec<u8>>;

    fn free(&mut self, buffer: Vec<u8>);

    fn bytes_free(&self) -> Option<usize> {
        None
    }
}

impl<T: BlobAllocator + ?Sized> BlobAllocator for &mut T {
    fn alloc(&mut self, size: usize) -> Option<Vec<u8>> {
        (**self).alloc(size)
    }

    fn free(&mut self, buffer: Vec<u8>) {
        (**self).free(buffer)
    }

    fn bytes_free(&self) -> Option<usize> {
        (**self).bytes_free()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocStats {
    pub allocations: usize,
    pub frees: usize,
    pub bytes_in_use: usize,
}

/// Heap allocator with an optional byte budget.
///
/// With a budget set, any allocation that would push usage past it fails, which is how small
/// devices behave and what the loader's out-of-memory path is written against.
#[derive(Debug, Default, Clone)]
pub struct SystemAllocator {
    budget: Option<usize>,
    stats: AllocStats,
}

impl SystemAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(budget: usize) -> Self {
        SystemAllocator {
            budget: Some(budget),
            stats: AllocStats::default(),
        }
    }

    pub fn stats(&self) -> AllocStats {
        self.stats
    }
}

impl BlobAllocator for SystemAllocator {
    fn alloc(&mut self, size: usize) -> Option<Vec<u8>> {
        if let Some(free) = self.bytes_free() {
            if size > free {
                return None;
            }
        }

        let mut buffer = Vec::new();
        buffer.try_reserve_exact(size).ok()?;
        buffer.resize(size, 0);

        self.stats.allocations += 1;
        self.stats.bytes_in_use += size;
        trace!("allocated {size} bytes ({} in use)", self.stats.bytes_in_use);
        Some(buffer)
    }

    fn free(&mut self, buffer: Vec<u8>) {
        self.stats.frees += 1;
        self.stats.bytes_in_use = self.stats.bytes_in_use.saturating_sub(buffer.len());
        trace!(
            "freed {} bytes ({} in use)",
            buffer.len(),
            self.stats.bytes_in_use
        );
    }

    fn bytes_free(&self) -> Option<usize> {
        self.budget
            .map(|budget| budget.saturating_sub(self.stats.bytes_in_use))
    }
}

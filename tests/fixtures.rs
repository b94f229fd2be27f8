#![allow(dead_code)]
use prezr::{BitmapBinder, PackBuilder, PackImage, ResourceId, ResourceStorage, TagSource};

use std::sync::Once;

static LOGGER_INIT: Once = Once::new();

pub const PACK_ID: u32 = 1;
pub const PACK_TAG: u32 = 0x5EED_CAFE;

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .is_test(true)
            .init();
    });
}

/// `(width, height)` of entry `i` in [`synthetic_pack`]; distinct for every `i`.
pub fn dims(i: usize) -> (u16, u16) {
    (i as u16 + 1, 2 * i as u16 + 3)
}

/// A pack of `k` entries with distinct dimensions and opaque 4-byte payloads.
pub fn synthetic_pack(k: usize) -> Vec<u8> {
    let mut builder = PackBuilder::new(TagSource::Fixed(PACK_TAG));
    for i in 0..k {
        let (w, h) = dims(i);
        builder.push_raw(w, h, vec![i as u8; 4]);
    }
    builder.encode().unwrap()
}

/// A pack of real bitmap payloads, loadable with `BitmapArena`.
pub fn bitmap_pack() -> Vec<u8> {
    let checker: Vec<u8> = (0..16).map(|i| if i % 2 == 0 { 0xC0 } else { 0xFF }).collect();
    let ramp: Vec<u8> = (0..30).map(|i| (i % 12) as u8).collect();
    let noise: Vec<u8> = (0..64u32).map(|i| (i * 37 % 251) as u8).collect();

    let mut builder = PackBuilder::new(TagSource::Crc32);
    builder
        .push_image(&PackImage::new("checker", 4, 4, checker).unwrap())
        .push_image(&PackImage::new("ramp", 10, 3, ramp).unwrap())
        .push_image(&PackImage::new("noise", 8, 8, noise).unwrap());
    builder.encode().unwrap()
}

/// Binder double: counts calls, refuses the bind with index `fail_at`.
#[derive(Debug, Default)]
pub struct CountingBinder {
    pub fail_at: Option<usize>,
    pub bind_calls: usize,
    pub bound: Vec<u32>,
    pub released: Vec<u32>,
    pub payloads: Vec<Vec<u8>>,
}

impl CountingBinder {
    pub fn failing_at(index: usize) -> Self {
        CountingBinder {
            fail_at: Some(index),
            ..Default::default()
        }
    }
}

impl BitmapBinder for CountingBinder {
    type Handle = u32;

    fn bind(&mut self, data: &[u8], _width: u16, _height: u16) -> Option<u32> {
        let index = self.bind_calls;
        self.bind_calls += 1;
        if self.fail_at == Some(index) {
            return None;
        }

        let handle = 100 + index as u32;
        self.bound.push(handle);
        self.payloads.push(data.to_vec());
        Some(handle)
    }

    fn release(&mut self, handle: u32) {
        self.released.push(handle);
    }
}

/// Storage that reports the full size of `data` but only ever copies `copies` bytes.
#[derive(Debug)]
pub struct ShortStorage {
    pub data: Vec<u8>,
    pub copies: usize,
}

impl ResourceStorage for ShortStorage {
    fn size(&self, _id: ResourceId) -> usize {
        self.data.len()
    }

    fn load(&self, _id: ResourceId, dest: &mut [u8]) -> usize {
        let n = self.copies.min(dest.len()).min(self.data.len());
        dest[..n].copy_from_slice(&self.data[..n]);
        n
    }
}

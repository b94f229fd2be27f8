use crate::binder::BitmapBinder;
use crate::descriptor::{Payload, RawEntry, ResourceDescriptor};
use crate::err::{PackError, Result};
use crate::pack_header::PackHeader;

use log::{debug, trace};

/// Resolve every raw offset in `resources` to a bound handle, in table order.
///
/// `resources` must be freshly decoded; a slot that no longer holds a raw offset is rejected
/// like a binder failure. Stops at the first entry that is out of bounds or that the binder
/// rejects. Entries before it stay bound, the failing entry and everything after it are left
/// as they were.
pub(crate) fn bind_resources<B: BitmapBinder>(
    blob: &[u8],
    resources: &mut [ResourceDescriptor<B::Handle>],
    binder: &mut B,
) -> Result<()> {
    let payload_start = PackHeader::SIZE + resources.len() * RawEntry::SIZE;

    for (i, res) in resources.iter_mut().enumerate() {
        // Entries past u32::MAX cannot come from a decoded header.
        let index = i as u32;

        let Payload::Raw(offset) = res.payload else {
            debug!("[PREZR] image {index} has no raw offset to resolve");
            return Err(PackError::BitmapBindFailure { index });
        };

        let data = resolve(blob, payload_start, index, offset)?;

        match binder.bind(data, res.width, res.height) {
            Some(handle) => {
                trace!(
                    "[PREZR] bound image {index} ({}x{}) at offset {offset}",
                    res.width, res.height
                );
                res.payload = Payload::Bound(handle);
            }
            None => {
                debug!("[PREZR] Failed to create image {index} at offset {offset}");
                return Err(PackError::BitmapBindFailure { index });
            }
        }
    }

    Ok(())
}

fn resolve(blob: &[u8], payload_start: usize, index: u32, offset: u32) -> Result<&[u8]> {
    let at = offset as usize;
    if at < payload_start || at >= blob.len() {
        debug!(
            "[PREZR] image {index} offset {offset} outside of [{payload_start}, {})",
            blob.len()
        );
        return Err(PackError::OffsetOutOfBounds {
            index,
            offset,
            min: payload_start,
            blob_size: blob.len(),
        });
    }
    Ok(&blob[at..])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out increasing ids and refuses the `fail_at`-th bind.
    #[derive(Default)]
    struct Counter {
        binds: u32,
        fail_at: Option<u32>,
        seen: Vec<(usize, u16, u16)>,
    }

    impl BitmapBinder for Counter {
        type Handle = u32;

        fn bind(&mut self, data: &[u8], width: u16, height: u16) -> Option<u32> {
            if self.fail_at == Some(self.binds) {
                return None;
            }
            self.binds += 1;
            self.seen.push((data.len(), width, height));
            Some(self.binds)
        }

        fn release(&mut self, _handle: u32) {}
    }

    fn descriptors(offsets: &[u32]) -> Vec<ResourceDescriptor<u32>> {
        offsets
            .iter()
            .enumerate()
            .map(|(i, &offset)| {
                RawEntry {
                    width: i as u16 + 1,
                    height: i as u16 + 10,
                    offset,
                }
                .into()
            })
            .collect()
    }

    #[test]
    fn test_binds_all_entries_with_their_payload() {
        // header + 2 entries = 24 bytes, then 8 bytes of payload.
        let blob = vec![0u8; 32];
        let mut res = descriptors(&[24, 28]);
        let mut binder = Counter::default();

        bind_resources(&blob, &mut res, &mut binder).unwrap();

        assert_eq!(binder.seen, vec![(8, 1, 10), (4, 2, 11)]);
        assert_eq!(res[0].handle(), Some(&1));
        assert_eq!(res[1].handle(), Some(&2));
    }

    #[test]
    fn test_stops_at_first_rejected_entry() {
        // header + 5 entries = 48 bytes.
        let blob = vec![0u8; 80];
        let mut res = descriptors(&[48, 52, 56, 60, 64]);
        let mut binder = Counter {
            fail_at: Some(2),
            ..Default::default()
        };

        let err = bind_resources(&blob, &mut res, &mut binder).unwrap_err();

        assert_eq!(err, PackError::BitmapBindFailure { index: 2 });
        assert!(res[0].is_bound() && res[1].is_bound());
        assert_eq!(res[2].payload(), &Payload::Raw(56));
        assert_eq!(res[4].payload(), &Payload::Raw(64));
    }

    #[test]
    fn test_resolved_slot_is_not_walked_again() {
        let blob = vec![0u8; 32];
        let mut res = descriptors(&[24, 28]);
        let mut binder = Counter::default();

        bind_resources(&blob, &mut res, &mut binder).unwrap();
        let err = bind_resources(&blob, &mut res, &mut binder).unwrap_err();

        assert_eq!(err, PackError::BitmapBindFailure { index: 0 });
        assert_eq!(binder.binds, 2);
        assert_eq!(res[0].handle(), Some(&1));
    }

    #[test]
    fn test_offsets_into_table_or_past_end_are_rejected() {
        let blob = vec![0u8; 32];
        let mut binder = Counter::default();

        let mut into_table = descriptors(&[24, 8]);
        assert_eq!(
            bind_resources(&blob, &mut into_table, &mut binder).unwrap_err(),
            PackError::OffsetOutOfBounds {
                index: 1,
                offset: 8,
                min: 24,
                blob_size: 32,
            }
        );
        assert!(into_table[0].is_bound());

        let mut past_end = descriptors(&[32]);
        assert!(matches!(
            bind_resources(&blob, &mut past_end, &mut binder),
            Err(PackError::OffsetOutOfBounds { index: 0, offset: 32, .. })
        ));
    }
}

//! Per-session guildcard transfer.
//!
//! The guildcard file is far larger than one packet, so it is serialized
//! once per header request, checksummed, and then handed out slice by slice
//! as the client asks for each chunk.

use super::CharacterError;
use crate::protocol::records::{GuildcardData, GuildcardEntry, GUILDCARD_SLOTS};
use crate::protocol::{chunk_at, chunk_count, compute_crc32};

/// Most friend records fetched for one transfer.
pub const MAX_GUILDCARD_ENTRIES: usize = 140;

struct StagedBlob {
    data: Vec<u8>,
    checksum: u32,
}

/// The guildcard file staged for one client, if one has been built.
#[derive(Default)]
pub struct GuildcardTransfer {
    staged: Option<StagedBlob>,
}

impl GuildcardTransfer {
    /// Serializes `entries` into a fresh guildcard file, replacing anything
    /// staged before. Returns `(checksum, length)` for the header packet.
    pub fn build(&mut self, entries: &[GuildcardEntry]) -> (u32, usize) {
        let gc_data = assemble(entries);
        let data = bytemuck::bytes_of(&*gc_data).to_vec();
        let checksum = compute_crc32(&data);
        let length = data.len();
        self.staged = Some(StagedBlob { data, checksum });
        (checksum, length)
    }

    pub fn is_staged(&self) -> bool {
        self.staged.is_some()
    }

    pub fn checksum(&self) -> Option<u32> {
        self.staged.as_ref().map(|s| s.checksum)
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.staged.as_ref().map(|s| s.data.as_slice())
    }

    pub fn chunk_count(&self) -> usize {
        self.staged.as_ref().map_or(0, |s| chunk_count(s.data.len()))
    }

    /// The `index`-th slice of the staged file.
    pub fn chunk(&self, index: u32) -> Result<&[u8], CharacterError> {
        let staged = self.staged.as_ref().ok_or(CharacterError::TransferNotStarted)?;
        chunk_at(&staged.data, index).ok_or(CharacterError::ChunkOutOfRange {
            index,
            count: chunk_count(staged.data.len()),
        })
    }

    pub fn clear(&mut self) {
        self.staged = None;
    }
}

/// Lays `entries` out in a zeroed guildcard file. Records past the file's
/// capacity are dropped.
pub fn assemble(entries: &[GuildcardEntry]) -> Box<GuildcardData> {
    let mut gc_data: Box<GuildcardData> = bytemuck::zeroed_box();
    if entries.len() > GUILDCARD_SLOTS {
        tracing::warn!(
            "[char] [guildcard] {} entries, only {} fit; dropping the rest",
            entries.len(),
            GUILDCARD_SLOTS
        );
    }
    for (slot, entry) in gc_data.entries.iter_mut().zip(entries) {
        *slot = *entry;
    }
    gc_data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MAX_CHUNK_SIZE;
    use std::mem::{offset_of, size_of};

    fn entry(guildcard: u32) -> GuildcardEntry {
        let mut e = GuildcardEntry { guildcard, section_id: 3, char_class: 1, ..Default::default() };
        crate::protocol::copy_utf16_bytes(&mut e.name, &[b'F', 0, b'r', 0, b'i', 0]);
        e
    }

    #[test]
    fn test_build_checksum_matches_bytes() {
        let mut transfer = GuildcardTransfer::default();
        let (checksum, length) = transfer.build(&[entry(42000001), entry(42000002)]);

        let data = transfer.data().unwrap();
        assert_eq!(length, size_of::<GuildcardData>());
        assert_eq!(length, data.len());
        assert_eq!(checksum, compute_crc32(data));
        assert_eq!(transfer.checksum(), Some(checksum));
    }

    #[test]
    fn test_entries_land_in_order_and_rest_zeroed() {
        let mut transfer = GuildcardTransfer::default();
        transfer.build(&[entry(42000001), entry(42000002)]);
        let data = transfer.data().unwrap();

        let base = offset_of!(GuildcardData, entries);
        let stride = size_of::<GuildcardEntry>();
        assert_eq!(&data[base..base + 4], &42000001u32.to_le_bytes());
        assert_eq!(&data[base + stride..base + stride + 4], &42000002u32.to_le_bytes());
        assert!(data[base + 2 * stride..].iter().all(|&b| b == 0));
        assert!(data[..base].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rebuild_same_entries_same_content() {
        let entries = vec![entry(1), entry(2), entry(3)];
        let mut transfer = GuildcardTransfer::default();
        let first = transfer.build(&entries);
        let first_data = transfer.data().unwrap().to_vec();
        let second = transfer.build(&entries);

        assert_eq!(first, second);
        assert_eq!(first_data, transfer.data().unwrap());
    }

    #[test]
    fn test_rebuild_replaces_prior_state() {
        let mut transfer = GuildcardTransfer::default();
        let (empty_sum, _) = transfer.build(&[]);
        let (full_sum, _) = transfer.build(&[entry(9)]);
        assert_ne!(empty_sum, full_sum);
        assert_eq!(transfer.checksum(), Some(full_sum));
    }

    #[test]
    fn test_chunks_reassemble_blob() {
        let mut transfer = GuildcardTransfer::default();
        let (_, length) = transfer.build(&(0..GUILDCARD_SLOTS as u32).map(entry).collect::<Vec<_>>());

        let count = transfer.chunk_count();
        assert_eq!(count, length.div_ceil(MAX_CHUNK_SIZE));

        let mut joined = Vec::new();
        for i in 0..count {
            joined.extend_from_slice(transfer.chunk(i as u32).unwrap());
        }
        assert_eq!(joined, transfer.data().unwrap());

        let last = transfer.chunk(count as u32 - 1).unwrap();
        let expected_last = match length % MAX_CHUNK_SIZE {
            0 => MAX_CHUNK_SIZE,
            rem => rem,
        };
        assert_eq!(last.len(), expected_last);
    }

    #[test]
    fn test_chunk_past_end_rejected() {
        let mut transfer = GuildcardTransfer::default();
        transfer.build(&[]);
        let count = transfer.chunk_count() as u32;
        assert!(matches!(
            transfer.chunk(count),
            Err(CharacterError::ChunkOutOfRange { index, .. }) if index == count
        ));
    }

    #[test]
    fn test_chunk_without_build_rejected() {
        let transfer = GuildcardTransfer::default();
        assert!(matches!(transfer.chunk(0), Err(CharacterError::TransferNotStarted)));
    }

    #[test]
    fn test_clear_discards_blob() {
        let mut transfer = GuildcardTransfer::default();
        transfer.build(&[entry(1)]);
        transfer.clear();
        assert!(!transfer.is_staged());
        assert_eq!(transfer.chunk_count(), 0);
    }

    #[test]
    fn test_overflow_entries_dropped() {
        let entries: Vec<_> = (0..MAX_GUILDCARD_ENTRIES as u32).map(|i| entry(i + 1)).collect();
        let gc_data = assemble(&entries);
        assert_eq!(gc_data.entries[GUILDCARD_SLOTS - 1].guildcard, GUILDCARD_SLOTS as u32);
        assert_eq!(gc_data.unknown3, [0u8; 0x1BC]);
    }
}

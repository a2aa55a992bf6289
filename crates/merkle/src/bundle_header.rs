//! ANS-104 bundle header parsing.
//!
//! Wire layout: a 32-byte little-endian item count (only the low 8 bytes are
//! ever non-zero in practice), followed by that many `(size, id)` pairs, each
//! a 32-byte little-endian size and a 32-byte id. The bundle's data section
//! starts immediately after the header table; each entry's offset is the
//! cumulative sum of the sizes of the entries before it.

use std::collections::HashMap;

use ario_gateway_primitives::Id;

use crate::error::MerkleError;

const COUNT_FIELD_SIZE: usize = 32;
const ENTRY_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    pub id: Id,
    /// Combined header+payload size of this entry.
    pub size: u64,
    /// Byte offset of this entry's header start, relative to the start of
    /// the bundle's data section (i.e. right after the header table).
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct BundleHeader {
    entries: Vec<BundleEntry>,
    by_id: HashMap<Id, usize>,
}

impl BundleHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, MerkleError> {
        if bytes.len() < COUNT_FIELD_SIZE {
            return Err(MerkleError::BundleHeaderTruncated {
                need: COUNT_FIELD_SIZE,
                have: bytes.len(),
            });
        }
        let count = read_le_count(&bytes[..COUNT_FIELD_SIZE], "count")?;

        let table_bytes = count
            .checked_mul(ENTRY_SIZE)
            .ok_or(MerkleError::ItemCountOverflow)?;
        let need = COUNT_FIELD_SIZE + table_bytes;
        if bytes.len() < need {
            return Err(MerkleError::BundleHeaderTruncated {
                need,
                have: bytes.len(),
            });
        }

        let mut entries = Vec::with_capacity(count);
        let mut by_id = HashMap::with_capacity(count);
        let mut running_offset: u64 = 0;
        let table = &bytes[COUNT_FIELD_SIZE..need];
        for (i, raw) in table.chunks_exact(ENTRY_SIZE).enumerate() {
            let size = read_le_u64_from_32(&raw[..32], "entry size")?;
            let id = Id::from_bytes(raw[32..64].try_into().expect("32 bytes"));
            entries.push(BundleEntry {
                id,
                size,
                offset: running_offset,
            });
            by_id.insert(id, i);
            running_offset = running_offset.saturating_add(size);
        }

        Ok(Self { entries, by_id })
    }

    #[must_use]
    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    #[must_use]
    pub fn by_id(&self, id: &Id) -> Option<&BundleEntry> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }

    /// Finds the entry whose `[offset, offset + size)` range contains
    /// `contained_offset`, a byte position relative to the bundle's data
    /// section.
    #[must_use]
    pub fn by_contained_offset(&self, contained_offset: u64) -> Option<&BundleEntry> {
        self.entries.iter().find(|e| {
            contained_offset >= e.offset && contained_offset < e.offset.saturating_add(e.size)
        })
    }

    #[must_use]
    pub fn data_section_len(&self) -> u64 {
        self.entries
            .last()
            .map_or(0, |e| e.offset.saturating_add(e.size))
    }

    /// Byte offset, relative to the whole bundle buffer, of the header table
    /// end / data section start.
    #[must_use]
    pub fn header_table_len(&self) -> usize {
        COUNT_FIELD_SIZE + self.entries.len() * ENTRY_SIZE
    }
}

fn read_le_count(field: &[u8], name: &'static str) -> Result<usize, MerkleError> {
    let value = read_le_u64_from_32(field, name)?;
    usize::try_from(value).map_err(|_| MerkleError::ItemCountOverflow)
}

/// Strict little-endian 32-byte size field: low 8 bytes are the integer,
/// the remaining 24 bytes must be zero.
fn read_le_u64_from_32(field: &[u8], name: &'static str) -> Result<u64, MerkleError> {
    if field[8..].iter().any(|&b| b != 0) {
        return Err(MerkleError::NonZeroSizePadding { field: name });
    }
    let mut low = [0_u8; 8];
    low.copy_from_slice(&field[..8]);
    Ok(u64::from_le_bytes(low))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_bytes(size: u64, id: Id) -> Vec<u8> {
        let mut out = vec![0_u8; 32];
        out[..8].copy_from_slice(&size.to_le_bytes());
        out.extend_from_slice(id.as_bytes());
        out
    }

    #[test]
    fn parses_two_entries_with_cumulative_offsets() {
        let id_a = Id::random();
        let id_b = Id::random();
        let mut buf = vec![0_u8; 32];
        buf[..8].copy_from_slice(&2_u64.to_le_bytes());
        buf.extend(entry_bytes(100, id_a));
        buf.extend(entry_bytes(250, id_b));

        let header = BundleHeader::parse(&buf).unwrap();
        assert_eq!(header.entries().len(), 2);
        assert_eq!(header.by_id(&id_a).unwrap().offset, 0);
        assert_eq!(header.by_id(&id_b).unwrap().offset, 100);
        assert_eq!(header.data_section_len(), 350);
    }

    #[test]
    fn by_contained_offset_finds_enclosing_entry() {
        let id_a = Id::random();
        let id_b = Id::random();
        let mut buf = vec![0_u8; 32];
        buf[..8].copy_from_slice(&2_u64.to_le_bytes());
        buf.extend(entry_bytes(100, id_a));
        buf.extend(entry_bytes(250, id_b));

        let header = BundleHeader::parse(&buf).unwrap();
        assert_eq!(header.by_contained_offset(150).unwrap().id, id_b);
        assert_eq!(header.by_contained_offset(99).unwrap().id, id_a);
    }

    #[test]
    fn truncated_header_is_rejected() {
        let buf = vec![0_u8; 10];
        assert!(matches!(
            BundleHeader::parse(&buf),
            Err(MerkleError::BundleHeaderTruncated { .. })
        ));
    }

    #[test]
    fn truncated_entry_table_is_rejected() {
        let mut buf = vec![0_u8; 32];
        buf[..8].copy_from_slice(&2_u64.to_le_bytes());
        buf.extend(entry_bytes(100, Id::random()));
        assert!(matches!(
            BundleHeader::parse(&buf),
            Err(MerkleError::BundleHeaderTruncated { .. })
        ));
    }

    #[test]
    fn non_zero_padding_in_count_field_is_rejected() {
        let mut buf = vec![0_u8; 32];
        buf[..8].copy_from_slice(&1_u64.to_le_bytes());
        buf[16] = 1;
        buf.extend(entry_bytes(100, Id::random()));
        assert!(matches!(
            BundleHeader::parse(&buf),
            Err(MerkleError::NonZeroSizePadding { field: "count" })
        ));
    }

    #[test]
    fn non_zero_padding_in_entry_size_field_is_rejected() {
        let mut buf = vec![0_u8; 32];
        buf[..8].copy_from_slice(&1_u64.to_le_bytes());
        let mut entry = entry_bytes(100, Id::random());
        entry[30] = 1;
        buf.extend(entry);
        assert!(matches!(
            BundleHeader::parse(&buf),
            Err(MerkleError::NonZeroSizePadding { field: "entry size" })
        ));
    }
}

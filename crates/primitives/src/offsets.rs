//! Byte-offset arithmetic shared by the parent-chain resolver, the composite
//! data source and the chunk retrieval service. See spec §3 and §4.4.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OffsetError {
    #[error("region offset {offset} is at or past the end of a {size}-byte payload")]
    OutOfRange { offset: u64, size: u64 },
    #[error("data item offsets invalid: offset={offset} data_offset={data_offset} size={size} container_size={container_size}")]
    InvalidDataItemOffsets {
        offset: u64,
        data_offset: u64,
        size: u64,
        container_size: u64,
    },
}

/// A byte range relative to the payload of some referenced id (spec §4.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRegion {
    pub offset: u64,
    pub size: u64,
}

impl ByteRegion {
    #[must_use]
    pub const fn whole(size: u64) -> Self {
        Self { offset: 0, size }
    }

    /// Truncates `self` to fit within `[0, total_size)`, per spec §4.3.3 step 3
    /// and the boundary law in §8 ("`region.size > size(id) - region.offset`
    /// is truncated to the payload end").
    pub fn truncate_to(self, total_size: u64) -> Result<Self, OffsetError> {
        if self.offset >= total_size {
            return Err(OffsetError::OutOfRange {
                offset: self.offset,
                size: total_size,
            });
        }
        let max_size = total_size - self.offset;
        Ok(Self {
            offset: self.offset,
            size: self.size.min(max_size),
        })
    }

    #[must_use]
    pub const fn end(self) -> u64 {
        self.offset + self.size
    }

    /// Translates a region expressed relative to a nested item's payload into
    /// a region relative to the enclosing root transaction, given the root
    /// byte offset of the item's payload and the item's own size.
    pub fn rebase(self, root_data_offset: u64, item_size: u64) -> Result<Self, OffsetError> {
        let truncated = self.truncate_to(item_size)?;
        Ok(Self {
            offset: root_data_offset + truncated.offset,
            size: truncated.size,
        })
    }
}

/// Header/payload offsets of a single data item relative to the payload of
/// its immediately enclosing container (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemOffsets {
    /// Byte position of the data item header start, relative to the
    /// enclosing container's payload.
    pub offset: u64,
    /// Byte position of the data item's payload start, relative to the
    /// enclosing container's payload.
    pub data_offset: u64,
    /// Payload (not header) size in bytes.
    pub size: u64,
}

impl ItemOffsets {
    pub fn validate(self, container_size: u64) -> Result<Self, OffsetError> {
        let header_size_ok = self.data_offset >= self.offset;
        let within_container = self
            .data_offset
            .checked_add(self.size)
            .is_some_and(|end| end <= container_size);
        if !header_size_ok || !within_container {
            return Err(OffsetError::InvalidDataItemOffsets {
                offset: self.offset,
                data_offset: self.data_offset,
                size: self.size,
                container_size,
            });
        }
        Ok(self)
    }

    #[must_use]
    pub const fn header_size(self) -> u64 {
        self.data_offset - self.offset
    }
}

/// Absolute (weave-relative) roll-up of a data item's position, computed once
/// by the parent-chain resolver and cached thereafter (spec §3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootOffsets {
    pub root_data_item_offset: u64,
    pub root_data_offset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_region_covers_entire_payload() {
        let region = ByteRegion::whole(500).truncate_to(500).unwrap();
        assert_eq!(region, ByteRegion { offset: 0, size: 500 });
    }

    #[test]
    fn oversized_region_truncates_to_payload_end() {
        let region = ByteRegion { offset: 50, size: 1_000 }
            .truncate_to(500)
            .unwrap();
        assert_eq!(region, ByteRegion { offset: 50, size: 450 });
    }

    #[test]
    fn offset_at_or_past_size_is_out_of_range() {
        let err = ByteRegion { offset: 500, size: 10 }
            .truncate_to(500)
            .unwrap_err();
        assert_eq!(err, OffsetError::OutOfRange { offset: 500, size: 500 });
    }

    #[test]
    fn rebase_shifts_region_into_root_coordinates() {
        let region = ByteRegion { offset: 50, size: 200 };
        let rebased = region.rebase(1_185, 500).unwrap();
        assert_eq!(rebased, ByteRegion { offset: 1_235, size: 200 });
    }

    #[test]
    fn item_offsets_reject_data_offset_before_header_start() {
        let offsets = ItemOffsets {
            offset: 100,
            data_offset: 50,
            size: 10,
        };
        assert!(offsets.validate(1_000).is_err());
    }

    #[test]
    fn item_offsets_reject_payload_past_container_end() {
        let offsets = ItemOffsets {
            offset: 0,
            data_offset: 10,
            size: 1_000,
        };
        assert!(offsets.validate(500).is_err());
    }

    #[test]
    fn zero_offset_item_is_valid_and_distinct_from_unset() {
        let offsets = ItemOffsets {
            offset: 0,
            data_offset: 0,
            size: 100,
        }
        .validate(100)
        .unwrap();
        assert_eq!(offsets.header_size(), 0);
    }
}

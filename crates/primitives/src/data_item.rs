use serde::{Deserialize, Serialize};

use crate::id::Id;
use crate::signature::SignatureType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

/// A data item as indexed for GraphQL, with signature/owner bytes referenced
/// by offset into the enclosing bundle rather than duplicated (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct NormalizedDataItem {
    pub id: Id,
    pub parent_id: Id,
    pub root_transaction_id: Id,
    pub height: Option<u64>,
    pub signature_type: u16,
    pub signature_offset: u64,
    pub signature_size: u64,
    pub owner_offset: u64,
    pub owner_size: u64,
    pub target: Option<Id>,
    pub anchor: Option<[u8; 32]>,
    pub tags: Vec<Tag>,
    pub content_type: Option<String>,
    /// Byte position of the item's payload start, relative to the enclosing
    /// container's payload.
    pub data_offset: u64,
    /// Payload (not header) size in bytes.
    pub size: u64,
    pub indexed_at: i64,
}

impl NormalizedDataItem {
    /// Builds a row for a just-parsed data item (spec §4.5 "Indexing").
    /// `height` is `None` until the chain indexer backfills it.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Id,
        parent_id: Id,
        root_transaction_id: Id,
        signature_type: u16,
        signature_offset: u64,
        signature_size: u64,
        owner_offset: u64,
        owner_size: u64,
        target: Option<Id>,
        anchor: Option<[u8; 32]>,
        tags: Vec<Tag>,
        content_type: Option<String>,
        data_offset: u64,
        size: u64,
        indexed_at: i64,
    ) -> Self {
        Self {
            id,
            parent_id,
            root_transaction_id,
            height: None,
            signature_type,
            signature_offset,
            signature_size,
            owner_offset,
            owner_size,
            target,
            anchor,
            tags,
            content_type,
            data_offset,
            size,
            indexed_at,
        }
    }

    #[must_use]
    pub fn signature_type(&self) -> SignatureType {
        SignatureType(self.signature_type)
    }

    #[must_use]
    pub fn is_nested_bundle(&self) -> bool {
        is_bundle_content_type(self.content_type.as_deref())
            || self
                .tags
                .iter()
                .any(|t| t.name.eq_ignore_ascii_case("Bundle-Format"))
    }
}

/// Matches the `is_nested_bundle` filter predicate from spec §4.5/§9: a
/// content-type tag that classifies the item's payload as an ANS-104
/// container.
#[must_use]
pub fn is_bundle_content_type(content_type: Option<&str>) -> bool {
    matches!(
        content_type,
        Some("application/x.arweave-manifest+json") | Some("application/ans104")
    )
}

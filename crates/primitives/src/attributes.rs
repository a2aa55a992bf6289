use serde::{Deserialize, Serialize};

use crate::id::Id;

/// Persisted per-id roll-up maintained by the attributes store façade
/// (spec §2, §4.4). `root_transaction_id`/`root_data_item_offset`/
/// `root_data_offset` are set once on first successful traversal and never
/// mutated afterwards; `verified` transitions false -> true only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ItemAttributes {
    pub id: Id,
    pub parent_id: Option<Id>,
    pub size: u64,
    /// Byte position of this item's header start, relative to its immediate
    /// parent's payload. `None` for base-layer transactions.
    pub offset: Option<u64>,
    /// Byte position of this item's payload start, relative to its
    /// immediate parent's payload. `None` for base-layer transactions.
    pub data_offset: Option<u64>,
    pub root_transaction_id: Option<Id>,
    pub root_data_item_offset: Option<u64>,
    pub root_data_offset: Option<u64>,
    pub content_type: Option<String>,
    pub hash: Option<[u8; 32]>,
    pub verified: bool,
}

impl ItemAttributes {
    #[must_use]
    pub fn new_base_layer(id: Id, size: u64) -> Self {
        Self {
            id,
            parent_id: None,
            size,
            offset: None,
            data_offset: None,
            root_transaction_id: Some(id),
            root_data_item_offset: Some(0),
            root_data_offset: Some(0),
            content_type: None,
            hash: None,
            verified: false,
        }
    }

    /// Builds a freshly-unbundled data item's attributes row: parent-relative
    /// `offset`/`data_offset` known from the bundle header, root roll-up not
    /// yet computed (left for the parent-chain resolver to fill in lazily on
    /// first traversal).
    #[must_use]
    pub fn new_nested(
        id: Id,
        parent_id: Id,
        size: u64,
        offset: u64,
        data_offset: u64,
        content_type: Option<String>,
    ) -> Self {
        Self {
            id,
            parent_id: Some(parent_id),
            size,
            offset: Some(offset),
            data_offset: Some(data_offset),
            root_transaction_id: None,
            root_data_item_offset: None,
            root_data_offset: None,
            content_type,
            hash: None,
            verified: false,
        }
    }

    #[must_use]
    pub const fn has_root_roll_up(&self) -> bool {
        self.root_transaction_id.is_some()
            && self.root_data_item_offset.is_some()
            && self.root_data_offset.is_some()
    }

    /// Sets the root roll-up once, per the append-mostly lifecycle in spec
    /// §3. Does nothing if it is already set, reflecting "never mutated"
    /// after first successful traversal.
    pub fn set_root_roll_up_once(
        &mut self,
        root_transaction_id: Id,
        root_data_item_offset: u64,
        root_data_offset: u64,
    ) {
        if self.has_root_roll_up() {
            return;
        }
        self.root_transaction_id = Some(root_transaction_id);
        self.root_data_item_offset = Some(root_data_item_offset);
        self.root_data_offset = Some(root_data_offset);
    }

    /// `verified` is monotonic: false -> true only (spec §3, §8 invariant 5).
    pub fn mark_verified(&mut self) {
        self.verified = true;
    }
}

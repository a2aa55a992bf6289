use std::sync::Arc;

use ario_gateway_primitives::{Id, ItemAttributes};
use ario_gateway_store::{decode_json, encode_json, Storage};

use crate::error::ResolverError;

fn key(id: &Id) -> Vec<u8> {
    let mut k = Vec::with_capacity(6 + 32);
    k.extend_from_slice(b"attrs:");
    k.extend_from_slice(id.as_bytes());
    k
}

fn children_prefix(parent_id: &Id) -> Vec<u8> {
    let mut k = Vec::new();
    k.extend_from_slice(b"attrs_children:");
    k.extend_from_slice(parent_id.as_bytes());
    k.push(b':');
    k
}

fn children_key(parent_id: &Id, id: &Id) -> Vec<u8> {
    let mut k = children_prefix(parent_id);
    k.extend_from_slice(id.as_bytes());
    k
}

/// Façade over `Storage` for the per-id `ItemAttributes` roll-up (spec §2,
/// §4.4). A second, read-only `Storage` may be supplied as a legacy index
/// to consult when the primary store has no record for an id yet
/// (`fallbackToLegacyTraversal`), e.g. during a migration from an older
/// gateway's attribute table.
pub struct AttributesStore {
    primary: Arc<dyn Storage>,
    legacy: Option<Arc<dyn Storage>>,
}

impl AttributesStore {
    #[must_use]
    pub fn new(primary: Arc<dyn Storage>) -> Self {
        Self {
            primary,
            legacy: None,
        }
    }

    #[must_use]
    pub fn with_legacy_fallback(mut self, legacy: Arc<dyn Storage>) -> Self {
        self.legacy = Some(legacy);
        self
    }

    pub async fn get(&self, id: &Id) -> Result<Option<ItemAttributes>, ResolverError> {
        if let Some(bytes) = self.primary.get(&key(id)).await? {
            return Ok(Some(decode_json(&bytes)?));
        }
        if let Some(legacy) = &self.legacy {
            if let Some(bytes) = legacy.get(&key(id)).await? {
                return Ok(Some(decode_json(&bytes)?));
            }
        }
        Ok(None)
    }

    pub async fn put(&self, attrs: &ItemAttributes) -> Result<(), ResolverError> {
        let encoded = encode_json(attrs)?;
        self.primary.put(&key(&attrs.id), &encoded).await?;
        if let Some(parent_id) = attrs.parent_id {
            self.primary
                .put(&children_key(&parent_id, &attrs.id), b"")
                .await?;
        }
        Ok(())
    }

    /// Lists the immediate children of `parent_id` recorded by `put`, used
    /// by the background verification worker to propagate a newly-verified
    /// bundle's status to every data item unbundled from it (spec §4.6).
    pub async fn children_of(&self, parent_id: &Id) -> Result<Vec<Id>, ResolverError> {
        let prefix = children_prefix(parent_id);
        let keys = self.primary.list_keys_with_prefix(&prefix).await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| {
                let suffix = k.get(prefix.len()..)?;
                let bytes: [u8; 32] = suffix.try_into().ok()?;
                Some(Id::from_bytes(bytes))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ario_gateway_store::MemoryStore;

    #[tokio::test]
    async fn round_trips_attributes() {
        let store = AttributesStore::new(Arc::new(MemoryStore::new()));
        let id = Id::random();
        let attrs = ItemAttributes::new_base_layer(id, 100);
        store.put(&attrs).await.unwrap();
        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn falls_back_to_legacy_store_when_primary_misses() {
        let legacy = Arc::new(MemoryStore::new());
        let store = AttributesStore::new(Arc::new(MemoryStore::new())).with_legacy_fallback(legacy.clone());

        let id = Id::random();
        let attrs = ItemAttributes::new_base_layer(id, 50);
        legacy
            .put(&key(&id), &encode_json(&attrs).unwrap())
            .await
            .unwrap();

        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn missing_everywhere_is_none() {
        let store = AttributesStore::new(Arc::new(MemoryStore::new()));
        assert!(store.get(&Id::random()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn children_of_returns_only_direct_children_of_that_parent() {
        let store = AttributesStore::new(Arc::new(MemoryStore::new()));
        let parent = Id::random();
        let other_parent = Id::random();
        let child_a = ItemAttributes::new_nested(Id::random(), parent, 10, 0, 0, None);
        let child_b = ItemAttributes::new_nested(Id::random(), parent, 20, 10, 10, None);
        let unrelated = ItemAttributes::new_nested(Id::random(), other_parent, 5, 0, 0, None);
        store.put(&child_a).await.unwrap();
        store.put(&child_b).await.unwrap();
        store.put(&unrelated).await.unwrap();

        let mut children = store.children_of(&parent).await.unwrap();
        children.sort();
        let mut expected = vec![child_a.id, child_b.id];
        expected.sort();
        assert_eq!(children, expected);
    }

    #[tokio::test]
    async fn base_layer_items_have_no_parent_index_entry() {
        let store = AttributesStore::new(Arc::new(MemoryStore::new()));
        let id = Id::random();
        store.put(&ItemAttributes::new_base_layer(id, 100)).await.unwrap();
        assert!(store.children_of(&id).await.unwrap().is_empty());
    }
}

use std::collections::HashSet;

use ario_gateway_primitives::{Id, ItemAttributes};
use tracing::debug;

use crate::attributes_store::AttributesStore;
use crate::error::ResolverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootResolution {
    pub root_transaction_id: Id,
    pub root_data_item_offset: u64,
    pub root_data_offset: u64,
}

/// Walks an item's `parent_id` chain up to its base-layer transaction (spec
/// §4.4's `traverseToRoot`), summing each level's parent-relative
/// `offset`/`data_offset` into an absolute root-relative position. Detects
/// cycles via a visited set, and stops early at the first ancestor that
/// already carries a cached root roll-up, adding back only the levels
/// below it. Every visited item, including the queried one, has its
/// roll-up persisted once the root is known — so resolving a sibling later
/// is a single lookup.
pub async fn resolve_root(
    store: &AttributesStore,
    id: Id,
) -> Result<RootResolution, ResolverError> {
    let mut visited: HashSet<Id> = HashSet::new();
    let mut chain: Vec<(ItemAttributes, u64, u64)> = Vec::new();
    let mut offset_sum: u64 = 0;
    let mut data_offset_sum: u64 = 0;
    let mut current = id;

    let resolution = loop {
        if !visited.insert(current) {
            return Err(ResolverError::TraversalCycle(current));
        }

        let attrs = store.get(&current).await?.ok_or_else(|| {
            if current == id {
                ResolverError::NotFound(current)
            } else {
                ResolverError::TraversalIncomplete(current)
            }
        })?;

        if attrs.has_root_roll_up() && current != id {
            let root_transaction_id = attrs.root_transaction_id.expect("checked has_root_roll_up");
            let root_data_item_offset = attrs
                .root_data_item_offset
                .expect("checked has_root_roll_up")
                .saturating_add(offset_sum);
            let root_data_offset = attrs
                .root_data_offset
                .expect("checked has_root_roll_up")
                .saturating_add(data_offset_sum);
            debug!(%current, "short-circuited traversal at cached root roll-up");
            break RootResolution {
                root_transaction_id,
                root_data_item_offset,
                root_data_offset,
            };
        }

        let offset_before = offset_sum;
        let data_offset_before = data_offset_sum;

        match attrs.parent_id {
            None => {
                let resolution = RootResolution {
                    root_transaction_id: current,
                    root_data_item_offset: offset_sum,
                    root_data_offset: data_offset_sum,
                };
                chain.push((attrs, offset_before, data_offset_before));
                break resolution;
            }
            Some(parent_id) => {
                offset_sum = offset_sum.saturating_add(attrs.offset.unwrap_or(0));
                data_offset_sum = data_offset_sum.saturating_add(attrs.data_offset.unwrap_or(0));
                chain.push((attrs, offset_before, data_offset_before));
                current = parent_id;
            }
        }
    };

    // `offset_before`/`data_offset_before` is the sum of offsets of this
    // item's descendants in the chain (everything closer to the originally
    // queried id); subtracting it from the root-relative total for the
    // whole chain leaves exactly this item's own root-relative position.
    for (mut attrs, offset_before, data_offset_before) in chain {
        let item_offset = resolution.root_data_item_offset.saturating_sub(offset_before);
        let item_data_offset = resolution.root_data_offset.saturating_sub(data_offset_before);
        attrs.set_root_roll_up_once(resolution.root_transaction_id, item_offset, item_data_offset);
        store.put(&attrs).await?;
    }

    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ario_gateway_store::MemoryStore;
    use std::sync::Arc;

    fn store() -> AttributesStore {
        AttributesStore::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn base_layer_item_resolves_to_itself() {
        let store = store();
        let id = Id::random();
        store.put(&ItemAttributes::new_base_layer(id, 100)).await.unwrap();

        let resolution = resolve_root(&store, id).await.unwrap();
        assert_eq!(resolution.root_transaction_id, id);
        assert_eq!(resolution.root_data_item_offset, 0);
        assert_eq!(resolution.root_data_offset, 0);
    }

    #[tokio::test]
    async fn nested_data_item_sums_offsets_up_to_the_root() {
        let store = store();
        let root = Id::random();
        let child = Id::random();
        let grandchild = Id::random();

        store.put(&ItemAttributes::new_base_layer(root, 10_000)).await.unwrap();
        store
            .put(&ItemAttributes::new_nested(child, root, 2_000, 100, 150, None))
            .await
            .unwrap();
        store
            .put(&ItemAttributes::new_nested(grandchild, child, 500, 50, 75, None))
            .await
            .unwrap();

        let resolution = resolve_root(&store, grandchild).await.unwrap();
        assert_eq!(resolution.root_transaction_id, root);
        assert_eq!(resolution.root_data_item_offset, 150);
        assert_eq!(resolution.root_data_offset, 225);

        let persisted_grandchild = store.get(&grandchild).await.unwrap().unwrap();
        assert_eq!(persisted_grandchild.root_transaction_id, Some(root));
        assert_eq!(persisted_grandchild.root_data_item_offset, Some(150));

        let persisted_child = store.get(&child).await.unwrap().unwrap();
        assert_eq!(persisted_child.root_data_item_offset, Some(100));
    }

    #[tokio::test]
    async fn second_resolution_short_circuits_at_cached_parent() {
        let store = store();
        let root = Id::random();
        let child = Id::random();
        let sibling = Id::random();

        store.put(&ItemAttributes::new_base_layer(root, 10_000)).await.unwrap();
        store
            .put(&ItemAttributes::new_nested(child, root, 2_000, 100, 150, None))
            .await
            .unwrap();
        resolve_root(&store, child).await.unwrap();

        store
            .put(&ItemAttributes::new_nested(sibling, child, 10, 5, 8, None))
            .await
            .unwrap();

        let resolution = resolve_root(&store, sibling).await.unwrap();
        assert_eq!(resolution.root_transaction_id, root);
        assert_eq!(resolution.root_data_item_offset, 105);
        assert_eq!(resolution.root_data_offset, 158);
    }

    #[tokio::test]
    async fn self_referential_parent_is_a_cycle() {
        let store = store();
        let id = Id::random();
        store
            .put(&ItemAttributes::new_nested(id, id, 10, 0, 0, None))
            .await
            .unwrap();

        assert!(matches!(
            resolve_root(&store, id).await,
            Err(ResolverError::TraversalCycle(_))
        ));
    }

    #[tokio::test]
    async fn missing_parent_is_traversal_incomplete() {
        let store = store();
        let id = Id::random();
        let missing_parent = Id::random();
        store
            .put(&ItemAttributes::new_nested(id, missing_parent, 10, 0, 0, None))
            .await
            .unwrap();

        assert!(matches!(
            resolve_root(&store, id).await,
            Err(ResolverError::TraversalIncomplete(p)) if p == missing_parent
        ));
    }

    #[tokio::test]
    async fn unindexed_queried_item_is_not_found() {
        let store = store();
        assert!(matches!(
            resolve_root(&store, Id::random()).await,
            Err(ResolverError::NotFound(_))
        ));
    }
}

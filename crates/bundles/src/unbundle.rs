use std::sync::Arc;

use ario_gateway_merkle::{parse_data_item_header, BundleHeader};
use ario_gateway_primitives::{FilterExpr, Id, ItemAttributes, NormalizedDataItem};
use ario_gateway_resolver::AttributesStore;

use crate::error::BundlesError;
use crate::status::now_millis;

/// Result of unbundling a single downloaded bundle.
#[derive(Debug, Default)]
pub struct UnbundleOutcome {
    pub data_item_count: u64,
    pub matched_data_item_count: u64,
    /// Items that passed `index_filter` and should be handed to the
    /// GraphQL indexer (spec §4.5 "Indexing").
    pub indexed_items: Vec<NormalizedDataItem>,
    /// `(id, root_transaction_id)` pairs for items classified as nested
    /// bundles, to be re-enqueued by the caller.
    pub nested_bundles: Vec<(Id, Id)>,
}

/// Parses a downloaded bundle's header and each data item header (spec
/// §4.1.1, §4.1.2), applying `unbundle_filter`/`index_filter` per item and
/// persisting raw (non-rolled-up) attributes for every item that passes
/// `unbundle_filter`. Root roll-up computation is left to the parent-chain
/// resolver on first traversal.
pub struct Unbundler {
    attributes: Arc<AttributesStore>,
    unbundle_filter: FilterExpr,
    index_filter: FilterExpr,
}

impl Unbundler {
    #[must_use]
    pub fn new(attributes: Arc<AttributesStore>, unbundle_filter: FilterExpr, index_filter: FilterExpr) -> Self {
        Self {
            attributes,
            unbundle_filter,
            index_filter,
        }
    }

    pub async fn unbundle(
        &self,
        bundle_id: Id,
        root_transaction_id: Id,
        bytes: &[u8],
    ) -> Result<UnbundleOutcome, BundlesError> {
        let header = BundleHeader::parse(bytes)?;
        let data_section_start = header.header_table_len();
        let mut outcome = UnbundleOutcome::default();

        for entry in header.entries() {
            outcome.data_item_count += 1;

            let item_start = data_section_start
                .checked_add(usize::try_from(entry.offset).unwrap_or(usize::MAX))
                .ok_or(BundlesError::TruncatedBundle)?;
            let item_size = usize::try_from(entry.size).unwrap_or(usize::MAX);
            let item_end = item_start.checked_add(item_size).ok_or(BundlesError::TruncatedBundle)?;
            let item_bytes = bytes
                .get(item_start..item_end)
                .ok_or(BundlesError::TruncatedBundle)?;

            let item_header = parse_data_item_header(item_bytes)?;
            let payload_size = entry.size.saturating_sub(item_header.header_size);
            let data_offset = entry.offset.saturating_add(item_header.header_size);
            let content_type = item_header
                .tags
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case("Content-Type"))
                .map(|t| t.value.clone());

            let candidate = NormalizedDataItem::new(
                entry.id,
                bundle_id,
                root_transaction_id,
                item_header.signature_type,
                entry.offset.saturating_add(item_header.signature_offset),
                item_header.signature_size,
                entry.offset.saturating_add(item_header.owner_offset),
                item_header.owner_size,
                item_header.target,
                item_header.anchor,
                item_header.tags,
                content_type.clone(),
                data_offset,
                payload_size,
                now_millis(),
            );

            if !self.unbundle_filter.evaluate(&candidate) {
                continue;
            }
            outcome.matched_data_item_count += 1;

            self.attributes
                .put(&ItemAttributes::new_nested(
                    candidate.id,
                    bundle_id,
                    candidate.size,
                    entry.offset,
                    data_offset,
                    content_type,
                ))
                .await?;

            if candidate.is_nested_bundle() {
                outcome.nested_bundles.push((candidate.id, root_transaction_id));
            }

            if self.index_filter.evaluate(&candidate) {
                outcome.indexed_items.push(candidate);
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ario_gateway_store::MemoryStore;

    fn entry_bytes(size: u64, id: Id) -> Vec<u8> {
        let mut out = vec![0_u8; 32];
        out[..8].copy_from_slice(&size.to_le_bytes());
        out.extend_from_slice(id.as_bytes());
        out
    }

    /// A minimal ANS-104 RSA data item with no target/anchor/tags.
    fn data_item_bytes(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1_u16.to_le_bytes());
        buf.extend(vec![0_u8; 512]); // signature
        buf.extend(vec![0_u8; 512]); // owner
        buf.push(0); // no target
        buf.push(0); // no anchor
        buf.extend_from_slice(&0_u64.to_le_bytes()); // tag_count
        buf.extend_from_slice(&0_u64.to_le_bytes()); // tags_bytes_len
        buf.extend_from_slice(payload);
        buf
    }

    fn build_bundle(items: &[(Id, Vec<u8>)]) -> Vec<u8> {
        let entries: Vec<Vec<u8>> = items
            .iter()
            .map(|(_id, payload)| data_item_bytes(payload))
            .collect();

        let mut header = vec![0_u8; 32];
        header[..8].copy_from_slice(&(items.len() as u64).to_le_bytes());
        for ((id, _), entry) in items.iter().zip(&entries) {
            header.extend(entry_bytes(entry.len() as u64, *id));
        }

        let mut bundle = header;
        for entry in entries {
            bundle.extend(entry);
        }
        bundle
    }

    #[tokio::test]
    async fn unbundles_two_items_and_persists_their_attributes() {
        let id_a = Id::random();
        let id_b = Id::random();
        let bundle_id = Id::random();
        let root_tx = Id::random();
        let bundle_bytes = build_bundle(&[(id_a, b"hello".to_vec()), (id_b, b"world!".to_vec())]);

        let attributes = Arc::new(AttributesStore::new(Arc::new(MemoryStore::new())));
        let unbundler = Unbundler::new(attributes.clone(), FilterExpr::Always, FilterExpr::Always);

        let outcome = unbundler
            .unbundle(bundle_id, root_tx, &bundle_bytes)
            .await
            .unwrap();

        assert_eq!(outcome.data_item_count, 2);
        assert_eq!(outcome.matched_data_item_count, 2);
        assert_eq!(outcome.indexed_items.len(), 2);
        assert!(outcome.nested_bundles.is_empty());

        let attrs_a = attributes.get(&id_a).await.unwrap().unwrap();
        assert_eq!(attrs_a.parent_id, Some(bundle_id));
        assert_eq!(attrs_a.size, 5);
    }

    #[tokio::test]
    async fn unbundle_filter_skips_items_entirely() {
        let id_a = Id::random();
        let bundle_bytes = build_bundle(&[(id_a, b"x".to_vec())]);
        let attributes = Arc::new(AttributesStore::new(Arc::new(MemoryStore::new())));
        let unbundler = Unbundler::new(attributes.clone(), FilterExpr::Never, FilterExpr::Always);

        let outcome = unbundler
            .unbundle(Id::random(), Id::random(), &bundle_bytes)
            .await
            .unwrap();

        assert_eq!(outcome.data_item_count, 1);
        assert_eq!(outcome.matched_data_item_count, 0);
        assert!(attributes.get(&id_a).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn index_filter_excludes_from_indexed_items_but_still_persists_attributes() {
        let id_a = Id::random();
        let bundle_bytes = build_bundle(&[(id_a, b"x".to_vec())]);
        let attributes = Arc::new(AttributesStore::new(Arc::new(MemoryStore::new())));
        let unbundler = Unbundler::new(attributes.clone(), FilterExpr::Always, FilterExpr::Never);

        let outcome = unbundler
            .unbundle(Id::random(), Id::random(), &bundle_bytes)
            .await
            .unwrap();

        assert_eq!(outcome.matched_data_item_count, 1);
        assert!(outcome.indexed_items.is_empty());
        assert!(attributes.get(&id_a).await.unwrap().is_some());
    }
}

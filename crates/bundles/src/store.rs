use std::sync::Arc;

use ario_gateway_primitives::{Id, NormalizedDataItem};
use ario_gateway_store::{decode_json, encode_json, Storage};

use crate::error::BundlesError;
use crate::status::{BundleRecord, BundleStatus};

fn primary_key(id: &Id) -> Vec<u8> {
    let mut k = Vec::with_capacity(7 + 32);
    k.extend_from_slice(b"bundle:");
    k.extend_from_slice(id.as_bytes());
    k
}

fn status_index_prefix(status: BundleStatus) -> Vec<u8> {
    let mut k = Vec::new();
    k.extend_from_slice(b"bundle_by_status:");
    k.extend_from_slice(status.as_str().as_bytes());
    k.push(b':');
    k
}

fn status_index_key(status: BundleStatus, id: &Id) -> Vec<u8> {
    let mut k = status_index_prefix(status);
    k.extend_from_slice(id.as_bytes());
    k
}

/// `Storage` façade for the bundles table (spec §4.5, §6). `Storage` only
/// supports prefix scans over keys, not value filtering, so every status
/// also gets a secondary `bundle_by_status:{status}:{id}` index entry that
/// the repair worker scans instead of walking every bundle row.
pub struct BundleRecordStore {
    store: Arc<dyn Storage>,
}

impl BundleRecordStore {
    #[must_use]
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &Id) -> Result<Option<BundleRecord>, BundlesError> {
        match self.store.get(&primary_key(id)).await? {
            Some(bytes) => Ok(Some(decode_json(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persists `record`, moving its status-index entry if the status
    /// changed since the last write.
    pub async fn put(&self, record: &BundleRecord) -> Result<(), BundlesError> {
        if let Some(existing) = self.get(&record.id).await? {
            if existing.status != record.status {
                self.store
                    .delete(&status_index_key(existing.status, &record.id))
                    .await?;
            }
        }
        self.store
            .put(&primary_key(&record.id), &encode_json(record)?)
            .await?;
        self.store
            .put(&status_index_key(record.status, &record.id), b"")
            .await?;
        Ok(())
    }

    /// Lists every bundle id currently at `status`, via the secondary index.
    pub async fn list_by_status(&self, status: BundleStatus) -> Result<Vec<Id>, BundlesError> {
        let prefix = status_index_prefix(status);
        let keys = self.store.list_keys_with_prefix(&prefix).await?;
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

fn data_item_key(id: &Id) -> Vec<u8> {
    let mut k = Vec::with_capacity(10 + 32);
    k.extend_from_slice(b"data_item:");
    k.extend_from_slice(id.as_bytes());
    k
}

/// `Storage` facade for the data-item table (spec §4.5 "Indexing"): rows
/// written in batches by [`crate::indexer::DataItemIndexer`] once an item
/// clears `index_filter`.
pub struct DataItemRecordStore {
    store: Arc<dyn Storage>,
}

impl DataItemRecordStore {
    #[must_use]
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &Id) -> Result<Option<NormalizedDataItem>, BundlesError> {
        match self.store.get(&data_item_key(id)).await? {
            Some(bytes) => Ok(Some(decode_json(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Writes every item in `batch` in one pass (spec §4.5: "Writes happen
    /// in batches to the bundles DB").
    pub async fn put_batch(&self, batch: &[NormalizedDataItem]) -> Result<(), BundlesError> {
        for item in batch {
            self.store.put(&data_item_key(&item.id), &encode_json(item)?).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::now_millis;
    use ario_gateway_store::MemoryStore;

    fn store() -> BundleRecordStore {
        BundleRecordStore::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn round_trips_a_record() {
        let store = store();
        let id = Id::random();
        let record = BundleRecord::new(id, Id::random(), now_millis());
        store.put(&record).await.unwrap();
        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.status, BundleStatus::New);
    }

    #[tokio::test]
    async fn status_index_moves_when_status_changes() {
        let store = store();
        let id = Id::random();
        let mut record = BundleRecord::new(id, Id::random(), 0);
        store.put(&record).await.unwrap();
        assert_eq!(store.list_by_status(BundleStatus::New).await.unwrap(), vec![id]);

        record.transition(BundleStatus::Queued, 10);
        store.put(&record).await.unwrap();

        assert!(store.list_by_status(BundleStatus::New).await.unwrap().is_empty());
        assert_eq!(
            store.list_by_status(BundleStatus::Queued).await.unwrap(),
            vec![id]
        );
    }

    #[tokio::test]
    async fn list_by_status_only_returns_matching_ids() {
        let store = store();
        let failed_id = Id::random();
        let mut failed = BundleRecord::new(failed_id, Id::random(), 0);
        failed.transition(BundleStatus::Failed, 1);
        store.put(&failed).await.unwrap();

        let new_record = BundleRecord::new(Id::random(), Id::random(), 0);
        store.put(&new_record).await.unwrap();

        let failed_ids = store.list_by_status(BundleStatus::Failed).await.unwrap();
        assert_eq!(failed_ids, vec![failed_id]);
    }

    #[tokio::test]
    async fn data_item_record_store_round_trips_a_batch() {
        let store = DataItemRecordStore::new(Arc::new(MemoryStore::new()));
        let parent = Id::random();
        let root = Id::random();
        let item_a = NormalizedDataItem::new(
            Id::random(),
            parent,
            root,
            1,
            0,
            0,
            0,
            0,
            None,
            None,
            vec![],
            None,
            0,
            5,
            now_millis(),
        );
        let item_b = NormalizedDataItem::new(
            Id::random(),
            parent,
            root,
            1,
            0,
            0,
            0,
            0,
            None,
            None,
            vec![],
            None,
            5,
            7,
            now_millis(),
        );

        store.put_batch(&[item_a.clone(), item_b.clone()]).await.unwrap();

        assert_eq!(store.get(&item_a.id).await.unwrap().unwrap().size, 5);
        assert_eq!(store.get(&item_b.id).await.unwrap().unwrap().size, 7);
        assert!(store.get(&Id::random()).await.unwrap().is_none());
    }
}

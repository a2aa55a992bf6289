use std::sync::Arc;
use std::time::Duration;

use ario_gateway_config::GatewayConfig;
use ario_gateway_data_source::CompositeDataSource;
use ario_gateway_primitives::Id;
use ario_gateway_resolver::AttributesStore;
use ario_gateway_scheduler::{spawn_polling, KeyedLock};
use ario_gateway_store::Storage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::download::BundleDownloader;
use crate::error::BundlesError;
use crate::indexer::DataItemIndexer;
use crate::queue::{BundleQueue, BundleQueueItem, DataItemIndexQueue, ReadyBundle, ReadyQueue};
use crate::repair::RepairWorker;
use crate::status::{now_millis, BundleRecord, BundleStatus};
use crate::store::{BundleRecordStore, DataItemRecordStore};
use crate::unbundle::Unbundler;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long a bundle may sit in `Downloading`/`Unbundling` before the
/// repair worker treats it as stuck; not named in `GatewayConfig` because
/// the source material is silent on it, so a conservative fixed value
/// stands in (documented as an open-question resolution).
const DEFAULT_STUCK_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Wires the admission queue, the bundles table, the downloader and the
/// unbundler into the end-to-end pipeline from spec §4.5: chain
/// indexer/admin admission, a download worker pool, a separate unbundle
/// worker pool, and nested-bundle reprocessing.
pub struct BundlePipeline {
    records: Arc<BundleRecordStore>,
    download_queue: Arc<BundleQueue>,
    ready_queue: Arc<ReadyQueue>,
    downloader: Arc<BundleDownloader>,
    unbundler: Arc<Unbundler>,
    indexer: Arc<DataItemIndexer>,
    /// Single-flight token around `(bundleId)` (spec §5): a bundle already
    /// being downloaded or unbundled is skipped if a duplicate admission
    /// (e.g. a repair-worker requeue racing a still-running worker) hands
    /// it to a second worker concurrently.
    processing: Arc<KeyedLock<Id>>,
}

impl BundlePipeline {
    #[must_use]
    pub fn new(
        records: Arc<BundleRecordStore>,
        download_queue: Arc<BundleQueue>,
        ready_queue: Arc<ReadyQueue>,
        downloader: Arc<BundleDownloader>,
        unbundler: Arc<Unbundler>,
        indexer: Arc<DataItemIndexer>,
    ) -> Self {
        Self {
            records,
            download_queue,
            ready_queue,
            downloader,
            unbundler,
            indexer,
            processing: Arc::new(KeyedLock::new()),
        }
    }

    #[must_use]
    pub fn indexer(&self) -> &Arc<DataItemIndexer> {
        &self.indexer
    }

    #[must_use]
    pub fn download_queue(&self) -> &Arc<BundleQueue> {
        &self.download_queue
    }

    #[must_use]
    pub fn records(&self) -> &Arc<BundleRecordStore> {
        &self.records
    }

    /// Admits a bundle for processing (chain-indexer or admin path, spec
    /// §4.5 "Queueing"). Returns `QueueFull` (surfaced as HTTP 429 on the
    /// admin path) without mutating the bundle row if the queue is at
    /// capacity. `data_root_trusted` is `Some` only for a bundle's own L1
    /// anchor transaction; nested bundles re-enqueued after unbundling pass
    /// `None` and are verified transitively (spec §4.6).
    pub async fn enqueue(
        &self,
        id: Id,
        root_transaction_id: Id,
        data_root_trusted: Option<[u8; 32]>,
    ) -> Result<(), BundlesError> {
        self.download_queue.try_enqueue(BundleQueueItem { id, root_transaction_id })?;

        let now = now_millis();
        let mut record = self
            .records
            .get(&id)
            .await?
            .unwrap_or_else(|| BundleRecord::new(id, root_transaction_id, now));
        record.data_root_trusted = record.data_root_trusted.or(data_root_trusted);
        record.transition(BundleStatus::Queued, now);
        self.records.put(&record).await?;
        Ok(())
    }

    /// Downloads one queued bundle and hands it to the ready queue. A no-op
    /// if another worker is already processing this bundle id.
    pub async fn process_download_one(&self, item: BundleQueueItem) -> Result<(), BundlesError> {
        let Some(_guard) = self.processing.try_acquire(item.id) else {
            debug!(id = %item.id, "skipping download, already in flight");
            return Ok(());
        };
        self.mark(item.id, item.root_transaction_id, BundleStatus::Downloading).await?;

        let path = match self.downloader.download(item.id).await {
            Ok(path) => path,
            Err(e) => {
                self.mark(item.id, item.root_transaction_id, BundleStatus::Failed).await?;
                return Err(e);
            }
        };

        self.ready_queue.try_enqueue(ReadyBundle {
            id: item.id,
            root_transaction_id: item.root_transaction_id,
            path,
        })
    }

    /// Unbundles one downloaded bundle, persists matched items' attributes,
    /// and re-enqueues any nested bundles it finds. A no-op if another
    /// worker is already processing this bundle id.
    pub async fn process_unbundle_one(&self, ready: ReadyBundle) -> Result<(), BundlesError> {
        let Some(_guard) = self.processing.try_acquire(ready.id) else {
            debug!(id = %ready.id, "skipping unbundle, already in flight");
            return Ok(());
        };
        self.mark(ready.id, ready.root_transaction_id, BundleStatus::Unbundling).await?;

        let bytes = match tokio::fs::read(ready.path.as_std_path()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.mark(ready.id, ready.root_transaction_id, BundleStatus::Failed).await?;
                return Err(BundlesError::Io(e));
            }
        };

        let outcome = match self.unbundler.unbundle(ready.id, ready.root_transaction_id, &bytes).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.mark(ready.id, ready.root_transaction_id, BundleStatus::Failed).await?;
                return Err(e);
            }
        };

        for (nested_id, root_tx) in &outcome.nested_bundles {
            if let Err(e) = self.enqueue(*nested_id, *root_tx, None).await {
                warn!(id = %nested_id, error = %e, "failed to enqueue nested bundle");
            }
        }

        for item in outcome.indexed_items {
            let item_id = item.id;
            if let Err(e) = self.indexer.try_enqueue(item) {
                warn!(id = %item_id, error = %e, "failed to enqueue data item for indexing");
            }
        }

        let now = now_millis();
        let mut record = self
            .records
            .get(&ready.id)
            .await?
            .unwrap_or_else(|| BundleRecord::new(ready.id, ready.root_transaction_id, now));
        record.data_item_count = outcome.data_item_count;
        record.matched_data_item_count = outcome.matched_data_item_count;
        record.transition(BundleStatus::Indexed, now);
        self.records.put(&record).await?;
        Ok(())
    }

    async fn mark(&self, id: Id, root_transaction_id: Id, status: BundleStatus) -> Result<(), BundlesError> {
        let now = now_millis();
        let mut record = self
            .records
            .get(&id)
            .await?
            .unwrap_or_else(|| BundleRecord::new(id, root_transaction_id, now));
        if status == BundleStatus::Downloading {
            record.import_attempt_count += 1;
        }
        record.transition(status, now);
        self.records.put(&record).await?;
        Ok(())
    }

    /// Spawns `count` download workers, each polling `download_queue` until
    /// `shutdown` is cancelled.
    pub fn spawn_download_workers(self: &Arc<Self>, count: usize, shutdown: CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
        (0..count)
            .map(|_| {
                let pipeline = Arc::clone(self);
                spawn_polling(POLL_INTERVAL, shutdown.clone(), move || {
                    let pipeline = Arc::clone(&pipeline);
                    async move {
                        match pipeline.download_queue.dequeue() {
                            Some(item) => {
                                if let Err(e) = pipeline.process_download_one(item).await {
                                    warn!(error = %e, "bundle download failed");
                                }
                                true
                            }
                            None => false,
                        }
                    }
                })
            })
            .collect()
    }

    /// Spawns `count` unbundle workers, each polling `ready_queue` until
    /// `shutdown` is cancelled.
    pub fn spawn_unbundle_workers(self: &Arc<Self>, count: usize, shutdown: CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
        (0..count)
            .map(|_| {
                let pipeline = Arc::clone(self);
                spawn_polling(POLL_INTERVAL, shutdown.clone(), move || {
                    let pipeline = Arc::clone(&pipeline);
                    async move {
                        match pipeline.ready_queue.dequeue() {
                            Some(ready) => {
                                if let Err(e) = pipeline.process_unbundle_one(ready).await {
                                    warn!(error = %e, "bundle unbundling failed");
                                }
                                true
                            }
                            None => false,
                        }
                    }
                })
            })
            .collect()
    }

    /// Spawns `count` data-item indexer workers, each batching up to
    /// `batch_size` items per pass (spec §4.5 "Indexing" concurrency >= 1).
    pub fn spawn_index_workers(self: &Arc<Self>, count: usize, batch_size: usize, shutdown: CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
        (0..count)
            .map(|_| self.indexer.spawn(batch_size, shutdown.clone()))
            .collect()
    }
}

/// Builds a pipeline and its matching repair worker from `GatewayConfig`,
/// sharing one `BundleRecordStore` and one `AttributesStore` between them.
#[must_use]
pub fn from_config(
    cfg: &GatewayConfig,
    bundle_store: Arc<dyn Storage>,
    data_source: Arc<CompositeDataSource>,
    attributes: Arc<AttributesStore>,
) -> (Arc<BundlePipeline>, RepairWorker) {
    let records = Arc::new(BundleRecordStore::new(bundle_store.clone()));
    let download_queue = Arc::new(BundleQueue::new(cfg.bundles.max_data_item_queue_size));
    let ready_queue = Arc::new(ReadyQueue::new(cfg.bundles.max_data_item_queue_size));
    let downloader = Arc::new(BundleDownloader::new(data_source, cfg.store.bundles_path.clone()));
    let unbundler = Arc::new(Unbundler::new(
        attributes,
        cfg.bundles.unbundle_filter.clone(),
        cfg.bundles.index_filter.clone(),
    ));
    let index_queue = Arc::new(DataItemIndexQueue::new(cfg.bundles.max_data_item_queue_size));
    let data_items = Arc::new(DataItemRecordStore::new(bundle_store));
    let indexer = Arc::new(DataItemIndexer::new(index_queue, data_items));

    let pipeline = Arc::new(BundlePipeline::new(
        records.clone(),
        download_queue.clone(),
        ready_queue,
        downloader,
        unbundler,
        indexer,
    ));
    let repair = RepairWorker::new(
        records,
        download_queue,
        cfg.bundles.bundle_repair_retry_batch_size,
        cfg.bundles.max_attempts,
        DEFAULT_STUCK_TIMEOUT,
    );
    (pipeline, repair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unbundle::Unbundler;
    use ario_gateway_data_source::{CompositeDataSource, DataSource, DataSourceError, GetDataRequest, GetDataResponse};
    use ario_gateway_primitives::{FilterExpr, SourceName};
    use ario_gateway_resolver::AttributesStore;
    use ario_gateway_store::MemoryStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;

    fn entry_bytes(size: u64, id: Id) -> Vec<u8> {
        let mut out = vec![0_u8; 32];
        out[..8].copy_from_slice(&size.to_le_bytes());
        out.extend_from_slice(id.as_bytes());
        out
    }

    fn data_item_bytes(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1_u16.to_le_bytes());
        buf.extend(vec![0_u8; 512]);
        buf.extend(vec![0_u8; 512]);
        buf.push(0);
        buf.push(0);
        buf.extend_from_slice(&0_u64.to_le_bytes());
        buf.extend_from_slice(&0_u64.to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    fn build_bundle(item_id: Id, payload: &[u8]) -> Vec<u8> {
        let entry = data_item_bytes(payload);
        let mut header = vec![0_u8; 32];
        header[..8].copy_from_slice(&1_u64.to_le_bytes());
        header.extend(entry_bytes(entry.len() as u64, item_id));
        header.extend(entry);
        header
    }

    fn test_indexer() -> Arc<DataItemIndexer> {
        Arc::new(DataItemIndexer::new(
            Arc::new(DataItemIndexQueue::new(100)),
            Arc::new(DataItemRecordStore::new(Arc::new(MemoryStore::new()))),
        ))
    }

    struct StaticSource(Vec<u8>);

    #[async_trait]
    impl DataSource for StaticSource {
        fn name(&self) -> SourceName {
            SourceName::TxData
        }

        async fn get_data(&self, _request: &GetDataRequest) -> Result<GetDataResponse, DataSourceError> {
            let bytes = self.0.clone();
            let size = bytes.len() as u64;
            Ok(GetDataResponse {
                stream: Box::pin(stream::once(async move { Ok(Bytes::from(bytes)) })),
                size,
                verified: false,
                trusted: true,
                cached: false,
                hash: None,
                content_type: None,
                source: SourceName::TxData,
            })
        }
    }

    #[tokio::test]
    async fn end_to_end_download_then_unbundle_indexes_the_item() {
        let item_id = Id::random();
        let bundle_id = Id::random();
        let bundle_bytes = build_bundle(item_id, b"payload");

        let data_source = Arc::new(CompositeDataSource::new(
            vec![Arc::new(StaticSource(bundle_bytes))],
            &["tx-data".to_owned()],
            &["tx-data".to_owned()],
        ));

        let spool_dir = camino::Utf8PathBuf::from(std::env::temp_dir().to_string_lossy().to_string());
        let downloader = Arc::new(BundleDownloader::new(data_source, spool_dir));
        let attributes = Arc::new(AttributesStore::new(Arc::new(MemoryStore::new())));
        let unbundler = Arc::new(Unbundler::new(attributes.clone(), FilterExpr::Always, FilterExpr::Always));
        let records = Arc::new(BundleRecordStore::new(Arc::new(MemoryStore::new())));
        let download_queue = Arc::new(BundleQueue::new(10));
        let ready_queue = Arc::new(ReadyQueue::new(10));

        let indexer = test_indexer();
        let pipeline = BundlePipeline::new(
            records.clone(),
            download_queue.clone(),
            ready_queue.clone(),
            downloader,
            unbundler,
            indexer.clone(),
        );

        pipeline.enqueue(bundle_id, bundle_id, Some([1; 32])).await.unwrap();
        let item = download_queue.dequeue().unwrap();
        pipeline.process_download_one(item).await.unwrap();

        let ready = ready_queue.dequeue().unwrap();
        pipeline.process_unbundle_one(ready).await.unwrap();

        let record = records.get(&bundle_id).await.unwrap().unwrap();
        assert_eq!(record.status, BundleStatus::Indexed);
        assert_eq!(record.matched_data_item_count, 1);

        let attrs = attributes.get(&item_id).await.unwrap().unwrap();
        assert_eq!(attrs.parent_id, Some(bundle_id));

        let indexed = indexer.process_batch_once(10).await.unwrap();
        assert_eq!(indexed, 1, "the matched item must reach the data-item indexer queue");
    }

    #[tokio::test]
    async fn queue_full_leaves_the_record_untouched() {
        let records = Arc::new(BundleRecordStore::new(Arc::new(MemoryStore::new())));
        let download_queue = Arc::new(BundleQueue::new(1));
        let ready_queue = Arc::new(ReadyQueue::new(1));
        let data_source = Arc::new(CompositeDataSource::new(vec![], &[], &[]));
        let downloader = Arc::new(BundleDownloader::new(data_source, camino::Utf8PathBuf::from("/tmp")));
        let attributes = Arc::new(AttributesStore::new(Arc::new(MemoryStore::new())));
        let unbundler = Arc::new(Unbundler::new(attributes, FilterExpr::Always, FilterExpr::Always));
        let pipeline = BundlePipeline::new(records.clone(), download_queue.clone(), ready_queue, downloader, unbundler, test_indexer());

        pipeline.enqueue(Id::random(), Id::random(), None).await.unwrap();
        let err = pipeline.enqueue(Id::random(), Id::random(), None).await.unwrap_err();
        assert!(matches!(err, BundlesError::QueueFull));
    }

    #[tokio::test]
    async fn a_bundle_already_in_flight_is_skipped_rather_than_processed_twice() {
        let records = Arc::new(BundleRecordStore::new(Arc::new(MemoryStore::new())));
        let download_queue = Arc::new(BundleQueue::new(10));
        let ready_queue = Arc::new(ReadyQueue::new(10));
        let data_source = Arc::new(CompositeDataSource::new(vec![], &["tx-data".to_owned()], &["tx-data".to_owned()]));
        let spool_dir = camino::Utf8PathBuf::from(std::env::temp_dir().to_string_lossy().to_string());
        let downloader = Arc::new(BundleDownloader::new(data_source, spool_dir));
        let attributes = Arc::new(AttributesStore::new(Arc::new(MemoryStore::new())));
        let unbundler = Arc::new(Unbundler::new(attributes, FilterExpr::Always, FilterExpr::Always));
        let pipeline = BundlePipeline::new(records.clone(), download_queue, ready_queue, downloader, unbundler, test_indexer());

        let bundle_id = Id::random();
        let guard = pipeline.processing.try_acquire(bundle_id).unwrap();

        pipeline
            .process_download_one(BundleQueueItem { id: bundle_id, root_transaction_id: bundle_id })
            .await
            .unwrap();

        assert!(records.get(&bundle_id).await.unwrap().is_none(), "skipped bundle must not be touched");

        drop(guard);
    }
}

use std::sync::Arc;
use std::time::Duration;

use ario_gateway_bundles::{BundleRecordStore, BundleStatus};
use ario_gateway_data_source::{CompositeDataSource, GetDataRequest};
use ario_gateway_merkle::compute_data_root;
use ario_gateway_primitives::Id;
use ario_gateway_resolver::AttributesStore;
use ario_gateway_scheduler::{spawn_periodic, CpuPool};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::VerificationError;
use crate::preferred::PreferredRoots;

/// Bundles considered per `run_once` pass. Not named in `GatewayConfig`
/// because the source material only specifies `max_retries` and the run
/// interval, so a conservative fixed batch size stands in (documented as
/// an open-question resolution).
const DEFAULT_VERIFICATION_BATCH_SIZE: usize = 50;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub considered: usize,
    pub verified: usize,
    pub failed: usize,
}

/// Re-verifies indexed bundles against their trusted chain `data_root`
/// (spec §4.6): fetches the full payload, recomputes the Merkle root, and
/// on a match marks the bundle and every descendant data item `verified`.
/// A mismatch only increments `verification_failure_count` and is logged;
/// the bundle is never purged automatically.
pub struct VerificationWorker {
    records: Arc<BundleRecordStore>,
    attributes: Arc<AttributesStore>,
    data_source: Arc<CompositeDataSource>,
    preferred: Arc<PreferredRoots>,
    /// Offloads `compute_data_root`'s hashing to a pool sized to core
    /// count, separate from the I/O-bound task pool driving `fetch` (spec
    /// §5 "Scheduling model").
    cpu_pool: Arc<CpuPool>,
    batch_size: usize,
    max_retries: u32,
}

impl VerificationWorker {
    #[must_use]
    pub fn new(
        records: Arc<BundleRecordStore>,
        attributes: Arc<AttributesStore>,
        data_source: Arc<CompositeDataSource>,
        preferred: Arc<PreferredRoots>,
        batch_size: usize,
        max_retries: u32,
    ) -> Self {
        Self {
            records,
            attributes,
            data_source,
            preferred,
            cpu_pool: Arc::new(CpuPool::new()),
            batch_size,
            max_retries,
        }
    }

    pub async fn run_once(&self) -> Result<VerificationOutcome, VerificationError> {
        let mut candidates = self.records.list_by_status(BundleStatus::Indexed).await?;
        let mut rows = Vec::with_capacity(candidates.len());
        for id in candidates.drain(..) {
            let Some(record) = self.records.get(&id).await? else {
                continue;
            };
            if record.verified || record.data_root_trusted.is_none() {
                continue;
            }
            if record.verification_failure_count >= self.max_retries {
                continue;
            }
            rows.push(record);
        }

        rows.sort_by_key(|r| (!self.preferred.contains(&r.root_transaction_id), r.verification_failure_count));
        rows.truncate(self.batch_size);

        let mut outcome = VerificationOutcome {
            considered: rows.len(),
            ..VerificationOutcome::default()
        };

        for mut record in rows {
            let data_root_trusted = record
                .data_root_trusted
                .expect("filtered to records with a trusted data root above");

            let bytes = match self.fetch(record.id).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(id = %record.id, error = %e, "verification fetch failed");
                    record.verification_failure_count += 1;
                    self.records.put(&record).await?;
                    outcome.failed += 1;
                    continue;
                }
            };

            let computed = match self.cpu_pool.run(move || compute_data_root(&bytes)).await {
                Ok(root) => root,
                Err(e) => {
                    warn!(id = %record.id, error = %e, "data root computation failed");
                    record.verification_failure_count += 1;
                    self.records.put(&record).await?;
                    outcome.failed += 1;
                    continue;
                }
            };
            if computed == data_root_trusted {
                record.verified = true;
                self.records.put(&record).await?;
                self.mark_verified_recursively(record.id).await?;
                outcome.verified += 1;
                info!(id = %record.id, "bundle verified");
            } else {
                record.verification_failure_count += 1;
                self.records.put(&record).await?;
                outcome.failed += 1;
                warn!(id = %record.id, "data root mismatch during verification");
            }
        }

        Ok(outcome)
    }

    async fn fetch(&self, id: Id) -> Result<Vec<u8>, VerificationError> {
        let response = self
            .data_source
            .get_data_background(&GetDataRequest::whole(id))
            .await?;
        let mut bytes = Vec::with_capacity(response.size as usize);
        let mut stream = response.stream;
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        Ok(bytes)
    }

    /// Marks `id`'s own `ItemAttributes` (if indexed) verified, then
    /// recurses into its children via the parent index, so a verified
    /// bundle's status reaches every data item it contains, including
    /// nested bundles' own descendants.
    async fn mark_verified_recursively(&self, id: Id) -> Result<(), VerificationError> {
        if let Some(mut attrs) = self.attributes.get(&id).await? {
            if !attrs.verified {
                attrs.mark_verified();
                self.attributes.put(&attrs).await?;
            }
        }
        for child in self.attributes.children_of(&id).await? {
            Box::pin(self.mark_verified_recursively(child)).await?;
        }
        Ok(())
    }

    /// Builds a worker from `GatewayConfig.verification`.
    #[must_use]
    pub fn from_config(
        cfg: &ario_gateway_config::GatewayConfig,
        records: Arc<BundleRecordStore>,
        attributes: Arc<AttributesStore>,
        data_source: Arc<CompositeDataSource>,
        preferred: Arc<PreferredRoots>,
    ) -> Self {
        Self::new(
            records,
            attributes,
            data_source,
            preferred,
            DEFAULT_VERIFICATION_BATCH_SIZE,
            cfg.verification.max_retries,
        )
    }

    /// Spawns a task that runs [`Self::run_once`] every `interval` until
    /// `shutdown` is cancelled.
    pub fn spawn(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        spawn_periodic(interval, shutdown, move || {
            let worker = Arc::clone(&self);
            async move {
                let outcome = worker.run_once().await?;
                if outcome.considered > 0 {
                    info!(?outcome, "verification pass complete");
                }
                Ok::<(), VerificationError>(())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ario_gateway_bundles::BundleRecord;
    use ario_gateway_data_source::{DataSource, DataSourceError, GetDataResponse};
    use ario_gateway_primitives::{ItemAttributes, SourceName};
    use ario_gateway_store::MemoryStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;
    use std::collections::HashMap;

    struct StaticSource(HashMap<Id, Vec<u8>>);

    #[async_trait]
    impl DataSource for StaticSource {
        fn name(&self) -> SourceName {
            SourceName::TxData
        }

        async fn get_data(&self, request: &ario_gateway_data_source::GetDataRequest) -> Result<GetDataResponse, DataSourceError> {
            let bytes = self.0.get(&request.id).cloned().ok_or(DataSourceError::NotFound("tx-data"))?;
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

    fn harness(payloads: HashMap<Id, Vec<u8>>) -> (Arc<BundleRecordStore>, Arc<AttributesStore>, VerificationWorker) {
        let records = Arc::new(BundleRecordStore::new(Arc::new(MemoryStore::new())));
        let attributes = Arc::new(AttributesStore::new(Arc::new(MemoryStore::new())));
        let data_source = Arc::new(CompositeDataSource::new(
            vec![Arc::new(StaticSource(payloads))],
            &["tx-data".to_owned()],
            &["tx-data".to_owned()],
        ));
        let preferred = Arc::new(PreferredRoots::new());
        let worker = VerificationWorker::new(records.clone(), attributes.clone(), data_source, preferred, 10, 5);
        (records, attributes, worker)
    }

    fn indexed_record(id: Id, data_root_trusted: [u8; 32]) -> BundleRecord {
        let mut record = BundleRecord::new(id, id, 0);
        record.transition(BundleStatus::Indexed, 0);
        record.data_root_trusted = Some(data_root_trusted);
        record
    }

    #[tokio::test]
    async fn matching_data_root_marks_bundle_and_children_verified() {
        let bundle_id = Id::random();
        let child_id = Id::random();
        let payload = b"bundle-bytes".to_vec();
        let root = compute_data_root(&payload);

        let (records, attributes, worker) = harness(HashMap::from([(bundle_id, payload)]));
        records.put(&indexed_record(bundle_id, root)).await.unwrap();
        attributes
            .put(&ItemAttributes::new_nested(child_id, bundle_id, 5, 0, 0, None))
            .await
            .unwrap();

        let outcome = worker.run_once().await.unwrap();
        assert_eq!(outcome, VerificationOutcome { considered: 1, verified: 1, failed: 0 });

        assert!(records.get(&bundle_id).await.unwrap().unwrap().verified);
        assert!(attributes.get(&child_id).await.unwrap().unwrap().verified);
    }

    #[tokio::test]
    async fn mismatched_data_root_increments_failure_count_and_stays_unverified() {
        let bundle_id = Id::random();
        let payload = b"bundle-bytes".to_vec();
        let wrong_root = [9_u8; 32];

        let (records, _attributes, worker) = harness(HashMap::from([(bundle_id, payload)]));
        records.put(&indexed_record(bundle_id, wrong_root)).await.unwrap();

        let outcome = worker.run_once().await.unwrap();
        assert_eq!(outcome, VerificationOutcome { considered: 1, verified: 0, failed: 1 });

        let record = records.get(&bundle_id).await.unwrap().unwrap();
        assert!(!record.verified);
        assert_eq!(record.verification_failure_count, 1);
    }

    #[tokio::test]
    async fn bundles_without_a_trusted_data_root_are_skipped() {
        let bundle_id = Id::random();
        let (records, _attributes, worker) = harness(HashMap::new());
        let mut record = BundleRecord::new(bundle_id, bundle_id, 0);
        record.transition(BundleStatus::Indexed, 0);
        records.put(&record).await.unwrap();

        let outcome = worker.run_once().await.unwrap();
        assert_eq!(outcome, VerificationOutcome::default());
    }

    #[tokio::test]
    async fn bundles_at_the_retry_cap_are_skipped() {
        let bundle_id = Id::random();
        let payload = b"bytes".to_vec();
        let root = compute_data_root(&payload);
        let (records, _attributes, worker) = harness(HashMap::from([(bundle_id, payload)]));

        let mut record = indexed_record(bundle_id, root);
        record.verification_failure_count = 5;
        records.put(&record).await.unwrap();

        let outcome = worker.run_once().await.unwrap();
        assert_eq!(outcome, VerificationOutcome::default());
    }

    #[tokio::test]
    async fn preferred_roots_are_verified_before_others_under_a_tight_batch() {
        let preferred_id = Id::random();
        let other_id = Id::random();
        let payload_a = b"aaa".to_vec();
        let payload_b = b"bbb".to_vec();
        let root_a = compute_data_root(&payload_a);
        let root_b = compute_data_root(&payload_b);

        let records = Arc::new(BundleRecordStore::new(Arc::new(MemoryStore::new())));
        let attributes = Arc::new(AttributesStore::new(Arc::new(MemoryStore::new())));
        let data_source = Arc::new(CompositeDataSource::new(
            vec![Arc::new(StaticSource(HashMap::from([
                (preferred_id, payload_a),
                (other_id, payload_b),
            ])))],
            &["tx-data".to_owned()],
            &["tx-data".to_owned()],
        ));
        let preferred = Arc::new(PreferredRoots::new());
        preferred.set(std::collections::HashSet::from([preferred_id]));
        let worker = VerificationWorker::new(records.clone(), attributes, data_source, preferred, 1, 5);

        records.put(&indexed_record(other_id, root_b)).await.unwrap();
        records.put(&indexed_record(preferred_id, root_a)).await.unwrap();

        let outcome = worker.run_once().await.unwrap();
        assert_eq!(outcome, VerificationOutcome { considered: 1, verified: 1, failed: 0 });
        assert!(records.get(&preferred_id).await.unwrap().unwrap().verified);
        assert!(!records.get(&other_id).await.unwrap().unwrap().verified);
    }
}

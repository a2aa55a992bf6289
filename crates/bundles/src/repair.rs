use std::sync::Arc;
use std::time::Duration;

use crate::error::BundlesError;
use crate::queue::{BundleQueue, BundleQueueItem};
use crate::status::{now_millis, BundleStatus};
use crate::store::BundleRecordStore;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepairOutcome {
    pub requeued: usize,
    pub dropped: usize,
}

/// Periodic repair worker (spec §4.5 "Repair"): re-queues bundles stuck in
/// `Failed`, or parked in `Downloading`/`Unbundling` past `stuck_timeout`,
/// in batches of `batch_size`, incrementing `import_attempt_count` each
/// time and dropping ones that have reached `max_attempts` permanently.
pub struct RepairWorker {
    store: Arc<BundleRecordStore>,
    queue: Arc<BundleQueue>,
    batch_size: usize,
    max_attempts: u32,
    stuck_timeout: Duration,
}

impl RepairWorker {
    #[must_use]
    pub fn new(
        store: Arc<BundleRecordStore>,
        queue: Arc<BundleQueue>,
        batch_size: usize,
        max_attempts: u32,
        stuck_timeout: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            batch_size,
            max_attempts,
            stuck_timeout,
        }
    }

    pub async fn run_once(&self) -> Result<RepairOutcome, BundlesError> {
        let now = now_millis();
        let stuck_timeout_millis = i64::try_from(self.stuck_timeout.as_millis()).unwrap_or(i64::MAX);

        let mut candidate_ids = self.store.list_by_status(BundleStatus::Failed).await?;
        for stuck_status in [BundleStatus::Downloading, BundleStatus::Unbundling] {
            candidate_ids.extend(self.store.list_by_status(stuck_status).await?);
        }

        let mut outcome = RepairOutcome::default();
        for id in candidate_ids.into_iter().take(self.batch_size) {
            let Some(mut record) = self.store.get(&id).await? else {
                continue;
            };

            if record.status != BundleStatus::Failed {
                let stuck_for = now.saturating_sub(record.last_status_change_at);
                if stuck_for < stuck_timeout_millis {
                    continue;
                }
            }

            if record.is_permanently_failed(self.max_attempts) {
                outcome.dropped += 1;
                continue;
            }

            record.import_attempt_count += 1;
            record.transition(BundleStatus::Queued, now);

            if self
                .queue
                .try_enqueue(BundleQueueItem {
                    id: record.id,
                    root_transaction_id: record.root_transaction_id,
                })
                .is_ok()
            {
                outcome.requeued += 1;
                self.store.put(&record).await?;
            }
        }

        Ok(outcome)
    }
}

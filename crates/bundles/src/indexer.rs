use std::sync::Arc;
use std::time::Duration;

use ario_gateway_primitives::NormalizedDataItem;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ario_gateway_scheduler::spawn_polling;

use crate::error::BundlesError;
use crate::queue::DataItemIndexQueue;
use crate::store::DataItemRecordStore;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Emitted once an item clears a batch write to the data-item table (spec
/// §4.5 "Indexing"). The attributes cache is updated synchronously inside
/// `Unbundler::unbundle` already; this event is for listeners that only
/// care about the fully-indexed row, chiefly an (external) webhook worker.
#[derive(Debug, Clone)]
pub struct DataItemIndexed {
    pub item: NormalizedDataItem,
}

/// Drains the data-item index queue in batches and emits `dataItemIndexed`
/// per item once its row is durable (spec §4.5: "Matched items are
/// converted to `NormalizedDataItem` and pushed to a data-item indexer
/// queue with concurrency >= 1. Writes happen in batches to the bundles
/// DB... a `dataItemIndexed` event is emitted").
pub struct DataItemIndexer {
    queue: Arc<DataItemIndexQueue>,
    records: Arc<DataItemRecordStore>,
    events: broadcast::Sender<DataItemIndexed>,
}

impl DataItemIndexer {
    #[must_use]
    pub fn new(queue: Arc<DataItemIndexQueue>, records: Arc<DataItemRecordStore>) -> Self {
        let (events, _receiver) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { queue, records, events }
    }

    /// Subscribes to `dataItemIndexed`; the attributes cache and the
    /// webhook worker are the spec's named listeners.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DataItemIndexed> {
        self.events.subscribe()
    }

    pub fn try_enqueue(&self, item: NormalizedDataItem) -> Result<(), BundlesError> {
        self.queue.try_enqueue(item)
    }

    /// Writes up to `batch_size` queued items in one pass and emits one
    /// event per item afterward. Returns the number of items written.
    pub async fn process_batch_once(&self, batch_size: usize) -> Result<usize, BundlesError> {
        let mut batch = Vec::with_capacity(batch_size);
        while batch.len() < batch_size {
            match self.queue.dequeue() {
                Some(item) => batch.push(item),
                None => break,
            }
        }
        if batch.is_empty() {
            return Ok(0);
        }

        self.records.put_batch(&batch).await?;

        for item in batch.iter().cloned() {
            if self.events.send(DataItemIndexed { item }).is_err() {
                debug!("dataItemIndexed emitted with no subscribers listening");
            }
        }

        Ok(batch.len())
    }

    /// Spawns a single indexer worker that polls the queue until `shutdown`
    /// is cancelled. A separate pool from download/unbundle so a slow
    /// indexer can't back up bundle processing.
    pub fn spawn(self: &Arc<Self>, batch_size: usize, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        let indexer = Arc::clone(self);
        spawn_polling(POLL_INTERVAL, shutdown, move || {
            let indexer = Arc::clone(&indexer);
            async move {
                match indexer.process_batch_once(batch_size).await {
                    Ok(n) => n > 0,
                    Err(e) => {
                        warn!(error = %e, "data item indexing batch failed");
                        false
                    }
                }
            }
        })
    }
}

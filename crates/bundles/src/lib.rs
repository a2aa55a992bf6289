//! The ANS-104 unbundling pipeline (spec §4.5): an admission-controlled
//! queue, a download worker pool that spools bundle bytes to a local temp
//! sink, a separate unbundle worker pool that parses headers and persists
//! filtered data-item attributes, an indexer worker pool that batches
//! matched items into the data-item table and emits `dataItemIndexed`, and
//! a periodic repair worker for bundles stuck or failed mid-pipeline.

pub mod download;
pub mod error;
pub mod indexer;
pub mod pipeline;
pub mod queue;
pub mod repair;
pub mod status;
pub mod store;
pub mod unbundle;

pub use download::BundleDownloader;
pub use error::BundlesError;
pub use indexer::{DataItemIndexed, DataItemIndexer};
pub use pipeline::{from_config, BundlePipeline};
pub use queue::{BoundedQueue, BundleQueue, BundleQueueItem, DataItemIndexQueue, ReadyBundle, ReadyQueue};
pub use repair::{RepairOutcome, RepairWorker};
pub use status::{now_millis, BundleRecord, BundleStatus};
pub use store::{BundleRecordStore, DataItemRecordStore};
pub use unbundle::{UnbundleOutcome, Unbundler};

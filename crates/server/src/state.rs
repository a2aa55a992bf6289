use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use prometheus_client::registry::Registry;

use ario_gateway_bundles::BundlePipeline;
use ario_gateway_chunks::{ChunkBroadcaster, ChunkRetrievalService, ChunkStore};
use ario_gateway_config::GatewayConfig;
use ario_gateway_data_source::CompositeDataSource;
use ario_gateway_peers::PeerLedger;
use ario_gateway_resolver::AttributesStore;
use ario_gateway_verification::PreferredRoots;

use crate::metrics::Metrics;

/// Everything a handler needs, wired up once at startup (spec §9's
/// "explicit init order" redesign replaces global singletons with exactly
/// this struct, constructed bottom-up and handed to the router as a single
/// `Extension`).
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub data_source: Arc<CompositeDataSource>,
    pub bundles: Arc<BundlePipeline>,
    pub attributes: Arc<AttributesStore>,
    pub chunk_store: Arc<ChunkStore>,
    pub chunk_retrieval: Arc<ChunkRetrievalService>,
    pub chunk_broadcaster: Arc<ChunkBroadcaster>,
    pub peers: Arc<PeerLedger>,
    pub preferred_roots: Arc<PreferredRoots>,
    pub metrics: Arc<Metrics>,
    pub registry: Arc<Mutex<Registry>>,
    pub node_release: String,
    pub started_at: Instant,
}

impl AppState {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<GatewayConfig>,
        data_source: Arc<CompositeDataSource>,
        bundles: Arc<BundlePipeline>,
        attributes: Arc<AttributesStore>,
        chunk_store: Arc<ChunkStore>,
        chunk_retrieval: Arc<ChunkRetrievalService>,
        chunk_broadcaster: Arc<ChunkBroadcaster>,
        peers: Arc<PeerLedger>,
        preferred_roots: Arc<PreferredRoots>,
        metrics: Arc<Metrics>,
        registry: Arc<Mutex<Registry>>,
        node_release: String,
    ) -> Self {
        Self {
            config,
            data_source,
            bundles,
            attributes,
            chunk_store,
            chunk_retrieval,
            chunk_broadcaster,
            peers,
            preferred_roots,
            metrics,
            registry,
            node_release,
            started_at: Instant::now(),
        }
    }
}

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RouteLabels {
    pub route: String,
    pub status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BroadcastLabels {
    pub outcome: String,
}

/// Process-wide Prometheus state (spec §9 redesign: a shared mutable
/// metrics object becomes one `Registry` owned by `AppState`, not a
/// per-request singleton). `chunk_retrieval_inflight` backs scenario S5;
/// `chunk_broadcast_total` backs scenario S6.
#[derive(Clone, Debug)]
pub struct Metrics {
    pub http_requests: Family<RouteLabels, Counter>,
    pub http_request_duration: Family<RouteLabels, Histogram>,
    pub chunk_retrieval_inflight: Gauge,
    pub chunk_broadcast_total: Family<BroadcastLabels, Counter>,
}

impl Metrics {
    #[must_use]
    pub fn new(registry: &mut Registry) -> Self {
        let gateway_registry = registry.sub_registry_with_prefix("ario_gateway");

        let http_requests = Family::<RouteLabels, Counter>::default();
        gateway_registry.register("http_requests", "HTTP requests by route and status", http_requests.clone());

        let http_request_duration = Family::<RouteLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.001, 2.0, 12))
        });
        gateway_registry.register(
            "http_request_duration_seconds",
            "HTTP request latency by route and status",
            http_request_duration.clone(),
        );

        let chunk_retrieval_inflight = Gauge::default();
        gateway_registry.register(
            "chunk_retrieval_inflight",
            "Distinct chunk offsets with a retrieval currently in flight",
            chunk_retrieval_inflight.clone(),
        );

        let chunk_broadcast_total = Family::<BroadcastLabels, Counter>::default();
        gateway_registry.register(
            "chunk_broadcast_total",
            "Chunk broadcasts by outcome (ok / shortfall)",
            chunk_broadcast_total.clone(),
        );

        Self {
            http_requests,
            http_request_duration,
            chunk_retrieval_inflight,
            chunk_broadcast_total,
        }
    }
}

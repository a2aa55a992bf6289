use std::sync::Arc;

use axum::extract::Extension;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct InfoBody {
    release: String,
    #[serde(rename = "unbundleFilter")]
    unbundle_filter: String,
    #[serde(rename = "indexFilter")]
    index_filter: String,
    #[serde(rename = "trustedGatewayCount")]
    trusted_gateway_count: usize,
    #[serde(rename = "peerCount")]
    peer_count: usize,
    #[serde(rename = "uptimeSeconds")]
    uptime_seconds: u64,
}

/// `GET /ar-io/info`: node identity/release/filters. spec.md's own scope
/// section names rate-limiter and payment plumbing as external
/// collaborators this gateway doesn't implement, so those fields are
/// simply absent rather than faked.
pub async fn info(Extension(state): Extension<Arc<AppState>>) -> Response {
    let body = InfoBody {
        release: state.node_release.clone(),
        unbundle_filter: format!("{:?}", state.config.bundles.unbundle_filter),
        index_filter: format!("{:?}", state.config.bundles.index_filter),
        trusted_gateway_count: state.config.peers.trusted_gateway_urls.len(),
        peer_count: state.peers.len(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    };
    Json(body).into_response()
}

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use prometheus_client::encoding::text::encode;

use crate::state::AppState;

/// `GET /healthz`: process liveness, not readiness — this crate has no
/// dependency-health aggregation to report beyond "the server loop answers".
pub async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

/// `GET /metrics`: Prometheus text exposition of the process-wide
/// `Registry` built in `Metrics::new`.
pub async fn metrics(Extension(state): Extension<Arc<AppState>>) -> Response {
    let mut buffer = String::new();
    if let Err(e) = encode(&mut buffer, &state.registry.lock()) {
        tracing::error!(error = %e, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response();
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/openmetrics-text; version=1.0.0; charset=utf-8")],
        buffer,
    )
        .into_response()
}

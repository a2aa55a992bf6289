use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::admin::{bundle_status, export_parquet, queue_bundle, queue_data_item};
use crate::handlers::ambient::{healthz, metrics};
use crate::handlers::chunk::{get_chunk_data, get_chunk_json, post_chunk};
use crate::handlers::data::{get_data, get_data_with_path};
use crate::handlers::info::info;
use crate::state::AppState;

/// Builds the gateway's HTTP surface (spec §6), grounded on the same
/// "build routers, merge, layer state last" shape as the rest of this
/// codebase's axum services.
#[must_use]
pub fn create_router(state: Arc<AppState>) -> Router {
    let data_routes = Router::new()
        .route("/:id", get(get_data).head(get_data))
        .route("/:id/*path", get(get_data_with_path).head(get_data_with_path));

    let chunk_routes = Router::new()
        .route("/chunk/:absolute_offset", get(get_chunk_json).head(get_chunk_json))
        .route("/chunk/:absolute_offset/data", get(get_chunk_data).head(get_chunk_data))
        .route("/chunk", post(post_chunk));

    let admin_routes = Router::new()
        .route("/ar-io/admin/queue-bundle", post(queue_bundle))
        .route("/ar-io/admin/queue-data-item", post(queue_data_item))
        .route("/ar-io/admin/export-parquet", post(export_parquet))
        .route("/ar-io/admin/bundle-status/:id", get(bundle_status))
        .route("/ar-io/info", get(info));

    let ambient_routes = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics));

    chunk_routes
        .merge(admin_routes)
        .merge(ambient_routes)
        .merge(data_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(Extension(Arc::clone(&state)))
}

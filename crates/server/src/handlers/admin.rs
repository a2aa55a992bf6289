use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use ario_gateway_primitives::{Id, ItemAttributes};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueueBundleBody {
    id: Id,
    #[serde(rename = "rootTxId")]
    root_tx_id: Option<Id>,
}

/// `POST /ar-io/admin/queue-bundle`: admin-forced admission into the
/// download pipeline (spec §4.5). Returns 429 on `QueueFull` via
/// `ApiError::from(BundlesError)`.
pub async fn queue_bundle(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<QueueBundleBody>,
) -> Result<Response, ApiError> {
    let root_transaction_id = body.root_tx_id.unwrap_or(body.id);
    state.bundles.enqueue(body.id, root_transaction_id, None).await?;
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "queued" }))).into_response())
}

#[derive(Debug, Deserialize)]
pub struct QueueDataItemBody {
    id: Id,
    #[serde(rename = "parentId")]
    parent_id: Id,
    size: u64,
    offset: u64,
    #[serde(rename = "dataOffset")]
    data_offset: u64,
    #[serde(rename = "contentType")]
    content_type: Option<String>,
}

/// `POST /ar-io/admin/queue-data-item`: optimistic indexing ahead of
/// bundle processing finishing (spec §4.5 "Queueing" / §4.4) — writes the
/// item's attributes row immediately rather than waiting for the
/// unbundler to reach it.
pub async fn queue_data_item(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<QueueDataItemBody>,
) -> Result<Response, ApiError> {
    let attrs = ItemAttributes::new_nested(
        body.id,
        body.parent_id,
        body.size,
        body.offset,
        body.data_offset,
        body.content_type,
    );
    state.attributes.put(&attrs).await?;
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "indexed" }))).into_response())
}

/// `POST /ar-io/admin/export-parquet`: spec.md names this an external
/// collaborator (the analytics export pipeline), so this route is a
/// stub rather than a guessed implementation.
pub async fn export_parquet() -> Result<Response, ApiError> {
    Err(ApiError::NotImplemented("parquet export"))
}

#[derive(Debug, Serialize)]
struct BundleStatusBody {
    id: Id,
    root_transaction_id: Id,
    status: &'static str,
    import_attempt_count: u32,
    matched_data_item_count: u64,
    data_item_count: u64,
    verification_failure_count: u32,
    verified: bool,
    last_status_change_at: i64,
}

/// `GET /ar-io/admin/bundle-status/{id}`: current bundles-row snapshot
/// (spec §6).
pub async fn bundle_status(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Id>,
) -> Result<Response, ApiError> {
    let record = state.bundles.records().get(&id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(BundleStatusBody {
        id: record.id,
        root_transaction_id: record.root_transaction_id,
        status: record.status.as_str(),
        import_attempt_count: record.import_attempt_count,
        matched_data_item_count: record.matched_data_item_count,
        data_item_count: record.data_item_count,
        verification_failure_count: record.verification_failure_count,
        verified: record.verified,
        last_status_change_at: record.last_status_change_at,
    })
    .into_response())
}

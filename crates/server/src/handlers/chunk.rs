use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Extension, Path};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;

use ario_gateway_chunks::ChunkMetadata;

use crate::error::ApiError;
use crate::state::AppState;

fn text(s: &str) -> HeaderValue {
    HeaderValue::from_str(s).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// `GET,HEAD /chunk/{absoluteOffset}`: the JSON chunk response from spec
/// §6, read through `ChunkRetrievalService` (cache fast path, proof
/// validation, peer fallback). Scenario S5's `chunk_retrieval_inflight`
/// gauge is sampled around the call since `SingleFlight` only tracks
/// offsets actively being fetched.
pub async fn get_chunk_json(
    Extension(state): Extension<Arc<AppState>>,
    method: Method,
    Path(absolute_offset): Path<u64>,
) -> Result<Response, ApiError> {
    let retrieved = fetch_chunk(&state, absolute_offset).await?;

    let body = json!({
        "chunk": URL_SAFE_NO_PAD.encode(&retrieved.bytes),
        "data_root": URL_SAFE_NO_PAD.encode(retrieved.metadata.data_root),
        "data_size": retrieved.metadata.data_size.to_string(),
        "data_path": URL_SAFE_NO_PAD.encode(&retrieved.metadata.data_path),
        "tx_path": retrieved.metadata.tx_path.as_ref().map(|p| URL_SAFE_NO_PAD.encode(p)),
        "packing": "unpacked",
    });

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let digest = URL_SAFE_NO_PAD.encode(retrieved.metadata.hash);
    headers.insert("x-ar-io-digest", text(&digest));
    headers.insert(header::ETAG, text(&format!("\"{digest}\"")));

    let body_bytes = serde_json::to_vec(&body).map_err(|e| ApiError::Internal(e.to_string()))?;
    let body = if method == Method::HEAD { Body::empty() } else { Body::from(body_bytes) };
    Ok((StatusCode::OK, headers, body).into_response())
}

/// `GET,HEAD /chunk/{absoluteOffset}/data`: raw bytes plus the
/// `X-AR-IO-Chunk-*` headers derivable from `ChunkMetadata`.
/// `X-AR-IO-Chunk-Tx-Id`/`Tx-Start-Offset` need a chain-transaction lookup
/// this crate doesn't wire (the `chain` DB in spec §6 is abstract storage
/// this gateway never implements a schema for); they're omitted rather
/// than guessed. See DESIGN.md.
pub async fn get_chunk_data(
    Extension(state): Extension<Arc<AppState>>,
    method: Method,
    Path(absolute_offset): Path<u64>,
) -> Result<Response, ApiError> {
    let retrieved = fetch_chunk(&state, absolute_offset).await?;
    let metadata = &retrieved.metadata;

    let mut headers = HeaderMap::new();
    headers.insert("x-ar-io-chunk-data-path", text(&URL_SAFE_NO_PAD.encode(&metadata.data_path)));
    headers.insert("x-ar-io-chunk-data-root", text(&URL_SAFE_NO_PAD.encode(metadata.data_root)));
    headers.insert("x-ar-io-chunk-start-offset", text(&absolute_offset.to_string()));
    headers.insert("x-ar-io-chunk-relative-start-offset", text(&metadata.relative_offset.to_string()));
    headers.insert("x-ar-io-chunk-read-offset", text(&metadata.relative_offset.to_string()));
    headers.insert("x-ar-io-chunk-tx-data-size", text(&metadata.data_size.to_string()));
    if let Some(tx_path) = &metadata.tx_path {
        headers.insert("x-ar-io-chunk-tx-path", text(&URL_SAFE_NO_PAD.encode(tx_path)));
    }
    headers.insert(header::CONTENT_LENGTH, text(&retrieved.bytes.len().to_string()));
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));

    let body = if method == Method::HEAD { Body::empty() } else { Body::from(retrieved.bytes) };
    Ok((StatusCode::OK, headers, body).into_response())
}

async fn fetch_chunk(
    state: &AppState,
    absolute_offset: u64,
) -> Result<ario_gateway_chunks::RetrievedChunk, ApiError> {
    state.metrics.chunk_retrieval_inflight.set(state.chunk_retrieval.inflight_count() as i64);
    let result = state.chunk_retrieval.get_chunk(absolute_offset, None).await;
    state.metrics.chunk_retrieval_inflight.set(state.chunk_retrieval.inflight_count() as i64);
    Ok(result?)
}

#[derive(Debug, Deserialize)]
pub struct PostChunkBody {
    chunk: String,
    data_root: String,
    data_size: String,
    data_path: String,
    offset: String,
    tx_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct BroadcastResponseBody {
    success_count: usize,
    failure_count: usize,
}

/// `POST /chunk`: persists the chunk locally (so this gateway itself can
/// now serve it) and broadcasts it to the configured POST peers (spec
/// §4.2.3). A shortfall against `chunk_post_min_success_count` maps to
/// HTTP 500 with the counts in the body (scenario S6), mirrored from
/// `ChunkBroadcaster::broadcast`'s always-`Ok` contract — the handler is
/// what turns a shortfall into an error response.
pub async fn post_chunk(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<PostChunkBody>,
) -> Result<Response, ApiError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(&body.chunk)
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 chunk: {e}")))?;
    let data_root: [u8; 32] = URL_SAFE_NO_PAD
        .decode(&body.data_root)
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 data_root: {e}")))?
        .try_into()
        .map_err(|_| ApiError::BadRequest("data_root must be 32 bytes".to_owned()))?;
    let data_size: u64 = body
        .data_size
        .parse()
        .map_err(|_| ApiError::BadRequest("data_size must be an integer".to_owned()))?;
    let data_path = URL_SAFE_NO_PAD
        .decode(&body.data_path)
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 data_path: {e}")))?;
    let relative_offset: u64 = body
        .offset
        .parse()
        .map_err(|_| ApiError::BadRequest("offset must be an integer".to_owned()))?;
    let tx_path = body
        .tx_path
        .as_deref()
        .map(URL_SAFE_NO_PAD.decode)
        .transpose()
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 tx_path: {e}")))?;

    let hash: [u8; 32] = {
        use sha2::{Digest, Sha256};
        Sha256::digest(&bytes).into()
    };

    let metadata = ChunkMetadata {
        data_root,
        data_size,
        data_path,
        tx_path,
        hash,
        relative_offset,
        absolute_offset: None,
    };

    // No absolute (weave-relative) offset is known yet for a freshly
    // posted chunk — that requires the transaction's chain-level base
    // offset, which this gateway doesn't index (see DESIGN.md). Only the
    // by-`(data_root, relative_offset)` index is written here; a later
    // `get_chunk` call with a resolver-built hint backfills the
    // absolute-offset entry once it learns one.
    state.chunk_store.put_metadata(&metadata).await?;

    let outcome = state.chunk_broadcaster.broadcast(&bytes, &metadata).await?;
    let min_success_count = state.config.peers.chunk_post_min_success_count;

    if outcome.successes < min_success_count {
        state
            .metrics
            .chunk_broadcast_total
            .get_or_create(&crate::metrics::BroadcastLabels { outcome: "shortfall".to_owned() })
            .inc();
        return Err(ApiError::BroadcastShortfall {
            success_count: outcome.successes,
            failure_count: outcome.attempted.saturating_sub(outcome.successes),
        });
    }

    state
        .metrics
        .chunk_broadcast_total
        .get_or_create(&crate::metrics::BroadcastLabels { outcome: "ok".to_owned() })
        .inc();

    Ok((
        StatusCode::OK,
        Json(BroadcastResponseBody {
            success_count: outcome.successes,
            failure_count: outcome.attempted.saturating_sub(outcome.successes),
        }),
    )
        .into_response())
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use ario_gateway_bundles::BundlesError;
use ario_gateway_chunks::ChunkError;
use ario_gateway_data_source::DataSourceError;
use ario_gateway_primitives::OffsetError;
use ario_gateway_resolver::ResolverError;

/// HTTP-facing error, mapping the error taxonomy in spec §7 onto status
/// codes and response bodies. Every upstream error type converts into one
/// of these variants rather than being matched in the handlers themselves.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("upstream data failed validation")]
    UpstreamValidationFailed,

    /// `TraversalCycle`/`TraversalIncomplete` (spec §7): the parent chain is
    /// inconsistent. The bundle that produced it needs re-indexing, which
    /// the admin path does by re-queueing it; this variant only reports the
    /// condition, it doesn't requeue anything itself.
    #[error("parent chain traversal failed, bundle needs re-indexing")]
    TraversalInconsistent,

    #[error("queue is at capacity")]
    QueueFull,

    #[error("chunk broadcast fell short of the required peer count")]
    BroadcastShortfall { success_count: usize, failure_count: usize },

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => (StatusCode::NOT_FOUND, Json(json!({ "error": "not_found" }))).into_response(),
            Self::InvalidRange(message) => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                Json(json!({ "error": "invalid_range", "message": message })),
            )
                .into_response(),
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "bad_request", "message": message })),
            )
                .into_response(),
            Self::UpstreamValidationFailed => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "upstream_validation_failed" })),
            )
                .into_response(),
            Self::TraversalInconsistent => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "traversal_inconsistent" })),
            )
                .into_response(),
            Self::QueueFull => (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "error": "queue_full" }))).into_response(),
            Self::BroadcastShortfall { success_count, failure_count } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "successCount": success_count, "failureCount": failure_count })),
            )
                .into_response(),
            Self::NotImplemented(what) => (
                StatusCode::NOT_IMPLEMENTED,
                Json(json!({ "error": "not_implemented", "message": what })),
            )
                .into_response(),
            Self::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal", "message": message })),
            )
                .into_response(),
        }
    }
}

impl From<ChunkError> for ApiError {
    fn from(e: ChunkError) -> Self {
        match e {
            ChunkError::NotFound(_) | ChunkError::MetadataNotFound { .. } | ChunkError::AllPeersFailed(_) => {
                Self::NotFound
            }
            ChunkError::InvalidProof(_) | ChunkError::HashMismatch | ChunkError::Peer(_) => {
                Self::UpstreamValidationFailed
            }
            ChunkError::Storage(message) => Self::Internal(message),
        }
    }
}

impl From<ResolverError> for ApiError {
    fn from(e: ResolverError) -> Self {
        match e {
            ResolverError::TraversalCycle(_) | ResolverError::TraversalIncomplete(_) => Self::TraversalInconsistent,
            ResolverError::NotFound(_) => Self::NotFound,
            ResolverError::Storage(message) => Self::Internal(message),
        }
    }
}

impl From<DataSourceError> for ApiError {
    fn from(e: DataSourceError) -> Self {
        match e {
            DataSourceError::NotFound(_) | DataSourceError::NotConfigured(_) | DataSourceError::AllSourcesFailed => {
                Self::NotFound
            }
            DataSourceError::NotImplemented(what) => Self::NotImplemented(what),
            DataSourceError::Chunk(inner) => inner.into(),
            DataSourceError::Resolver(inner) => inner.into(),
            DataSourceError::Storage(inner) => Self::Internal(inner.to_string()),
            DataSourceError::Upstream(message) => Self::UpstreamValidationFailed.with_context(message),
        }
    }
}

impl From<OffsetError> for ApiError {
    fn from(e: OffsetError) -> Self {
        Self::InvalidRange(e.to_string())
    }
}

impl From<BundlesError> for ApiError {
    fn from(e: BundlesError) -> Self {
        match e {
            BundlesError::QueueFull => Self::QueueFull,
            BundlesError::NotFound(_) => Self::NotFound,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl ApiError {
    /// `DataSourceError::Upstream` already carries detail worth keeping for
    /// logs; the client still just sees `upstream_validation_failed`.
    fn with_context(self, context: String) -> Self {
        tracing::debug!(context = %context, "upstream error");
        self
    }
}

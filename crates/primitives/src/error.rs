use thiserror::Error;

/// The error taxonomy from spec §7, shared across the resolver, chunk
/// retrieval service, composite data source and unbundling pipeline so the
/// HTTP surface can map a single enum to status codes.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no source could produce bytes for the requested id/region")]
    NotFound,

    #[error("invalid byte range: {0}")]
    InvalidRange(String),

    #[error("invalid ANS-104 bundle: {0}")]
    InvalidBundle(String),

    #[error("invalid Merkle proof: {0}")]
    InvalidMerkleProof(String),

    #[error("parent-chain traversal found a cycle at {0}")]
    TraversalCycle(String),

    #[error("parent-chain traversal could not complete: {0}")]
    TraversalIncomplete(String),

    #[error("chunk not available from any configured source")]
    ChunkNotFound,

    #[error("broadcast reached {success_count} of the required peers (needed {min_success_count}, {failure_count} failed)")]
    BroadcastShortfall {
        success_count: usize,
        failure_count: usize,
        min_success_count: usize,
    },

    #[error("admin queue is at capacity")]
    QueueFull,

    #[error("source temporarily degraded: {0}")]
    SourceDegraded(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl GatewayError {
    /// HTTP status code per the propagation policy in spec §7. `SourceDegraded`
    /// and `Cancelled` are internal-only and never surfaced to a response.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::NotFound | Self::ChunkNotFound => 404,
            Self::InvalidRange(_) => 416,
            Self::InvalidBundle(_) | Self::InvalidMerkleProof(_) => 502,
            Self::TraversalCycle(_) | Self::TraversalIncomplete(_) => 500,
            Self::BroadcastShortfall { .. } => 500,
            Self::QueueFull => 429,
            Self::SourceDegraded(_) => 503,
            Self::Cancelled => 499,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(GatewayError::NotFound.http_status(), 404);
    }

    #[test]
    fn queue_full_maps_to_429() {
        assert_eq!(GatewayError::QueueFull.http_status(), 429);
    }

    #[test]
    fn broadcast_shortfall_carries_counts() {
        let err = GatewayError::BroadcastShortfall {
            success_count: 2,
            failure_count: 3,
            min_success_count: 3,
        };
        assert_eq!(err.http_status(), 500);
        assert!(err.to_string().contains('2'));
    }
}

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChunkError {
    #[error("chunk not found for absolute offset {0}")]
    NotFound(u64),

    #[error("chunk metadata not found for data_root={data_root} relative_offset={relative_offset}")]
    MetadataNotFound { data_root: String, relative_offset: u64 },

    #[error("chunk failed Merkle validation: {0}")]
    InvalidProof(String),

    #[error("chunk data hash did not match its proof")]
    HashMismatch,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("no peer returned a valid chunk for offset {0}")]
    AllPeersFailed(u64),

    #[error("peer request error: {0}")]
    Peer(String),
}

impl From<ario_gateway_store::StorageError> for ChunkError {
    fn from(e: ario_gateway_store::StorageError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<ario_gateway_merkle::MerkleError> for ChunkError {
    fn from(e: ario_gateway_merkle::MerkleError) -> Self {
        Self::InvalidProof(e.to_string())
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("{0} has no data for this id")]
    NotFound(&'static str),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("{0} is not yet implemented in this gateway")]
    NotImplemented(&'static str),

    #[error("chunk error: {0}")]
    Chunk(#[from] ario_gateway_chunks::ChunkError),

    #[error("resolver error: {0}")]
    Resolver(#[from] ario_gateway_resolver::ResolverError),

    #[error("storage error: {0}")]
    Storage(#[from] ario_gateway_store::StorageError),

    #[error("upstream request error: {0}")]
    Upstream(String),

    #[error("every configured source failed for this id")]
    AllSourcesFailed,
}

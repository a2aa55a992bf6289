use ario_gateway_primitives::Id;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BundlesError {
    #[error("bundle queue is at capacity")]
    QueueFull,

    #[error("bundle {0} has no row in the bundles table")]
    NotFound(Id),

    #[error("bundle entry extends past the downloaded bytes")]
    TruncatedBundle,

    #[error("merkle parse error: {0}")]
    Merkle(#[from] ario_gateway_merkle::MerkleError),

    #[error("data source error: {0}")]
    DataSource(#[from] ario_gateway_data_source::DataSourceError),

    #[error("resolver error: {0}")]
    Resolver(#[from] ario_gateway_resolver::ResolverError),

    #[error("storage error: {0}")]
    Storage(#[from] ario_gateway_store::StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

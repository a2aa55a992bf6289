use ario_gateway_primitives::Id;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("traversal cycle detected: {0} was visited twice while resolving its root")]
    TraversalCycle(Id),

    #[error("traversal incomplete: parent {0} of the chain is not yet indexed")]
    TraversalIncomplete(Id),

    #[error("no attributes recorded for {0}")]
    NotFound(Id),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<ario_gateway_store::StorageError> for ResolverError {
    fn from(e: ario_gateway_store::StorageError) -> Self {
        Self::Storage(e.to_string())
    }
}

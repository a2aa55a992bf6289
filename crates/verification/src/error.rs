use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("bundles error: {0}")]
    Bundles(#[from] ario_gateway_bundles::BundlesError),

    #[error("data source error: {0}")]
    DataSource(#[from] ario_gateway_data_source::DataSourceError),

    #[error("resolver error: {0}")]
    Resolver(#[from] ario_gateway_resolver::ResolverError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

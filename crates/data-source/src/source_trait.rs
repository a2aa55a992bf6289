use async_trait::async_trait;

use crate::error::DataSourceError;
use crate::types::{GetDataRequest, GetDataResponse};

/// One named backend in the composite data source stack (spec §4.3.4).
#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> ario_gateway_primitives::SourceName;

    async fn get_data(&self, request: &GetDataRequest) -> Result<GetDataResponse, DataSourceError>;
}

use ario_gateway_primitives::SourceName;
use async_trait::async_trait;

use crate::error::DataSourceError;
use crate::source_trait::DataSource;
use crate::types::{GetDataRequest, GetDataResponse};

/// Placeholder for the identity-credentialed object-storage mirror (spec
/// §4.3.4, `s3`). Configuring it into `onDemandOrder`/`backgroundOrder` is
/// accepted so the name validates, but this gateway doesn't ship an AWS
/// integration; it always reports not-implemented so the composite stack
/// falls through to the next configured source.
pub struct S3Source;

#[async_trait]
impl DataSource for S3Source {
    fn name(&self) -> SourceName {
        SourceName::S3
    }

    async fn get_data(&self, _request: &GetDataRequest) -> Result<GetDataResponse, DataSourceError> {
        Err(DataSourceError::NotImplemented("s3"))
    }
}

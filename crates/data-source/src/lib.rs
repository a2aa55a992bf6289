//! The composite data source stack (spec §4.3): an ordered fallback chain
//! over `cache`, `chunks`, `chunks-data-item`, `trusted-gateways`,
//! `ar-io-network`, `tx-data` and `s3`, each advertising independent
//! `verified`/`trusted`/`cached` bits on every response.

pub mod composite;
pub mod error;
pub mod source_trait;
pub mod sources;
pub mod types;

pub use composite::CompositeDataSource;
pub use error::DataSourceError;
pub use source_trait::DataSource;
pub use sources::{
    ArIoNetworkSource, CacheSource, ChunksDataItemSource, ChunksSource, S3Source,
    TrustedGatewaysSource, TxDataSource,
};
pub use types::{DataStream, GetDataRequest, GetDataResponse};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ario_gateway_primitives::Id;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;

    use super::*;

    struct AlwaysMiss(ario_gateway_primitives::SourceName);

    #[async_trait]
    impl DataSource for AlwaysMiss {
        fn name(&self) -> ario_gateway_primitives::SourceName {
            self.0
        }

        async fn get_data(&self, _request: &GetDataRequest) -> Result<GetDataResponse, DataSourceError> {
            Err(DataSourceError::NotFound("miss"))
        }
    }

    struct AlwaysHit(ario_gateway_primitives::SourceName);

    #[async_trait]
    impl DataSource for AlwaysHit {
        fn name(&self) -> ario_gateway_primitives::SourceName {
            self.0
        }

        async fn get_data(&self, _request: &GetDataRequest) -> Result<GetDataResponse, DataSourceError> {
            Ok(GetDataResponse {
                stream: Box::pin(stream::once(async { Ok(Bytes::from_static(b"hi")) })),
                size: 2,
                verified: true,
                trusted: true,
                cached: true,
                hash: None,
                content_type: None,
                source: self.0,
            })
        }
    }

    #[tokio::test]
    async fn falls_through_to_the_next_source_on_a_miss() {
        use ario_gateway_primitives::SourceName;
        let composite = CompositeDataSource::new(
            vec![
                Arc::new(AlwaysMiss(SourceName::Cache)),
                Arc::new(AlwaysHit(SourceName::Chunks)),
            ],
            &["cache".to_owned(), "chunks".to_owned()],
            &["cache".to_owned(), "chunks".to_owned()],
        );

        let response = composite
            .get_data(&GetDataRequest::whole(Id::random()))
            .await
            .unwrap();
        assert_eq!(response.source, ario_gateway_primitives::SourceName::Chunks);
    }

    #[tokio::test]
    async fn all_sources_missing_is_an_error() {
        use ario_gateway_primitives::SourceName;
        let composite = CompositeDataSource::new(
            vec![Arc::new(AlwaysMiss(SourceName::Cache))],
            &["cache".to_owned()],
            &["cache".to_owned()],
        );

        let err = composite
            .get_data(&GetDataRequest::whole(Id::random()))
            .await
            .unwrap_err();
        assert!(matches!(err, DataSourceError::AllSourcesFailed));
    }

    #[tokio::test]
    async fn hop_budget_exhaustion_skips_peer_boundary_sources() {
        use ario_gateway_primitives::{RequestAttributes, SourceName};
        let composite = CompositeDataSource::new(
            vec![Arc::new(AlwaysHit(SourceName::TrustedGateways))],
            &["trusted-gateways".to_owned()],
            &["trusted-gateways".to_owned()],
        );

        let mut request = GetDataRequest::whole(Id::random());
        request.request_attributes = RequestAttributes {
            hops: 3,
            ..RequestAttributes::default()
        };

        let err = composite.get_data(&request).await.unwrap_err();
        assert!(matches!(err, DataSourceError::AllSourcesFailed));
    }
}

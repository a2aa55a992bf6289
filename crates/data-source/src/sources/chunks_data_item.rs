use std::sync::Arc;

use ario_gateway_chunks::ChunkRetrievalService;
use ario_gateway_primitives::{ByteRegion, SourceName};
use ario_gateway_resolver::{resolve_root, AttributesStore};
use async_trait::async_trait;

use crate::error::DataSourceError;
use crate::source_trait::DataSource;
use crate::sources::chunks::ChunksSource;
use crate::types::{GetDataRequest, GetDataResponse};

/// Serves a nested ANS-104 data item's payload by translating the request's
/// region into the root transaction's absolute byte range via the
/// parent-chain resolver (spec §4.3.3), then delegating to the same
/// chunk-retrieval machinery `ChunksSource` uses.
pub struct ChunksDataItemSource {
    attributes: Arc<AttributesStore>,
    retrieval: Arc<ChunkRetrievalService>,
}

impl ChunksDataItemSource {
    #[must_use]
    pub fn new(attributes: Arc<AttributesStore>, retrieval: Arc<ChunkRetrievalService>) -> Self {
        Self {
            attributes,
            retrieval,
        }
    }
}

#[async_trait]
impl DataSource for ChunksDataItemSource {
    fn name(&self) -> SourceName {
        SourceName::ChunksDataItem
    }

    async fn get_data(&self, request: &GetDataRequest) -> Result<GetDataResponse, DataSourceError> {
        let resolution = resolve_root(self.attributes.as_ref(), request.id).await?;

        let attrs = self
            .attributes
            .get(&request.id)
            .await?
            .ok_or(DataSourceError::NotFound("chunks-data-item"))?;

        let item_region = request.region.unwrap_or(ByteRegion::whole(attrs.size));
        let root_region = item_region
            .rebase(resolution.root_data_offset, attrs.size)
            .map_err(|e| DataSourceError::Upstream(e.to_string()))?;

        let size = root_region.size;
        let stream = ChunksSource::stream_region(Arc::clone(&self.retrieval), root_region);

        Ok(GetDataResponse {
            stream,
            size,
            verified: true,
            trusted: true,
            cached: false,
            hash: attrs.hash,
            content_type: attrs.content_type,
            source: SourceName::ChunksDataItem,
        })
    }
}

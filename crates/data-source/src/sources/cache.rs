use std::sync::Arc;

use ario_gateway_primitives::{Id, SourceName};
use ario_gateway_store::Storage;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::DataSourceError;
use crate::source_trait::DataSource;
use crate::types::{GetDataRequest, GetDataResponse};

#[derive(Serialize, Deserialize)]
struct CachedEntry {
    bytes: Vec<u8>,
    hash: [u8; 32],
    content_type: Option<String>,
}

fn key(id: &Id) -> Vec<u8> {
    let mut k = Vec::with_capacity(6 + 32);
    k.extend_from_slice(b"cache:");
    k.extend_from_slice(id.as_bytes());
    k
}

/// The contiguous-data cache: fully-materialized bytes for an id, written
/// back by the background sources once they've fetched something, read
/// first on every request (spec §4.3's `onDemandOrder` always lists
/// `cache` first).
pub struct CacheSource {
    store: Arc<dyn Storage>,
}

impl CacheSource {
    #[must_use]
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    pub async fn put(
        &self,
        id: &Id,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<(), DataSourceError> {
        let hash: [u8; 32] = Sha256::digest(&bytes).into();
        let entry = CachedEntry {
            bytes,
            hash,
            content_type,
        };
        let encoded = ario_gateway_store::encode_json(&entry)?;
        self.store.put(&key(id), &encoded).await?;
        Ok(())
    }
}

#[async_trait]
impl DataSource for CacheSource {
    fn name(&self) -> SourceName {
        SourceName::Cache
    }

    async fn get_data(&self, request: &GetDataRequest) -> Result<GetDataResponse, DataSourceError> {
        let Some(raw) = self.store.get(&key(&request.id)).await? else {
            return Err(DataSourceError::NotFound("cache"));
        };
        let entry: CachedEntry = ario_gateway_store::decode_json(&raw)?;

        let sliced = match request.region {
            Some(region) => entry
                .bytes
                .get(region.offset as usize..region.end() as usize)
                .map(<[u8]>::to_vec)
                .ok_or(DataSourceError::NotFound("cache"))?,
            None => entry.bytes,
        };
        let size = sliced.len() as u64;

        Ok(GetDataResponse {
            stream: Box::pin(stream::once(async move { Ok(Bytes::from(sliced)) })),
            size,
            verified: true,
            trusted: true,
            cached: true,
            hash: Some(entry.hash),
            content_type: entry.content_type,
            source: SourceName::Cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ario_gateway_store::MemoryStore;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn returns_cached_bytes_with_verified_and_trusted_set() {
        let source = CacheSource::new(Arc::new(MemoryStore::new()));
        let id = Id::random();
        source
            .put(&id, b"hello world".to_vec(), Some("text/plain".into()))
            .await
            .unwrap();

        let mut response = source.get_data(&GetDataRequest::whole(id)).await.unwrap();
        assert!(response.verified);
        assert!(response.trusted);
        assert!(response.cached);
        assert_eq!(response.size, 11);

        let mut collected = Vec::new();
        while let Some(chunk) = response.stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"hello world");
    }

    #[tokio::test]
    async fn missing_id_is_not_found() {
        let source = CacheSource::new(Arc::new(MemoryStore::new()));
        let err = source
            .get_data(&GetDataRequest::whole(Id::random()))
            .await
            .unwrap_err();
        assert!(matches!(err, DataSourceError::NotFound("cache")));
    }
}

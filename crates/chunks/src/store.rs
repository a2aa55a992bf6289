use std::sync::Arc;

use ario_gateway_store::{decode_json, encode_json, Storage};
use serde::{Deserialize, Serialize};

use crate::error::ChunkError;
use crate::keys::{data_key, metadata_by_absolute_key, metadata_by_relative_key};

/// Persisted proof metadata for one chunk, independent of its payload bytes
/// (spec §3, §4.2.1). `absolute_offset` is filled in once the chunk's
/// position in the weave is known, which may be after the metadata itself
/// is first recorded during unbundling/ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub data_root: [u8; 32],
    pub data_size: u64,
    pub data_path: Vec<u8>,
    pub tx_path: Option<Vec<u8>>,
    pub hash: [u8; 32],
    /// Byte offset of this chunk's end, relative to the transaction payload.
    pub relative_offset: u64,
    pub absolute_offset: Option<u64>,
}

/// Chunk byte store and chunk metadata store, backed by two independent
/// `Storage` instances so the (larger, append-mostly) payload table can use
/// a different backend/tuning from the (smaller, frequently queried)
/// metadata table.
pub struct ChunkStore {
    data: Arc<dyn Storage>,
    metadata: Arc<dyn Storage>,
}

impl ChunkStore {
    #[must_use]
    pub fn new(data: Arc<dyn Storage>, metadata: Arc<dyn Storage>) -> Self {
        Self { data, metadata }
    }

    pub async fn put_data(&self, absolute_offset: u64, bytes: &[u8]) -> Result<(), ChunkError> {
        self.data.put(&data_key(absolute_offset), bytes).await?;
        Ok(())
    }

    pub async fn get_data(&self, absolute_offset: u64) -> Result<Option<Vec<u8>>, ChunkError> {
        Ok(self.data.get(&data_key(absolute_offset)).await?)
    }

    pub async fn put_metadata(&self, metadata: &ChunkMetadata) -> Result<(), ChunkError> {
        let encoded = encode_json(metadata)?;
        self.metadata
            .put(
                &metadata_by_relative_key(&metadata.data_root, metadata.relative_offset),
                &encoded,
            )
            .await?;
        if let Some(absolute_offset) = metadata.absolute_offset {
            self.metadata
                .put(&metadata_by_absolute_key(absolute_offset), &encoded)
                .await?;
        }
        Ok(())
    }

    pub async fn get_metadata_by_relative(
        &self,
        data_root: &[u8; 32],
        relative_offset: u64,
    ) -> Result<Option<ChunkMetadata>, ChunkError> {
        match self
            .metadata
            .get(&metadata_by_relative_key(data_root, relative_offset))
            .await?
        {
            Some(bytes) => Ok(Some(decode_json(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn get_metadata_by_absolute(
        &self,
        absolute_offset: u64,
    ) -> Result<Option<ChunkMetadata>, ChunkError> {
        match self
            .metadata
            .get(&metadata_by_absolute_key(absolute_offset))
            .await?
        {
            Some(bytes) => Ok(Some(decode_json(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Records the absolute offset for a chunk whose metadata was first
    /// persisted without one (resolved during parent-chain traversal),
    /// backfilling the absolute-offset index.
    pub async fn backfill_absolute_offset(
        &self,
        data_root: &[u8; 32],
        relative_offset: u64,
        absolute_offset: u64,
    ) -> Result<(), ChunkError> {
        let Some(mut metadata) = self.get_metadata_by_relative(data_root, relative_offset).await?
        else {
            return Err(ChunkError::MetadataNotFound {
                data_root: hex::encode(data_root),
                relative_offset,
            });
        };
        metadata.absolute_offset = Some(absolute_offset);
        self.put_metadata(&metadata).await
    }
}

//! Key/value `Storage` trait shared by every persisted component (chunk
//! stores, attributes store, bundles table), plus an in-memory
//! implementation for tests and a rocksdb-free dev mode.

use async_trait::async_trait;
use borsh::{BorshDeserialize, BorshSerialize};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("key not found")]
    NotFound,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Byte-oriented key/value storage, implemented against an in-memory map
/// for tests and against rocksdb for the real deployment (`ario-gateway-store-rocksdb`).
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;
    async fn delete(&self, key: &[u8]) -> Result<(), StorageError>;
    async fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }
    /// Lists keys starting with `prefix`, in key order.
    async fn list_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StorageError>;
}

/// `dashmap`-backed in-memory store: concurrent reads, sharded write locks,
/// used for tests and for `memory`-mode deployments.
#[derive(Default)]
pub struct MemoryStore {
    data: DashMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.get(key).map(|v| v.clone()))
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }

    async fn list_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StorageError> {
        let mut keys: Vec<Vec<u8>> = self
            .data
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|k| k.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Compact binary encoding for value-heavy records (Merkle proofs, chunk
/// metadata) — the `borsh` use `arweave_rs` models for on-wire proof
/// structs, reused here for on-disk ones.
pub fn encode_borsh<T: BorshSerialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    borsh::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

pub fn decode_borsh<T: BorshDeserialize>(bytes: &[u8]) -> Result<T, StorageError> {
    T::try_from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// JSON encoding for human-inspectable records (config-adjacent tables,
/// bundle lifecycle rows), matching `calimero-auth`'s `serialize`/
/// `deserialize` helpers.
pub fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, BorshSerialize, BorshDeserialize)]
    struct Sample {
        a: u64,
        b: Vec<u8>,
    }

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryStore::new();
        assert!(store.get(b"k").await.unwrap().is_none());
        store.put(b"k", b"v").await.unwrap();
        assert_eq!(store.get(b"k").await.unwrap(), Some(b"v".to_vec()));
        store.delete(b"k").await.unwrap();
        assert!(store.get(b"k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prefix_listing_is_sorted_and_filtered() {
        let store = MemoryStore::new();
        store.put(b"a:1", b"").await.unwrap();
        store.put(b"a:2", b"").await.unwrap();
        store.put(b"b:1", b"").await.unwrap();

        let keys = store.list_keys_with_prefix(b"a:").await.unwrap();
        assert_eq!(keys, vec![b"a:1".to_vec(), b"a:2".to_vec()]);
    }

    #[test]
    fn borsh_round_trip() {
        let sample = Sample {
            a: 7,
            b: vec![1, 2, 3],
        };
        let bytes = encode_borsh(&sample).unwrap();
        let back: Sample = decode_borsh(&bytes).unwrap();
        assert_eq!(sample, back);
    }
}

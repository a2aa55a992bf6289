use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::id::Id;

pub const MAX_CHUNK_SIZE: u64 = 256 * 1024;
pub const MIN_CHUNK_SIZE: u64 = 32 * 1024;
pub const HASH_SIZE: usize = 32;

/// Name of the source a chunk or range of bytes was ultimately served from,
/// used for attribution (spec §4.3.2) and response headers (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceName {
    Cache,
    Chunks,
    ChunksDataItem,
    TrustedGateways,
    ArIoNetwork,
    TxData,
    S3,
}

impl SourceName {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Chunks => "chunks",
            Self::ChunksDataItem => "chunks-data-item",
            Self::TrustedGateways => "trusted-gateways",
            Self::ArIoNetwork => "ar-io-network",
            Self::TxData => "tx-data",
            Self::S3 => "s3",
        }
    }
}

/// A single base-layer chunk: payload bytes plus the Merkle proofs that tie
/// it to a transaction's `data_root` and, optionally, a block's `tx_root`
/// (spec §3, §4.1.3, §4.1.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub data_root: [u8; HASH_SIZE],
    pub data_size: u64,
    pub data_path: Vec<u8>,
    pub tx_path: Option<Vec<u8>>,
    pub chunk: Vec<u8>,
    pub hash: [u8; HASH_SIZE],
    /// Byte offset of this chunk's end, relative to the start of the
    /// transaction's payload.
    pub offset: u64,
    pub source: Option<SourceName>,
    pub source_host: Option<String>,
}

impl Chunk {
    #[must_use]
    pub fn hash_of(chunk: &[u8]) -> [u8; HASH_SIZE] {
        let mut hasher = Sha256::new();
        hasher.update(chunk);
        hasher.finalize().into()
    }

    /// Invariant 1 from spec §8: `SHA-256(c.chunk) == c.hash` for every
    /// validated chunk.
    #[must_use]
    pub fn hash_matches(&self) -> bool {
        Self::hash_of(&self.chunk) == self.hash
    }
}

/// Request-scoped attribution carried through the composite data source and
/// peer requests (spec §4.3.2, §6).
#[derive(Debug, Clone, Default)]
pub struct RequestAttributes {
    pub origin: Option<String>,
    pub origin_release: Option<String>,
    pub hops: u8,
    pub arns_name: Option<String>,
    pub arns_basename: Option<String>,
    pub arns_record: Option<String>,
    pub expected_digest: Option<[u8; HASH_SIZE]>,
}

pub const MAX_HOPS: u8 = 3;

impl RequestAttributes {
    #[must_use]
    pub fn with_incremented_hop(&self) -> Self {
        Self {
            hops: self.hops.saturating_add(1),
            ..self.clone()
        }
    }

    #[must_use]
    pub const fn hop_budget_exhausted(&self) -> bool {
        self.hops >= MAX_HOPS
    }

    #[must_use]
    pub fn for_root_tx(&self, root_tx: Id) -> Self {
        let _ = root_tx;
        self.clone()
    }
}

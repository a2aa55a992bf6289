use std::sync::Arc;
use std::time::Instant;

use ario_gateway_merkle::validate_chunk_against_path;
use ario_gateway_peers::PeerLedger;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::block_index::BlockIndexClient;
use crate::error::ChunkError;
use crate::single_flight::SingleFlight;
use crate::store::{ChunkMetadata, ChunkStore};

/// What the caller already knows about the chunk it's asking for, when it
/// has context from the parent-chain resolver (spec §4.4) or from an
/// in-progress bundle download. Without a hint, retrieval can only use the
/// absolute-offset cache and the unauthenticated fallback path.
#[derive(Debug, Clone)]
pub struct ChunkLookupHint {
    pub data_root: [u8; 32],
    /// Byte offset of this chunk's end, relative to the transaction payload.
    pub relative_offset: u64,
    /// The block's `tx_root`, when validating this chunk also requires
    /// proving the transaction's membership in a block.
    pub tx_root: Option<[u8; 32]>,
}

#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub bytes: Vec<u8>,
    pub metadata: ChunkMetadata,
}

#[derive(Deserialize)]
struct ChunkResponseDto {
    chunk: String,
    data_root: String,
    data_size: String,
    data_path: String,
    tx_path: Option<String>,
}

/// Implements the chunk retrieval algorithm from spec §4.2.2: an
/// absolute-offset cache fast path, a proof-validated path when the caller
/// supplies a `ChunkLookupHint`, and an unauthenticated peer fallback,
/// coalesced per-offset via `SingleFlight` (invariant 6 / scenario S5).
pub struct ChunkRetrievalService {
    store: Arc<ChunkStore>,
    peers: Arc<PeerLedger>,
    http: reqwest::Client,
    block_index: BlockIndexClient,
    single_flight: SingleFlight<u64, RetrievedChunk, ChunkError>,
}

impl ChunkRetrievalService {
    #[must_use]
    pub fn new(
        store: Arc<ChunkStore>,
        peers: Arc<PeerLedger>,
        http: reqwest::Client,
        block_index: BlockIndexClient,
    ) -> Self {
        Self {
            store,
            peers,
            http,
            block_index,
            single_flight: SingleFlight::new(),
        }
    }

    pub async fn get_chunk(
        &self,
        absolute_offset: u64,
        hint: Option<ChunkLookupHint>,
    ) -> Result<RetrievedChunk, ChunkError> {
        self.single_flight
            .run(absolute_offset, || self.fetch(absolute_offset, hint))
            .await
    }

    /// Distinct offsets with a fetch currently in flight, for the
    /// `chunk_retrieval_inflight` gauge (spec §8 scenario S5).
    #[must_use]
    pub fn inflight_count(&self) -> usize {
        self.single_flight.in_flight_count()
    }

    async fn fetch(
        &self,
        absolute_offset: u64,
        hint: Option<ChunkLookupHint>,
    ) -> Result<RetrievedChunk, ChunkError> {
        if let Some(cached) = self.fast_path(absolute_offset).await? {
            return Ok(cached);
        }

        if let Some(ref hint) = hint {
            if let Some(found) = self.metadata_validated_path(absolute_offset, hint).await? {
                return Ok(found);
            }
        }

        self.peer_fallback_path(absolute_offset, hint.as_ref()).await
    }

    async fn fast_path(&self, absolute_offset: u64) -> Result<Option<RetrievedChunk>, ChunkError> {
        let (data, metadata) = tokio::try_join!(
            self.store.get_data(absolute_offset),
            self.store.get_metadata_by_absolute(absolute_offset),
        )?;
        match (data, metadata) {
            (Some(bytes), Some(metadata)) => Ok(Some(RetrievedChunk { bytes, metadata })),
            _ => Ok(None),
        }
    }

    /// Step 2: we already trust `hint.data_root` (and optionally
    /// `hint.tx_root`) from the parent-chain resolver; a peer only needs to
    /// supply the raw bytes and we validate them ourselves.
    async fn metadata_validated_path(
        &self,
        absolute_offset: u64,
        hint: &ChunkLookupHint,
    ) -> Result<Option<RetrievedChunk>, ChunkError> {
        let Some(metadata) = self
            .store
            .get_metadata_by_relative(&hint.data_root, hint.relative_offset)
            .await?
        else {
            return Ok(None);
        };

        let Some(bytes) = self.store.get_data(absolute_offset).await? else {
            return Ok(None);
        };

        self.validate_against_metadata(&bytes, &metadata, hint)?;
        self.store
            .backfill_absolute_offset(&hint.data_root, hint.relative_offset, absolute_offset)
            .await?;
        Ok(Some(RetrievedChunk { bytes, metadata }))
    }

    /// Step 3: no locally trusted metadata, so ask peers directly and
    /// validate whatever proof they hand back before trusting it.
    async fn peer_fallback_path(
        &self,
        absolute_offset: u64,
        hint: Option<&ChunkLookupHint>,
    ) -> Result<RetrievedChunk, ChunkError> {
        let candidates = self.peers.sample(3);
        if candidates.is_empty() {
            return Err(ChunkError::NotFound(absolute_offset));
        }

        for peer in candidates {
            peer.note_request_started();
            let started = Instant::now();
            let outcome = self.try_peer(peer.url.as_str(), absolute_offset, hint).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            peer.note_result(outcome.is_ok(), elapsed_ms);

            match outcome {
                Ok(retrieved) => return Ok(retrieved),
                Err(e) => warn!(peer = peer.url.as_str(), error = %e, "chunk fetch failed"),
            }
        }

        Err(ChunkError::AllPeersFailed(absolute_offset))
    }

    async fn try_peer(
        &self,
        peer_url: &str,
        absolute_offset: u64,
        hint: Option<&ChunkLookupHint>,
    ) -> Result<RetrievedChunk, ChunkError> {
        let url = format!("{}/chunk/{}", peer_url.trim_end_matches('/'), absolute_offset);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ChunkError::Peer(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChunkError::Peer(e.to_string()))?;

        let dto: ChunkResponseDto = response
            .json()
            .await
            .map_err(|e| ChunkError::Peer(e.to_string()))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(&dto.chunk)
            .map_err(|e| ChunkError::Peer(format!("invalid base64 chunk: {e}")))?;
        let data_root: [u8; 32] = URL_SAFE_NO_PAD
            .decode(&dto.data_root)
            .map_err(|e| ChunkError::Peer(format!("invalid base64 data_root: {e}")))?
            .try_into()
            .map_err(|_| ChunkError::Peer("data_root was not 32 bytes".into()))?;
        let data_size: u64 = dto
            .data_size
            .parse()
            .map_err(|_| ChunkError::Peer("data_size was not a valid integer".into()))?;
        let data_path = URL_SAFE_NO_PAD
            .decode(&dto.data_path)
            .map_err(|e| ChunkError::Peer(format!("invalid base64 data_path: {e}")))?;
        let tx_path = dto
            .tx_path
            .as_deref()
            .map(|s| URL_SAFE_NO_PAD.decode(s))
            .transpose()
            .map_err(|e| ChunkError::Peer(format!("invalid base64 tx_path: {e}")))?;

        // A peer's claimed `data_root` proves nothing by itself: it only shows
        // the response is internally self-consistent. Without a hint we must
        // independently anchor `data_root` to the chain before trusting it,
        // either via the caller's already-trusted hint or by deriving it from
        // a block's `tx_root` through the peer's `tx_path` (spec §4.2.2 step 2).
        let (trusted_data_root, relative_offset) = match hint {
            Some(hint) => {
                if hint.data_root != data_root {
                    return Err(ChunkError::InvalidProof(
                        "peer-supplied data_root did not match the trusted data_root".into(),
                    ));
                }
                (hint.data_root, hint.relative_offset)
            }
            None => {
                let tx_path = tx_path.as_ref().ok_or_else(|| {
                    ChunkError::InvalidProof(
                        "peer supplied no tx_path and no trusted data_root hint was available to anchor this chunk".into(),
                    )
                })?;
                let block = self.block_index.block_for_offset(absolute_offset).await?;
                let block_relative_offset =
                    absolute_offset.checked_sub(block.previous_weave_size).ok_or_else(|| {
                        ChunkError::InvalidProof(
                            "absolute offset precedes its resolved block's weave range".into(),
                        )
                    })?;
                let tx_validation =
                    ario_gateway_merkle::validate_path(block.tx_root, tx_path, block_relative_offset)?;
                if tx_validation.leaf_hash != data_root {
                    return Err(ChunkError::InvalidProof(
                        "tx_path-derived data_root did not match the peer-supplied data_root".into(),
                    ));
                }
                let relative_offset =
                    block_relative_offset.checked_sub(tx_validation.left_bound).ok_or_else(|| {
                        ChunkError::InvalidProof(
                            "chunk offset precedes its transaction's start within the block".into(),
                        )
                    })?;
                (tx_validation.leaf_hash, relative_offset)
            }
        };

        let hash: [u8; 32] = Sha256::digest(&bytes).into();
        let validation =
            validate_chunk_against_path(trusted_data_root, &data_path, relative_offset, hash)?;
        debug!(left = validation.left_bound, right = validation.right_bound, "data_path validated");

        let metadata = ChunkMetadata {
            data_root: trusted_data_root,
            data_size,
            data_path,
            tx_path,
            hash,
            relative_offset,
            absolute_offset: Some(absolute_offset),
        };
        self.store.put_data(absolute_offset, &bytes).await?;
        self.store.put_metadata(&metadata).await?;

        Ok(RetrievedChunk { bytes, metadata })
    }

    fn validate_against_metadata(
        &self,
        bytes: &[u8],
        metadata: &ChunkMetadata,
        hint: &ChunkLookupHint,
    ) -> Result<(), ChunkError> {
        let hash: [u8; 32] = Sha256::digest(bytes).into();
        if hash != metadata.hash {
            return Err(ChunkError::HashMismatch);
        }
        let _ = validate_chunk_against_path(
            hint.data_root,
            &metadata.data_path,
            hint.relative_offset,
            hash,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ario_gateway_store::MemoryStore;

    #[tokio::test]
    async fn fast_path_returns_cached_chunk_without_touching_peers() {
        let store = Arc::new(ChunkStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        ));
        let metadata = ChunkMetadata {
            data_root: [9; 32],
            data_size: 10,
            data_path: vec![],
            tx_path: None,
            hash: Sha256::digest(b"0123456789").into(),
            relative_offset: 10,
            absolute_offset: Some(555),
        };
        store.put_data(555, b"0123456789").await.unwrap();
        store.put_metadata(&metadata).await.unwrap();

        let peers = Arc::new(PeerLedger::new());
        let service = ChunkRetrievalService::new(store, peers, reqwest::Client::new(), BlockIndexClient::new(reqwest::Client::new(), None));
        let retrieved = service.get_chunk(555, None).await.unwrap();
        assert_eq!(retrieved.bytes, b"0123456789");
    }

    #[tokio::test]
    async fn missing_chunk_with_no_peers_configured_is_not_found() {
        let store = Arc::new(ChunkStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        ));
        let peers = Arc::new(PeerLedger::new());
        let service = ChunkRetrievalService::new(store, peers, reqwest::Client::new(), BlockIndexClient::new(reqwest::Client::new(), None));
        let err = service.get_chunk(1, None).await.unwrap_err();
        assert!(matches!(err, ChunkError::NotFound(1)));
    }
}

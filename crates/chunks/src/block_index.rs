use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use tracing::debug;

use crate::error::ChunkError;

/// Enough of a block's chain-DB row (spec §3's `stable_blocks`) to validate
/// a `tx_path` against it: `tx_root`, the weave range it covers, and a
/// transaction count for sanity-checking decoded `tx_path` proofs against.
#[derive(Debug, Clone, Copy)]
pub struct BlockInfo {
    pub tx_root: [u8; 32],
    pub tx_count: u64,
    pub weave_size: u64,
    pub previous_weave_size: u64,
}

#[derive(Deserialize)]
struct BlockDto {
    weave_size: String,
    tx_root: Option<String>,
    #[serde(default)]
    txs: Vec<String>,
}

fn peer_err(e: reqwest::Error) -> ChunkError {
    ChunkError::Peer(e.to_string())
}

/// Resolves the block anchoring a given absolute weave offset, so a
/// transaction's `data_root` can be derived independently from its
/// `tx_path` rather than trusted verbatim from whichever peer served the
/// chunk (spec §4.2.2 step 2). Binary-searches block height by
/// `weave_size`, the way `fetch block's tx_root, tx_count, weave_size, and
/// previous block's weave_size` reads in the retrieval algorithm.
pub struct BlockIndexClient {
    http: reqwest::Client,
    trusted_node_url: Option<String>,
}

impl BlockIndexClient {
    #[must_use]
    pub fn new(http: reqwest::Client, trusted_node_url: Option<String>) -> Self {
        Self { http, trusted_node_url }
    }

    pub async fn block_for_offset(&self, absolute_offset: u64) -> Result<BlockInfo, ChunkError> {
        let node = self
            .trusted_node_url
            .as_deref()
            .ok_or_else(|| ChunkError::Peer("no trusted chain node configured for block lookups".into()))?;

        let top_height = self.fetch_height(node).await?;

        let mut low: u64 = 0;
        let mut high: u64 = top_height;
        let mut found: Option<(u64, BlockDto, u64)> = None;
        while low <= high {
            let mid = low + (high - low) / 2;
            let block = self.fetch_block(node, mid).await?;
            let weave_size: u64 = block
                .weave_size
                .parse()
                .map_err(|_| ChunkError::Peer("block weave_size was not a valid integer".into()))?;

            if weave_size > absolute_offset {
                found = Some((mid, block, weave_size));
                if mid == 0 {
                    break;
                }
                high = mid - 1;
            } else {
                low = mid + 1;
            }
        }

        let (height, block, weave_size) = found.ok_or(ChunkError::NotFound(absolute_offset))?;
        debug!(height, absolute_offset, "resolved block for weave offset");

        let previous_weave_size = if height == 0 {
            0
        } else {
            let previous = self.fetch_block(node, height - 1).await?;
            previous
                .weave_size
                .parse()
                .map_err(|_| ChunkError::Peer("previous block weave_size was not a valid integer".into()))?
        };

        let tx_root_b64 = block
            .tx_root
            .ok_or_else(|| ChunkError::Peer("block response had no tx_root".into()))?;
        let tx_root: [u8; 32] = URL_SAFE_NO_PAD
            .decode(&tx_root_b64)
            .map_err(|e| ChunkError::Peer(format!("invalid base64 tx_root: {e}")))?
            .try_into()
            .map_err(|_| ChunkError::Peer("tx_root was not 32 bytes".into()))?;

        Ok(BlockInfo {
            tx_root,
            tx_count: block.txs.len() as u64,
            weave_size,
            previous_weave_size,
        })
    }

    async fn fetch_height(&self, node: &str) -> Result<u64, ChunkError> {
        let text = self
            .http
            .get(format!("{}/height", node.trim_end_matches('/')))
            .send()
            .await
            .map_err(peer_err)?
            .error_for_status()
            .map_err(peer_err)?
            .text()
            .await
            .map_err(peer_err)?;
        text.trim()
            .parse()
            .map_err(|_| ChunkError::Peer("invalid /height response".into()))
    }

    async fn fetch_block(&self, node: &str, height: u64) -> Result<BlockDto, ChunkError> {
        self.http
            .get(format!("{}/block/height/{}", node.trim_end_matches('/'), height))
            .send()
            .await
            .map_err(peer_err)?
            .error_for_status()
            .map_err(peer_err)?
            .json()
            .await
            .map_err(peer_err)
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use ario_gateway_peers::PeerLedger;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::json;
use tracing::warn;

use crate::error::ChunkError;
use crate::store::ChunkMetadata;

/// Broadcasts a newly received chunk to the configured POST peers (spec
/// §4.2.3 / scenario S6), requiring at least `min_success_count` peers to
/// accept it within `abort_timeout`, and updating each peer's weight from
/// the outcome.
pub struct ChunkBroadcaster {
    peers: Arc<PeerLedger>,
    http: reqwest::Client,
    min_success_count: usize,
    abort_timeout: Duration,
}

pub struct BroadcastOutcome {
    pub successes: usize,
    pub attempted: usize,
}

impl ChunkBroadcaster {
    #[must_use]
    pub fn new(
        peers: Arc<PeerLedger>,
        http: reqwest::Client,
        min_success_count: usize,
        abort_timeout: Duration,
    ) -> Self {
        Self {
            peers,
            http,
            min_success_count,
            abort_timeout,
        }
    }

    pub async fn broadcast(
        &self,
        bytes: &[u8],
        metadata: &ChunkMetadata,
    ) -> Result<BroadcastOutcome, ChunkError> {
        if self.peers.is_empty() {
            return Ok(BroadcastOutcome {
                successes: 0,
                attempted: 0,
            });
        }

        let body = json!({
            "chunk": URL_SAFE_NO_PAD.encode(bytes),
            "data_root": URL_SAFE_NO_PAD.encode(metadata.data_root),
            "data_size": metadata.data_size.to_string(),
            "data_path": URL_SAFE_NO_PAD.encode(&metadata.data_path),
            "offset": metadata.relative_offset.to_string(),
        });

        let targets = self.peers.sample(self.peers.len());
        let mut in_flight = FuturesUnordered::new();
        for peer in targets {
            peer.note_request_started();
            let url = format!("{}/chunk", peer.url.trim_end_matches('/'));
            let http = self.http.clone();
            let body = body.clone();
            let started = Instant::now();
            in_flight.push(async move {
                let result = http.post(&url).json(&body).send().await;
                let ok = matches!(result, Ok(resp) if resp.status().is_success());
                (peer, ok, started.elapsed())
            });
        }

        let mut successes = 0;
        let mut attempted = 0;
        let deadline = tokio::time::sleep(self.abort_timeout);
        tokio::pin!(deadline);

        loop {
            if successes >= self.min_success_count {
                break;
            }
            tokio::select! {
                next = in_flight.next() => {
                    match next {
                        Some((peer, ok, elapsed)) => {
                            attempted += 1;
                            peer.note_result(ok, elapsed.as_secs_f64() * 1000.0);
                            if ok {
                                successes += 1;
                            } else {
                                warn!(peer = peer.url.as_str(), "chunk post rejected");
                            }
                        }
                        None => break,
                    }
                }
                () = &mut deadline => {
                    warn!(successes, min = self.min_success_count, "chunk broadcast abort timeout reached");
                    break;
                }
            }
        }

        Ok(BroadcastOutcome { successes, attempted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_with_no_peers_is_a_trivial_success() {
        let peers = Arc::new(PeerLedger::new());
        let broadcaster =
            ChunkBroadcaster::new(peers, reqwest::Client::new(), 2, Duration::from_secs(1));
        let metadata = ChunkMetadata {
            data_root: [0; 32],
            data_size: 10,
            data_path: vec![],
            tx_path: None,
            hash: [0; 32],
            relative_offset: 10,
            absolute_offset: None,
        };
        let outcome = broadcaster.broadcast(b"abc", &metadata).await.unwrap();
        assert_eq!(outcome.attempted, 0);
        assert_eq!(outcome.successes, 0);
    }
}

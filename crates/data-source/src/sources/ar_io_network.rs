use std::sync::Arc;
use std::time::Instant;

use ario_gateway_peers::PeerLedger;
use ario_gateway_primitives::SourceName;
use async_trait::async_trait;
use futures_util::TryStreamExt;

use crate::error::DataSourceError;
use crate::source_trait::DataSource;
use crate::types::{GetDataRequest, GetDataResponse};

/// Selects peers from the weighted ledger shared with the chunk retrieval
/// service, sending the expected digest (if known) in a request header and
/// rejecting a response whose own digest header doesn't match it (spec
/// §4.3.4). Network peers are not pre-declared trustworthy, so responses
/// here are never `trusted`.
pub struct ArIoNetworkSource {
    http: reqwest::Client,
    peers: Arc<PeerLedger>,
}

impl ArIoNetworkSource {
    #[must_use]
    pub fn new(http: reqwest::Client, peers: Arc<PeerLedger>) -> Self {
        Self { http, peers }
    }
}

#[async_trait]
impl DataSource for ArIoNetworkSource {
    fn name(&self) -> SourceName {
        SourceName::ArIoNetwork
    }

    async fn get_data(&self, request: &GetDataRequest) -> Result<GetDataResponse, DataSourceError> {
        let candidates = self.peers.sample(3);
        if candidates.is_empty() {
            return Err(DataSourceError::NotConfigured("ar-io-network"));
        }

        for peer in candidates {
            peer.note_request_started();
            let started = Instant::now();
            let outcome = self.try_peer(peer.url.as_str(), request).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            peer.note_result(outcome.is_ok(), elapsed_ms);

            match outcome {
                Ok(response) => return Ok(response),
                Err(e) => tracing::warn!(peer = peer.url.as_str(), error = %e, "ar.io network fetch failed"),
            }
        }

        Err(DataSourceError::NotFound("ar-io-network"))
    }
}

impl ArIoNetworkSource {
    async fn try_peer(
        &self,
        peer_url: &str,
        request: &GetDataRequest,
    ) -> Result<GetDataResponse, DataSourceError> {
        let url = format!(
            "{}/{}",
            peer_url.trim_end_matches('/'),
            request.id.to_base64url()
        );
        let mut builder = self.http.get(&url);
        if let Some(digest) = request.request_attributes.expected_digest {
            builder = builder.header("x-ar-io-expected-digest", hex::encode(digest));
        }
        if let Some(region) = request.region {
            builder = builder.header(
                "Range",
                format!("bytes={}-{}", region.offset, region.end().saturating_sub(1)),
            );
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DataSourceError::Upstream(e.to_string()))?
            .error_for_status()
            .map_err(|e| DataSourceError::Upstream(e.to_string()))?;

        let response_hash = response
            .headers()
            .get("x-ar-io-digest")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| hex::decode(v).ok())
            .and_then(|v| <[u8; 32]>::try_from(v).ok());
        if let (Some(expected), Some(actual)) =
            (request.request_attributes.expected_digest, response_hash)
        {
            if expected != actual {
                return Err(DataSourceError::Upstream(
                    "peer digest did not match expected digest".into(),
                ));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        let size = response.content_length().unwrap_or(0);
        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));

        Ok(GetDataResponse {
            stream: Box::pin(stream),
            size,
            verified: false,
            trusted: false,
            cached: false,
            hash: response_hash,
            content_type,
            source: SourceName::ArIoNetwork,
        })
    }
}

use ario_gateway_primitives::SourceName;
use async_trait::async_trait;
use futures_util::TryStreamExt;

use crate::error::DataSourceError;
use crate::source_trait::DataSource;
use crate::types::{GetDataRequest, GetDataResponse};

/// Fetches raw bytes from a configured set of trusted gateway URLs (spec
/// §4.3.4). These are attributed to a gateway the operator has chosen to
/// trust, but the bytes are not checked against a Merkle proof here, so
/// `verified` stays `false` until the background verification worker
/// confirms the payload (open question 3).
pub struct TrustedGatewaysSource {
    http: reqwest::Client,
    urls: Vec<String>,
}

impl TrustedGatewaysSource {
    #[must_use]
    pub fn new(http: reqwest::Client, urls: Vec<String>) -> Self {
        Self { http, urls }
    }
}

#[async_trait]
impl DataSource for TrustedGatewaysSource {
    fn name(&self) -> SourceName {
        SourceName::TrustedGateways
    }

    async fn get_data(&self, request: &GetDataRequest) -> Result<GetDataResponse, DataSourceError> {
        if self.urls.is_empty() {
            return Err(DataSourceError::NotConfigured("trusted-gateways"));
        }

        for base in &self.urls {
            let url = format!(
                "{}/{}",
                base.trim_end_matches('/'),
                request.id.to_base64url()
            );
            let mut builder = self.http.get(&url);
            if let Some(region) = request.region {
                builder = builder.header(
                    "Range",
                    format!("bytes={}-{}", region.offset, region.end().saturating_sub(1)),
                );
            }

            let response = match builder.send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "trusted gateway request failed");
                    continue;
                }
            };
            let Ok(response) = response.error_for_status() else {
                continue;
            };

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned);
            let advertised_verified = response
                .headers()
                .get("x-ar-io-verified")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.eq_ignore_ascii_case("true"));
            let response_hash = response
                .headers()
                .get("x-ar-io-digest")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| hex::decode(v).ok())
                .and_then(|v| <[u8; 32]>::try_from(v).ok());
            let verified = advertised_verified
                && response_hash.is_some()
                && response_hash == request.request_attributes.expected_digest;
            let size = response.content_length().unwrap_or(0);

            let stream = response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));

            return Ok(GetDataResponse {
                stream: Box::pin(stream),
                size,
                verified,
                trusted: true,
                cached: false,
                hash: response_hash,
                content_type,
                source: SourceName::TrustedGateways,
            });
        }

        Err(DataSourceError::NotFound("trusted-gateways"))
    }
}

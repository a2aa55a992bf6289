use ario_gateway_primitives::SourceName;
use async_trait::async_trait;
use futures_util::TryStreamExt;

use crate::error::DataSourceError;
use crate::source_trait::DataSource;
use crate::types::{GetDataRequest, GetDataResponse};

/// Legacy path: fetches a transaction's full body from the configured
/// trusted node (spec §4.3.4, `tx-data`). No chunk-level Merkle proof is
/// consulted, so `verified` is always `false`; the node is operator-trusted.
pub struct TxDataSource {
    http: reqwest::Client,
    trusted_node_url: Option<String>,
}

impl TxDataSource {
    #[must_use]
    pub fn new(http: reqwest::Client, trusted_node_url: Option<String>) -> Self {
        Self {
            http,
            trusted_node_url,
        }
    }
}

#[async_trait]
impl DataSource for TxDataSource {
    fn name(&self) -> SourceName {
        SourceName::TxData
    }

    async fn get_data(&self, request: &GetDataRequest) -> Result<GetDataResponse, DataSourceError> {
        let Some(base) = &self.trusted_node_url else {
            return Err(DataSourceError::NotConfigured("tx-data"));
        };

        let url = format!(
            "{}/tx/{}/data",
            base.trim_end_matches('/'),
            request.id.to_base64url()
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DataSourceError::Upstream(e.to_string()))?
            .error_for_status()
            .map_err(|e| DataSourceError::Upstream(e.to_string()))?;

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
            trusted: true,
            cached: false,
            hash: None,
            content_type,
            source: SourceName::TxData,
        })
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use ario_gateway_primitives::SourceName;
use tracing::{debug, warn};

use crate::error::DataSourceError;
use crate::source_trait::DataSource;
use crate::types::{GetDataRequest, GetDataResponse};

/// Tries sources in a configured order, short-circuiting on the first
/// non-empty response (spec §4.3.2). `onDemandOrder` backs reader-driven
/// requests; `backgroundOrder` backs the verification/unbundling workers.
/// Peer-boundary sources (everything but `cache`/`chunks`/`chunks-data-item`/
/// `s3`, which never leave this process) get the request's hop count
/// incremented first, and are skipped outright once the hop budget is
/// exhausted.
pub struct CompositeDataSource {
    sources: HashMap<SourceName, Arc<dyn DataSource>>,
    on_demand_order: Vec<SourceName>,
    background_order: Vec<SourceName>,
}

fn is_peer_boundary(name: SourceName) -> bool {
    matches!(
        name,
        SourceName::TrustedGateways | SourceName::ArIoNetwork | SourceName::TxData
    )
}

fn parse_order(names: &[String]) -> Vec<SourceName> {
    names
        .iter()
        .filter_map(|n| match n.as_str() {
            "cache" => Some(SourceName::Cache),
            "chunks" => Some(SourceName::Chunks),
            "chunks-data-item" => Some(SourceName::ChunksDataItem),
            "trusted-gateways" => Some(SourceName::TrustedGateways),
            "ar-io-network" => Some(SourceName::ArIoNetwork),
            "tx-data" => Some(SourceName::TxData),
            "s3" => Some(SourceName::S3),
            other => {
                warn!(name = other, "unknown data source name in configured order");
                None
            }
        })
        .collect()
}

impl CompositeDataSource {
    #[must_use]
    pub fn new(
        sources: Vec<Arc<dyn DataSource>>,
        on_demand_order: &[String],
        background_order: &[String],
    ) -> Self {
        let mut by_name = HashMap::new();
        for source in sources {
            by_name.insert(source.name(), source);
        }
        Self {
            sources: by_name,
            on_demand_order: parse_order(on_demand_order),
            background_order: parse_order(background_order),
        }
    }

    #[must_use]
    pub fn from_config(sources: Vec<Arc<dyn DataSource>>, cfg: &ario_gateway_config::DataSourceConfig) -> Self {
        Self::new(sources, &cfg.on_demand_order, &cfg.background_order)
    }

    pub async fn get_data(&self, request: &GetDataRequest) -> Result<GetDataResponse, DataSourceError> {
        self.try_order(&self.on_demand_order, request).await
    }

    pub async fn get_data_background(
        &self,
        request: &GetDataRequest,
    ) -> Result<GetDataResponse, DataSourceError> {
        self.try_order(&self.background_order, request).await
    }

    async fn try_order(
        &self,
        order: &[SourceName],
        request: &GetDataRequest,
    ) -> Result<GetDataResponse, DataSourceError> {
        for name in order {
            let Some(source) = self.sources.get(name) else {
                continue;
            };

            let attempt_request = if is_peer_boundary(*name) {
                if request.request_attributes.hop_budget_exhausted() {
                    debug!(source = name.as_str(), "hop budget exhausted, skipping");
                    continue;
                }
                let mut attempt = request.clone();
                attempt.request_attributes = attempt.request_attributes.with_incremented_hop();
                attempt
            } else {
                request.clone()
            };

            match source.get_data(&attempt_request).await {
                Ok(response) => return Ok(response),
                Err(e) => debug!(source = name.as_str(), error = %e, "source produced no data"),
            }
        }

        Err(DataSourceError::AllSourcesFailed)
    }
}

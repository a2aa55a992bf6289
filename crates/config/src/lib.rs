//! `GatewayConfig`: file + environment configuration for the gateway,
//! loaded the way `calimero-auth`'s `load_config` does (a layered
//! `config::Config` builder) and validated once at startup.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod serde_duration {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:3000".parse().expect("valid default address")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GatewayConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    pub store: StoreConfig,

    #[serde(default)]
    pub data_source: DataSourceConfig,

    #[serde(default)]
    pub peers: PeersConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub bundles: BundlesConfig,

    #[serde(default)]
    pub verification: VerificationConfig,
}

impl Default for GatewayConfig {
    /// A standalone-usable config with no externally-reachable peers
    /// configured — enough to boot the process and serve locally cached
    /// data, for running without a `--config` file.
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            store: StoreConfig::default(),
            data_source: DataSourceConfig::default(),
            peers: PeersConfig::default(),
            cache: CacheConfig::default(),
            bundles: BundlesConfig::default(),
            verification: VerificationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct StoreConfig {
    pub chunks_path: Utf8PathBuf,
    pub attributes_path: Utf8PathBuf,
    pub contiguous_data_path: Utf8PathBuf,
    pub bundles_path: Utf8PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunks_path: Utf8PathBuf::from("./data/chunks"),
            attributes_path: Utf8PathBuf::from("./data/attributes"),
            contiguous_data_path: Utf8PathBuf::from("./data/contiguous"),
            bundles_path: Utf8PathBuf::from("./data/bundles"),
        }
    }
}

/// Source names named in spec §4.3.2, in priority order for two independent
/// request paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DataSourceConfig {
    pub on_demand_order: Vec<String>,
    pub background_order: Vec<String>,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        let order = vec![
            "cache".to_owned(),
            "chunks".to_owned(),
            "trusted-gateways".to_owned(),
            "ar-io-network".to_owned(),
            "tx-data".to_owned(),
        ];
        Self {
            on_demand_order: order.clone(),
            background_order: order,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct PeersConfig {
    pub trusted_gateway_urls: Vec<String>,
    pub trusted_node_url: Option<String>,
    pub fallback_node_host: Option<String>,
    pub fallback_node_port: Option<u16>,
    pub chunk_post_urls: Vec<String>,
    pub preferred_chunk_post_urls: Vec<String>,
    pub preferred_chunk_get_node_urls: Vec<String>,
    pub chunk_post_min_success_count: usize,
    #[serde(rename = "chunk_post_abort_timeout_ms", with = "serde_duration")]
    pub chunk_post_abort_timeout: Duration,
    #[serde(
        rename = "weights_cache_duration_ms",
        with = "serde_duration"
    )]
    pub weights_cache_duration: Duration,
}

impl Default for PeersConfig {
    fn default() -> Self {
        Self {
            trusted_gateway_urls: Vec::new(),
            trusted_node_url: None,
            fallback_node_host: None,
            fallback_node_port: None,
            chunk_post_urls: Vec::new(),
            preferred_chunk_post_urls: Vec::new(),
            preferred_chunk_get_node_urls: Vec::new(),
            chunk_post_min_success_count: 2,
            chunk_post_abort_timeout: Duration::from_millis(5_000),
            weights_cache_duration: Duration::from_millis(60_000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct CacheConfig {
    #[serde(rename = "chunk_cache_cleanup_threshold_ms", with = "serde_duration")]
    pub chunk_cache_cleanup_threshold: Duration,
    #[serde(
        rename = "contiguous_data_cache_cleanup_threshold_ms",
        with = "serde_duration"
    )]
    pub contiguous_data_cache_cleanup_threshold: Duration,
    #[serde(default)]
    pub preferred_arns_names: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            chunk_cache_cleanup_threshold: Duration::from_secs(4 * 3600),
            contiguous_data_cache_cleanup_threshold: Duration::from_secs(30 * 24 * 3600),
            preferred_arns_names: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct BundlesConfig {
    pub download_workers: usize,
    pub unbundle_workers: usize,
    /// Workers draining the data-item indexer queue (spec §4.5 "Indexing",
    /// concurrency >= 1).
    pub index_workers: usize,
    /// Max items written to the data-item table per indexer pass.
    pub index_batch_size: usize,
    pub max_data_item_queue_size: usize,
    pub bundle_repair_retry_batch_size: usize,
    pub max_attempts: u32,
    /// `ANS104_UNBUNDLE_FILTER`: gates which data items are processed at
    /// all during unbundling.
    pub unbundle_filter: ario_gateway_primitives::FilterExpr,
    /// `ANS104_INDEX_FILTER`: of the items that pass `unbundle_filter`,
    /// which are persisted as GraphQL-queryable rows.
    pub index_filter: ario_gateway_primitives::FilterExpr,
}

impl Default for BundlesConfig {
    fn default() -> Self {
        Self {
            download_workers: 4,
            unbundle_workers: 4,
            index_workers: 2,
            index_batch_size: 100,
            max_data_item_queue_size: 10_000,
            bundle_repair_retry_batch_size: 100,
            max_attempts: 5,
            unbundle_filter: ario_gateway_primitives::FilterExpr::Always,
            index_filter: ario_gateway_primitives::FilterExpr::Always,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct VerificationConfig {
    pub enabled: bool,
    #[serde(rename = "interval_seconds", with = "serde_seconds")]
    pub interval: Duration,
    pub max_retries: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(30),
            max_retries: 5,
        }
    }
}

mod serde_seconds {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(
        "on_demand_order/background_order named unknown source {0:?}; known sources are \
         cache, chunks, chunks-data-item, trusted-gateways, ar-io-network, tx-data, s3"
    )]
    UnknownSourceName(String),

    #[error("chunk_post_min_success_count ({min}) exceeds the number of configured chunk peers ({have})")]
    MinSuccessCountUnreachable { min: usize, have: usize },

    #[error("invalid bundle filter expression: {0}")]
    InvalidFilter(String),
}

const KNOWN_SOURCE_NAMES: &[&str] = &[
    "cache",
    "chunks",
    "chunks-data-item",
    "trusted-gateways",
    "ar-io-network",
    "tx-data",
    "s3",
];

impl GatewayConfig {
    /// Loads configuration from an optional TOML file plus `GATEWAY__`
    /// prefixed environment overrides (double underscore as the nested-key
    /// separator, so `GATEWAY__PEERS__CHUNK_POST_MIN_SUCCESS_COUNT=3`
    /// overrides `peers.chunk_post_min_success_count`), mirroring
    /// `calimero-auth`'s `load_config`.
    pub fn load(path: Option<&camino::Utf8Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.as_std_path().to_path_buf()));
        }
        builder = builder.add_source(config::Environment::with_prefix("GATEWAY").separator("__"));

        let raw = builder.build()?;
        let config: Self = raw.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Fails fast on config that would cause an un-debuggable runtime
    /// failure later (spec §9's `DataSourceConfig`/`PeersConfig`
    /// consistency).
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in self
            .data_source
            .on_demand_order
            .iter()
            .chain(self.data_source.background_order.iter())
        {
            if !KNOWN_SOURCE_NAMES.contains(&name.as_str()) {
                return Err(ConfigError::UnknownSourceName(name.clone()));
            }
        }

        let have = self.peers.chunk_post_urls.len() + self.peers.preferred_chunk_post_urls.len();
        if self.peers.chunk_post_min_success_count > have && have > 0 {
            return Err(ConfigError::MinSuccessCountUnreachable {
                min: self.peers.chunk_post_min_success_count,
                have,
            });
        }

        self.bundles
            .unbundle_filter
            .validate()
            .map_err(|e| ConfigError::InvalidFilter(e.to_string()))?;
        self.bundles
            .index_filter
            .validate()
            .map_err(|e| ConfigError::InvalidFilter(e.to_string()))?;

        Ok(())
    }

    /// Writes the current configuration back to `path` as pretty TOML, for
    /// the admin-facing config dump mirroring `calimero-config`'s `save`.
    pub fn save(&self, path: &camino::Utf8Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            ConfigError::Load(config::ConfigError::Message(format!(
                "failed to write {path}: {e}"
            )))
        })
    }

    #[must_use]
    pub fn default_for_tests(base: &camino::Utf8Path) -> Self {
        Self {
            listen_addr: default_listen_addr(),
            store: StoreConfig {
                chunks_path: base.join("chunks"),
                attributes_path: base.join("attributes"),
                contiguous_data_path: base.join("contiguous_data"),
                bundles_path: base.join("bundles"),
            },
            data_source: DataSourceConfig::default(),
            peers: PeersConfig::default(),
            cache: CacheConfig::default(),
            bundles: BundlesConfig::default(),
            verification: VerificationConfig::default(),
        }
    }
}

/// Editable keys with example values, mirroring `calimero-config`'s
/// `editable_keys` hint table for operators.
#[must_use]
pub fn editable_keys() -> HashMap<&'static str, Vec<&'static str>> {
    let mut map = HashMap::new();
    map.insert("listen_addr", vec!["0.0.0.0:3000"]);
    map.insert("peers.chunk_post_min_success_count", vec!["2", "3"]);
    map.insert(
        "verification.interval_seconds",
        vec!["30", "60", "300"],
    );
    map
}

pub mod ar_io_network;
pub mod cache;
pub mod chunks;
pub mod chunks_data_item;
pub mod s3;
pub mod trusted_gateways;
pub mod tx_data;

pub use ar_io_network::ArIoNetworkSource;
pub use cache::CacheSource;
pub use chunks::ChunksSource;
pub use chunks_data_item::ChunksDataItemSource;
pub use s3::S3Source;
pub use trusted_gateways::TrustedGatewaysSource;
pub use tx_data::TxDataSource;

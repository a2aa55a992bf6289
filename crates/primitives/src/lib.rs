//! Shared identifiers, offset arithmetic and wire types for the gateway data
//! retrieval and verification engine.

pub mod attributes;
pub mod chunk;
pub mod data_item;
pub mod error;
pub mod filter;
pub mod id;
pub mod offsets;
pub mod signature;

pub use attributes::ItemAttributes;
pub use chunk::{Chunk, RequestAttributes, SourceName, HASH_SIZE, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
pub use data_item::{NormalizedDataItem, Tag};
pub use error::GatewayError;
pub use filter::{FilterError, FilterExpr};
pub use id::{Id, IdError};
pub use offsets::{ByteRegion, ItemOffsets, OffsetError, RootOffsets};
pub use signature::SignatureType;

//! Chunk data/metadata stores, the chunk retrieval service (cache fast
//! path, proof-validated path, peer fallback), single-flight request
//! coalescing, and chunk broadcast to POST peers.

pub mod block_index;
pub mod broadcast;
pub mod error;
mod keys;
pub mod retrieval;
pub mod single_flight;
pub mod store;

pub use block_index::{BlockIndexClient, BlockInfo};
pub use broadcast::{BroadcastOutcome, ChunkBroadcaster};
pub use error::ChunkError;
pub use retrieval::{ChunkLookupHint, ChunkRetrievalService, RetrievedChunk};
pub use single_flight::SingleFlight;
pub use store::{ChunkMetadata, ChunkStore};

//! The item attributes store and the parent-chain root resolver (spec
//! §4.4): walks a data item's `parent_id` chain up to its base-layer
//! transaction, summing offsets into a root-relative position, with cycle
//! detection and a legacy-index fallback.

pub mod attributes_store;
pub mod error;
pub mod traversal;

pub use attributes_store::AttributesStore;
pub use error::ResolverError;
pub use traversal::{resolve_root, RootResolution};

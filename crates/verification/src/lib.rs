//! Background verification worker (spec §4.6): periodically re-derives
//! the Merkle data root of already-indexed bundles from their raw bytes
//! and compares it against the trusted root the chain indexer recorded,
//! propagating a match down to every descendant data item.

pub mod error;
pub mod preferred;
pub mod worker;

pub use error::VerificationError;
pub use preferred::PreferredRoots;
pub use worker::{VerificationOutcome, VerificationWorker};

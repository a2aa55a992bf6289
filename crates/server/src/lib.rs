//! Axum HTTP surface for the gateway (spec §6): data retrieval with Range
//! support, chunk read/write endpoints, admin bundle-pipeline controls,
//! and the ambient health/metrics routes.

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod range;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use metrics::Metrics;
pub use router::create_router;
pub use state::AppState;

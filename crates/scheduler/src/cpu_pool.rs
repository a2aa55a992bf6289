use std::sync::Arc;

use tokio::sync::{AcquireError, Semaphore};
use tokio::task::JoinError;

/// Bounds CPU-bound work (Merkle hashing, data-root computation for large
/// bundles) to a separate pool sized to core count so it can't starve the
/// I/O-bound task pool that handles HTTP and chunk retrieval (spec §5
/// "Scheduling model"). Backed by `spawn_blocking`'s own thread pool; the
/// semaphore just caps how many of those blocking closures this process
/// runs concurrently.
pub struct CpuPool {
    permits: Arc<Semaphore>,
}

#[derive(Debug, thiserror::Error)]
pub enum CpuPoolError {
    #[error("cpu pool closed")]
    Closed(#[from] AcquireError),
    #[error("cpu pool task panicked: {0}")]
    Join(#[from] JoinError),
}

impl CpuPool {
    /// Sizes the pool to the machine's available parallelism, falling back
    /// to 1 if it can't be determined.
    #[must_use]
    pub fn new() -> Self {
        let cores = std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1);
        Self::with_capacity(cores)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity.max(1))),
        }
    }

    /// Runs `f` on the blocking pool once a permit is free, returning its
    /// result. Holds the permit for the lifetime of `f`, not just dispatch.
    pub async fn run<F, R>(&self, f: F) -> Result<R, CpuPoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let permit = self.permits.clone().acquire_owned().await?;
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await?;
        Ok(result)
    }
}

impl Default for CpuPool {
    fn default() -> Self {
        Self::new()
    }
}

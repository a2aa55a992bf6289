use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Runs `pass` every `interval` until `shutdown` is cancelled, logging
/// (but not propagating) pass errors. The shared shape behind every
/// interval-driven background worker (verification, bundle repair):
/// sleep-then-run rather than run-then-sleep, so the first pass waits a
/// full interval after startup.
pub fn spawn_periodic<F, Fut, E>(interval: Duration, shutdown: CancellationToken, mut pass: F) -> tokio::task::JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send,
    E: Display + Send,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => return,
                () = tokio::time::sleep(interval) => {}
            }
            if let Err(e) = pass().await {
                warn!(error = %e, "periodic worker pass failed");
            }
        }
    })
}

/// Runs `poll` in a tight loop until `shutdown` is cancelled: each call
/// either returns `true` (more work may be ready immediately) or `false`
/// (queue was empty, so sleep `idle_interval` before trying again). This is
/// the shape of a queue-draining worker, as opposed to [`spawn_periodic`]'s
/// fixed-cadence pass.
pub fn spawn_polling<F, Fut>(idle_interval: Duration, shutdown: CancellationToken, mut poll: F) -> tokio::task::JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send,
{
    tokio::spawn(async move {
        loop {
            if shutdown.is_cancelled() {
                return;
            }
            if !poll().await {
                tokio::time::sleep(idle_interval).await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn spawn_periodic_stops_once_cancelled() {
        let shutdown = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = {
            let runs = runs.clone();
            spawn_periodic(Duration::from_millis(10), shutdown.clone(), move || {
                let runs = runs.clone();
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), std::convert::Infallible>(())
                }
            })
        };

        tokio::time::advance(Duration::from_millis(35)).await;
        shutdown.cancel();
        handle.await.unwrap();
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn spawn_polling_stops_once_cancelled() {
        let shutdown = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = {
            let runs = runs.clone();
            let shutdown_inner = shutdown.clone();
            spawn_polling(Duration::from_millis(1), shutdown.clone(), move || {
                let runs = runs.clone();
                let shutdown_inner = shutdown_inner.clone();
                async move {
                    let n = runs.fetch_add(1, Ordering::SeqCst);
                    if n >= 2 {
                        shutdown_inner.cancel();
                    }
                    false
                }
            })
        };

        handle.await.unwrap();
        assert!(runs.load(Ordering::SeqCst) >= 3);
    }
}

use std::collections::hash_map::RandomState;
use std::future::Future;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

/// Coalesces concurrent requests for the same key into a single execution
/// of the underlying work (spec §8 invariant 6 / scenario S5: concurrent
/// requests for the same absolute offset share one fetch). Once the shared
/// future settles, its entry is evicted so the next request for that key
/// starts fresh rather than serving a stale cached result forever.
pub struct SingleFlight<K, V, E> {
    in_flight: DashMap<K, Arc<OnceCell<Result<V, E>>>, RandomState>,
}

impl<K, V, E> Default for SingleFlight<K, V, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            in_flight: DashMap::default(),
        }
    }
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
    E: Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell.get_or_init(work).await.clone();

        // Only the caller who finds its own `cell` still installed removes
        // it; a caller that arrives after eviction and re-insertion must not
        // drop someone else's in-flight entry.
        self.in_flight.remove_if(&key, |_, installed| Arc::ptr_eq(installed, &cell));

        result
    }

    /// Number of keys with a fetch currently in flight, for the
    /// `chunk_retrieval_inflight` gauge (spec §8 scenario S5).
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_for_the_same_key_share_one_execution() {
        let flight: Arc<SingleFlight<u64, u32, String>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = flight.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run(42, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, String>(7_u32)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn in_flight_count_peaks_at_one_key_under_concurrent_callers() {
        let flight: Arc<SingleFlight<u64, u32, String>> = Arc::new(SingleFlight::new());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let flight = flight.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run(7, || async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, String>(1_u32)
                    })
                    .await
            }));
        }

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(flight.in_flight_count(), 1);

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(flight.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn a_later_call_after_completion_runs_again() {
        let flight: SingleFlight<u64, u32, String> = SingleFlight::new();
        let calls = AtomicU32::new(0);

        let first = flight
            .run(1, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(1_u32)
            })
            .await;
        let second = flight
            .run(1, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(2_u32)
            })
            .await;

        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

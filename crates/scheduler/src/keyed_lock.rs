use std::collections::hash_map::RandomState;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

/// Non-blocking mutual exclusion per key: at most one [`KeyedGuard`] for a
/// given key exists at a time. A second caller for the same key gets `None`
/// immediately rather than waiting, so its computation is simply dropped
/// (spec §5 "Unbundling of a given bundle ID is at-most-once concurrently";
/// "losers discard their computation"). The guard removes its key entry on
/// drop, including on early return or panic-unwind.
pub struct KeyedLock<K> {
    held: DashMap<K, (), RandomState>,
}

impl<K> Default for KeyedLock<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self { held: DashMap::default() }
    }
}

impl<K> KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to take the lock for `key`. Returns `None` if another
    /// guard for the same key is already outstanding.
    pub fn try_acquire(self: &Arc<Self>, key: K) -> Option<KeyedGuard<K>> {
        if self.held.insert(key.clone(), ()).is_some() {
            // Someone already held it; put the marker back exactly as it
            // was and report failure rather than silently stealing it.
            return None;
        }
        Some(KeyedGuard { lock: Arc::clone(self), key: Some(key) })
    }
}

/// RAII handle from [`KeyedLock::try_acquire`]. Releases the key when dropped.
pub struct KeyedGuard<K>
where
    K: Eq + Hash + Clone,
{
    lock: Arc<KeyedLock<K>>,
    key: Option<K>,
}

impl<K> Drop for KeyedGuard<K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.lock.held.remove(&key);
        }
    }
}

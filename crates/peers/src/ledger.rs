use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use rand::Rng;

use crate::circuit_breaker::CircuitBreaker;
use crate::weight::{dynamic_weight, update_ewma};

/// A single entry in the peer ledger (spec §4.7): a chunk-post/chunk-get
/// target plus the running health signals used to weight it.
pub struct PeerEntry {
    pub url: String,
    pub is_preferred: bool,
    last_healthy: Mutex<Option<Instant>>,
    failure_ewma: Mutex<f64>,
    latency_ewma_ms: Mutex<f64>,
    queue_depth: AtomicU32,
    breaker: CircuitBreaker,
}

impl PeerEntry {
    fn new(url: String, is_preferred: bool) -> Self {
        Self {
            url,
            is_preferred,
            last_healthy: Mutex::new(None),
            failure_ewma: Mutex::new(0.0),
            latency_ewma_ms: Mutex::new(0.0),
            queue_depth: AtomicU32::new(0),
            breaker: CircuitBreaker::new(),
        }
    }

    #[must_use]
    pub fn weight(&self) -> f64 {
        dynamic_weight(
            *self.failure_ewma.lock(),
            *self.latency_ewma_ms.lock(),
            self.queue_depth.load(Ordering::Relaxed),
            self.is_preferred,
        )
    }

    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    #[must_use]
    pub fn last_healthy(&self) -> Option<Instant> {
        *self.last_healthy.lock()
    }

    pub fn note_request_started(&self) {
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_result(&self, success: bool, latency_ms: f64) {
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
        let failure_sample = if success { 0.0 } else { 1.0 };
        {
            let mut failure_ewma = self.failure_ewma.lock();
            *failure_ewma = update_ewma(*failure_ewma, failure_sample);
        }
        {
            let mut latency_ewma_ms = self.latency_ewma_ms.lock();
            *latency_ewma_ms = update_ewma(*latency_ewma_ms, latency_ms);
        }
        if success {
            *self.last_healthy.lock() = Some(Instant::now());
        }
        self.breaker.record_result(success);
    }
}

/// The gateway's view of every chunk-post/chunk-get peer: health signals,
/// circuit breakers, and weighted sampling without replacement (spec §4.7).
#[derive(Default)]
pub struct PeerLedger {
    peers: Vec<PeerEntry>,
}

impl PeerLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from a `PeersConfig`'s chunk-post targets, marking
    /// `preferred_chunk_post_urls` entries preferred. Dedups a URL listed in
    /// both lists by keeping its preferred registration.
    #[must_use]
    pub fn from_peers_config(cfg: &ario_gateway_config::PeersConfig) -> Self {
        let mut ledger = Self::new();
        let preferred: std::collections::HashSet<&str> = cfg
            .preferred_chunk_post_urls
            .iter()
            .map(String::as_str)
            .collect();

        for url in cfg.preferred_chunk_post_urls.iter().chain(cfg.chunk_post_urls.iter()) {
            if ledger.get(url).is_some() {
                continue;
            }
            ledger.register(url.clone(), preferred.contains(url.as_str()));
        }
        ledger
    }

    pub fn register(&mut self, url: impl Into<String>, is_preferred: bool) {
        self.peers.push(PeerEntry::new(url.into(), is_preferred));
    }

    #[must_use]
    pub fn get(&self, url: &str) -> Option<&PeerEntry> {
        self.peers.iter().find(|p| p.url == url)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Peers currently eligible for a new request: their circuit breaker is
    /// not open.
    fn eligible(&self) -> Vec<&PeerEntry> {
        self.peers
            .iter()
            .filter(|p| p.breaker().allow_request())
            .collect()
    }

    /// Weighted random sample of up to `count` distinct peers, without
    /// replacement, favoring higher-weight peers but never excluding a
    /// peer outright as long as it is breaker-eligible.
    pub fn sample(&self, count: usize) -> Vec<&PeerEntry> {
        let mut pool = self.eligible();
        let mut chosen = Vec::with_capacity(count.min(pool.len()));
        let mut rng = rand::thread_rng();

        while !pool.is_empty() && chosen.len() < count {
            let weights: Vec<f64> = pool.iter().map(|p| p.weight()).collect();
            let total: f64 = weights.iter().sum();
            let pick = if total <= 0.0 {
                rng.gen_range(0..pool.len())
            } else {
                let mut target = rng.gen_range(0.0..total);
                let mut idx = pool.len() - 1;
                for (i, w) in weights.iter().enumerate() {
                    if target < *w {
                        idx = i;
                        break;
                    }
                    target -= *w;
                }
                idx
            };
            chosen.push(pool.remove(pick));
        }
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_without_replacement_never_repeats_a_peer() {
        let mut ledger = PeerLedger::new();
        for i in 0..5 {
            ledger.register(format!("https://peer-{i}.example"), false);
        }
        let chosen = ledger.sample(5);
        assert_eq!(chosen.len(), 5);
        let mut urls: Vec<&str> = chosen.iter().map(|p| p.url.as_str()).collect();
        urls.sort_unstable();
        urls.dedup();
        assert_eq!(urls.len(), 5);
    }

    #[test]
    fn sample_caps_at_requested_count() {
        let mut ledger = PeerLedger::new();
        for i in 0..3 {
            ledger.register(format!("https://peer-{i}.example"), false);
        }
        assert_eq!(ledger.sample(10).len(), 3);
    }

    #[test]
    fn open_breaker_excludes_peer_from_sampling() {
        let mut ledger = PeerLedger::new();
        ledger.register("https://healthy.example", false);
        ledger.register("https://broken.example", false);

        let broken = ledger.get("https://broken.example").unwrap();
        for _ in 0..5 {
            broken.note_result(false, 50.0);
        }
        assert_eq!(broken.breaker().state(), crate::circuit_breaker::CircuitState::Open);

        let chosen = ledger.sample(2);
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].url, "https://healthy.example");
    }

    #[test]
    fn from_peers_config_dedups_and_marks_preferred() {
        let mut cfg = ario_gateway_config::PeersConfig::default();
        cfg.chunk_post_urls = vec!["https://a.example".into(), "https://b.example".into()];
        cfg.preferred_chunk_post_urls = vec!["https://a.example".into()];

        let ledger = PeerLedger::from_peers_config(&cfg);
        assert_eq!(ledger.len(), 2);
        assert!(ledger.get("https://a.example").unwrap().is_preferred);
        assert!(!ledger.get("https://b.example").unwrap().is_preferred);
    }

    #[test]
    fn note_result_updates_weight_and_last_healthy() {
        let mut ledger = PeerLedger::new();
        ledger.register("https://peer.example", false);
        let peer = ledger.get("https://peer.example").unwrap();
        assert!(peer.last_healthy().is_none());
        peer.note_request_started();
        peer.note_result(true, 20.0);
        assert!(peer.last_healthy().is_some());
    }
}

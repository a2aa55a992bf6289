/// Weight floor so a peer with a perfect failure record is still sampled
/// occasionally rather than permanently excluded (spec §4.7: `weight ∈ [ε,1]`).
pub const EPSILON: f64 = 0.01;

/// Multiplier applied to a preferred peer's base weight (open question
/// resolution: see `DESIGN.md`). `1.0 + 1.5` reads as "preferred peers get
/// one and a half times the pull of an equivalent non-preferred peer".
const PREFERRED_BOOST: f64 = 1.0 + 1.5;

/// EWMA smoothing factor: how much a new sample moves the running average.
pub const EWMA_ALPHA: f64 = 0.2;

#[must_use]
pub fn update_ewma(current: f64, sample: f64) -> f64 {
    current + EWMA_ALPHA * (sample - current)
}

/// Combines the success-rate EWMA (`1.0 - failure_ewma`) with a latency
/// penalty into a single sampling weight, then applies the preferred-peer
/// boost. Queue depth further derates a peer that already has work queued,
/// so a burst of requests spreads across peers instead of piling onto one.
#[must_use]
pub fn dynamic_weight(failure_ewma: f64, latency_ewma_ms: f64, queue_depth: u32, is_preferred: bool) -> f64 {
    let success_component = (1.0 - failure_ewma).clamp(0.0, 1.0);
    let latency_component = 1.0 / (1.0 + (latency_ewma_ms / 1000.0).max(0.0));
    let queue_component = 1.0 / (1.0 + f64::from(queue_depth));

    let base = (success_component * latency_component * queue_component).max(EPSILON);

    if is_preferred {
        (base * PREFERRED_BOOST).min(1.0).max(EPSILON)
    } else {
        base.min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ewma_moves_toward_sample() {
        let w = update_ewma(0.0, 1.0);
        assert!((w - EWMA_ALPHA).abs() < f64::EPSILON);
    }

    #[test]
    fn weight_never_drops_below_epsilon() {
        let w = dynamic_weight(1.0, 10_000.0, 1_000, false);
        assert!(w >= EPSILON);
    }

    #[test]
    fn preferred_peer_gets_boosted_above_equivalent_non_preferred() {
        let plain = dynamic_weight(0.1, 100.0, 0, false);
        let preferred = dynamic_weight(0.1, 100.0, 0, true);
        assert!(preferred > plain);
    }

    #[test]
    fn weight_is_capped_at_one() {
        let w = dynamic_weight(0.0, 0.0, 0, true);
        assert!(w <= 1.0);
    }

    #[test]
    fn busier_queue_lowers_weight() {
        let idle = dynamic_weight(0.0, 50.0, 0, false);
        let busy = dynamic_weight(0.0, 50.0, 20, false);
        assert!(busy < idle);
    }
}

use super::Balancer;
use crate::types::{EndpointId, EndpointPool, EndpointStats};
use std::time::Instant;

const SUCCESS_WEIGHT: f64 = 0.7;
const RECENCY_WEIGHT: f64 = 0.2;
const LATENCY_WEIGHT: f64 = 0.1;
const RECENCY_CAP_SECS: f64 = 300.0;
const LATENCY_CAP_MS: f64 = 2000.0;

/// `0.7·successRate − 0.2·min(secsSinceSuccess,300)/300 − 0.1·min(avgLatencyMs,2000)/2000`.
///
/// An endpoint that never succeeded takes the full recency penalty.
pub fn endpoint_score(stats: &EndpointStats, now: Instant) -> f64 {
    let since = stats
        .secs_since_success(now)
        .unwrap_or(RECENCY_CAP_SECS)
        .min(RECENCY_CAP_SECS);
    let latency = stats.avg_latency_ms().min(LATENCY_CAP_MS);

    SUCCESS_WEIGHT * stats.success_rate()
        - RECENCY_WEIGHT * since / RECENCY_CAP_SECS
        - LATENCY_WEIGHT * latency / LATENCY_CAP_MS
}

/// Picks the highest-scoring attempted endpoint; ties go to declaration order.
/// An unreachable primary is left out.
#[derive(Debug, Default)]
pub struct ScoredBalancer;

impl ScoredBalancer {
    pub fn new() -> Self {
        Self
    }
}

impl Balancer for ScoredBalancer {
    fn name(&self) -> &'static str {
        "scored"
    }

    fn pick(&self, pool: &EndpointPool, now: Instant) -> Option<EndpointId> {
        let primary = pool.primary();
        let mut best: Option<(EndpointId, f64)> = None;

        for ep in &pool.endpoints {
            if ep.id == primary && !ep.is_reachable() {
                continue;
            }
            let stats = ep.stats();
            if stats.attempts == 0 {
                continue;
            }
            let score = endpoint_score(&stats, now);
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((ep.id, score)),
            }
        }

        best.map(|(id, _)| id)
    }
}

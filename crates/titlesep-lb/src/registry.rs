use crate::algorithms::{Balancer, ScoredBalancer};
use crate::metrics;
use crate::types::{Endpoint, EndpointId, EndpointPool, EndpointStats};
use parking_lot::RwLock;
use serde::Serialize;
use std::time::{Duration, Instant};
use titlesep_core::{EndpointConfig, TitleSepError};
use tracing::{debug, info, warn};

/// Endpoint set plus selection state: per-endpoint statistics, primary
/// reachability and the optional pinned endpoint.
pub struct EndpointRegistry {
    pool: EndpointPool,
    balancer: Box<dyn Balancer>,
    pinned: RwLock<Option<EndpointId>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointSummary {
    pub name: String,
    pub attempts: u64,
    pub successes: u64,
    pub success_pct: f64,
    pub avg_latency_ms: f64,
}

impl EndpointSummary {
    /// `name: pct success (s/a), avg: Nms`
    pub fn render(&self) -> String {
        format!(
            "{}: {:.1}% success ({}/{}), avg: {:.0}ms",
            self.name, self.success_pct, self.successes, self.attempts, self.avg_latency_ms
        )
    }
}

impl EndpointRegistry {
    pub fn new(pool: EndpointPool) -> Self {
        let balancer: Box<dyn Balancer> = Box::new(ScoredBalancer::new());
        debug!(balancer = balancer.name(), "endpoint registry ready");
        Self {
            pool,
            balancer,
            pinned: RwLock::new(None),
        }
    }

    pub fn from_config(cfg: &[EndpointConfig]) -> Result<Self, TitleSepError> {
        Ok(Self::new(EndpointPool::from_config(cfg)?))
    }

    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    pub fn endpoint(&self, id: EndpointId) -> Option<&Endpoint> {
        self.pool.get(id)
    }

    pub fn name(&self, id: EndpointId) -> &str {
        self.pool.get(id).map(|e| e.name.as_str()).unwrap_or("?")
    }

    pub fn stats(&self, id: EndpointId) -> EndpointStats {
        self.pool.get(id).map(|e| e.stats()).unwrap_or_default()
    }

    pub fn record_outcome(&self, id: EndpointId, success: bool, latency: Duration) {
        self.record_outcome_at(id, success, latency, Instant::now());
    }

    pub fn record_outcome_at(
        &self,
        id: EndpointId,
        success: bool,
        latency: Duration,
        now: Instant,
    ) {
        let Some(ep) = self.pool.get(id) else {
            return;
        };
        ep.record(success, latency, now);
        metrics::ATTEMPTS_TOTAL.inc();
        metrics::LATENCY_HIST.observe(latency.as_secs_f64());
        if success {
            if id == self.pool.primary() && !ep.is_reachable() {
                info!(endpoint = %ep.name, "primary endpoint reachable again");
                ep.set_reachable(true);
            }
        } else {
            metrics::FAILURES_TOTAL.inc();
        }
        let latency_ms = latency.as_millis() as u64;
        debug!(endpoint = %ep.name, success, latency_ms, "recorded outcome");
    }

    pub fn mark_unreachable(&self, id: EndpointId) {
        if let Some(ep) = self.pool.get(id) {
            if ep.is_reachable() {
                warn!(endpoint = %ep.name, "marking endpoint unreachable");
            }
            ep.set_reachable(false);
        }
    }

    pub fn is_reachable(&self, id: EndpointId) -> bool {
        self.pool.get(id).map(|e| e.is_reachable()).unwrap_or(false)
    }

    pub fn primary_reachable(&self) -> bool {
        self.is_reachable(self.pool.primary())
    }

    pub fn best_endpoint(&self) -> EndpointId {
        self.best_endpoint_at(Instant::now())
    }

    /// Highest-scoring attempted endpoint. Before any endpoint qualifies this is
    /// the primary when reachable, otherwise the first fallback.
    pub fn best_endpoint_at(&self, now: Instant) -> EndpointId {
        if let Some(id) = self.balancer.pick(&self.pool, now) {
            return id;
        }
        let primary = self.pool.primary();
        if self.primary_reachable() || self.pool.len() == 1 {
            primary
        } else {
            EndpointId(1)
        }
    }

    /// Endpoint for the next call: the pinned one if any, else [`Self::best_endpoint`].
    pub fn select(&self) -> EndpointId {
        match *self.pinned.read() {
            Some(id) => id,
            None => self.best_endpoint(),
        }
    }

    pub fn pinned(&self) -> Option<EndpointId> {
        *self.pinned.read()
    }

    pub fn pin(&self, id: EndpointId) {
        debug!(endpoint = %self.name(id), "pinning endpoint");
        *self.pinned.write() = Some(id);
    }

    /// Drop the pin if it points at `id`.
    pub fn unpin_if(&self, id: EndpointId) {
        let mut pinned = self.pinned.write();
        if *pinned == Some(id) {
            *pinned = None;
        }
    }

    pub fn restore_pin(&self, previous: Option<EndpointId>) {
        *self.pinned.write() = previous;
    }

    pub fn summaries(&self) -> Vec<EndpointSummary> {
        self.pool
            .endpoints
            .iter()
            .map(|ep| {
                let stats = ep.stats();
                EndpointSummary {
                    name: ep.name.clone(),
                    attempts: stats.attempts,
                    successes: stats.successes,
                    success_pct: stats.success_rate() * 100.0,
                    avg_latency_ms: stats.avg_latency_ms(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use titlesep_core::EndpointKind;

    fn registry() -> EndpointRegistry {
        let cfg = vec![
            EndpointConfig {
                name: "primary".into(),
                kind: EndpointKind::Direct,
                base: "http://localhost:3001/api.php".into(),
                health_check_path: Some("/".into()),
            },
            EndpointConfig {
                name: "relay-a".into(),
                kind: EndpointKind::Relay,
                base: "http://localhost:3002/?url=".into(),
                health_check_path: None,
            },
            EndpointConfig {
                name: "relay-b".into(),
                kind: EndpointKind::Relay,
                base: "http://localhost:3003/raw?url=".into(),
                health_check_path: None,
            },
        ];
        EndpointRegistry::from_config(&cfg).unwrap()
    }

    #[test]
    fn unattempted_registry_prefers_reachable_primary() {
        let reg = registry();
        assert_eq!(reg.best_endpoint(), EndpointId(0));
        reg.mark_unreachable(EndpointId(0));
        assert_eq!(reg.best_endpoint(), EndpointId(1));
    }

    #[test]
    fn lower_latency_more_recent_endpoint_wins_at_equal_success() {
        let reg = registry();
        let start = Instant::now();
        let now = start + Duration::from_secs(120);

        reg.record_outcome_at(EndpointId(1), true, Duration::from_millis(900), start);
        reg.record_outcome_at(EndpointId(1), false, Duration::from_millis(900), start);
        reg.record_outcome_at(EndpointId(2), true, Duration::from_millis(100), now);
        reg.record_outcome_at(EndpointId(2), false, Duration::from_millis(100), now);

        reg.mark_unreachable(EndpointId(0));
        assert_eq!(reg.best_endpoint_at(now), EndpointId(2));
    }

    #[test]
    fn unreachable_primary_is_not_scored() {
        let reg = registry();
        let now = Instant::now();
        reg.record_outcome_at(EndpointId(0), true, Duration::from_millis(10), now);
        reg.record_outcome_at(EndpointId(1), true, Duration::from_millis(500), now);
        assert_eq!(reg.best_endpoint_at(now), EndpointId(0));

        reg.mark_unreachable(EndpointId(0));
        assert_eq!(reg.best_endpoint_at(now), EndpointId(1));
    }

    #[test]
    fn ties_go_to_declaration_order() {
        let reg = registry();
        let now = Instant::now();
        reg.record_outcome_at(EndpointId(2), true, Duration::from_millis(50), now);
        reg.record_outcome_at(EndpointId(1), true, Duration::from_millis(50), now);
        reg.mark_unreachable(EndpointId(0));
        assert_eq!(reg.best_endpoint_at(now), EndpointId(1));
    }

    #[test]
    fn success_on_primary_restores_reachability() {
        let reg = registry();
        reg.mark_unreachable(EndpointId(0));
        assert!(!reg.primary_reachable());
        reg.record_outcome(EndpointId(0), true, Duration::from_millis(5));
        assert!(reg.primary_reachable());
    }

    #[test]
    fn pin_overrides_scoring_until_cleared() {
        let reg = registry();
        reg.pin(EndpointId(2));
        assert_eq!(reg.select(), EndpointId(2));
        reg.unpin_if(EndpointId(1));
        assert_eq!(reg.select(), EndpointId(2));
        reg.unpin_if(EndpointId(2));
        assert_eq!(reg.select(), EndpointId(0));
    }

    #[test]
    fn summary_line_format() {
        let reg = registry();
        reg.record_outcome(EndpointId(0), true, Duration::from_millis(100));
        reg.record_outcome(EndpointId(0), false, Duration::from_millis(300));
        let line = reg.summaries()[0].render();
        assert_eq!(line, "primary: 50.0% success (1/2), avg: 200ms");
    }
}

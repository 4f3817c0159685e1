use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use titlesep_core::{EndpointConfig, EndpointKind, TitleSepError};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EndpointId(pub usize);

/// Outcome counters for one endpoint, accumulated for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct EndpointStats {
    pub attempts: u64,
    pub successes: u64,
    pub total_latency: Duration,
    pub last_success: Option<Instant>,
}

impl EndpointStats {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.total_latency.as_secs_f64() * 1000.0 / self.attempts as f64
        }
    }

    /// Seconds since the last success; `None` if there never was one.
    pub fn secs_since_success(&self, now: Instant) -> Option<f64> {
        self.last_success
            .map(|t| now.saturating_duration_since(t).as_secs_f64())
    }
}

#[derive(Debug)]
pub struct Endpoint {
    pub id: EndpointId,
    pub name: String,
    pub kind: EndpointKind,
    pub base: String,
    pub health_check_url: Option<String>,
    reachable: AtomicBool,
    stats: RwLock<EndpointStats>,
}

impl Endpoint {
    pub fn from_config(id: EndpointId, cfg: &EndpointConfig) -> Result<Self, TitleSepError> {
        let parsed = Url::parse(&cfg.base).map_err(|e| {
            TitleSepError::Configuration(format!("endpoint {} has invalid base: {}", cfg.name, e))
        })?;
        let health_check_url = match &cfg.health_check_path {
            Some(path) => Some(
                parsed
                    .join(path)
                    .map_err(|e| {
                        TitleSepError::Configuration(format!(
                            "endpoint {} has invalid health check path: {}",
                            cfg.name, e
                        ))
                    })?
                    .to_string(),
            ),
            None => None,
        };

        Ok(Self {
            id,
            name: cfg.name.clone(),
            kind: cfg.kind,
            base: cfg.base.clone(),
            health_check_url,
            reachable: AtomicBool::new(true),
            stats: RwLock::new(EndpointStats::default()),
        })
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Relaxed);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> EndpointStats {
        self.stats.read().clone()
    }

    pub(crate) fn record(&self, success: bool, latency: Duration, now: Instant) {
        let mut stats = self.stats.write();
        stats.attempts += 1;
        stats.total_latency += latency;
        if success {
            stats.successes += 1;
            stats.last_success = Some(now);
        }
    }
}

/// Ordered endpoint set; index 0 is the primary.
#[derive(Debug, Default)]
pub struct EndpointPool {
    pub endpoints: Vec<Endpoint>,
}

impl EndpointPool {
    pub fn new() -> Self {
        Self {
            endpoints: Vec::new(),
        }
    }

    pub fn from_config(cfg: &[EndpointConfig]) -> Result<Self, TitleSepError> {
        if cfg.is_empty() {
            return Err(TitleSepError::Configuration(
                "at least one endpoint is required".to_string(),
            ));
        }
        let mut pool = Self::new();
        for (i, ep) in cfg.iter().enumerate() {
            pool.endpoints.push(Endpoint::from_config(EndpointId(i), ep)?);
        }
        Ok(pool)
    }

    pub fn primary(&self) -> EndpointId {
        EndpointId(0)
    }

    pub fn get(&self, id: EndpointId) -> Option<&Endpoint> {
        self.endpoints.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = EndpointId> + '_ {
        self.endpoints.iter().map(|e| e.id)
    }
}

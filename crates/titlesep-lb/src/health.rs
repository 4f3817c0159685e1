use crate::registry::EndpointRegistry;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

/// Issues a single liveness request.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// `true` when `url` answered with a success status within `timeout`.
    async fn check(&self, url: &str, timeout: Duration) -> bool;
}

pub struct HealthCheckConfig {
    pub timeout: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

/// One-time startup probe of the primary endpoint. A failure or timeout marks it
/// unreachable; it is otherwise trusted until one of its calls fails.
pub async fn probe_primary<P>(
    registry: &EndpointRegistry,
    probe: &P,
    cfg: &HealthCheckConfig,
) -> bool
where
    P: LivenessProbe + ?Sized,
{
    let primary = registry.pool().primary();
    let Some(ep) = registry.endpoint(primary) else {
        return false;
    };
    let Some(url) = ep.health_check_url.as_deref() else {
        info!(endpoint = %ep.name, "primary has no liveness path, assuming reachable");
        return true;
    };

    let ok = match tokio::time::timeout(cfg.timeout, probe.check(url, cfg.timeout)).await {
        Ok(ok) => ok,
        Err(_) => false,
    };
    if ok {
        info!(endpoint = %ep.name, "primary endpoint is reachable");
    } else {
        warn!(endpoint = %ep.name, url, "primary endpoint probe failed, using fallbacks");
        registry.mark_unreachable(primary);
    }
    ok
}

use crate::types::{EndpointId, EndpointPool};
use std::time::Instant;

pub trait Balancer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Best endpoint among those with recorded outcomes, or `None` when no
    /// endpoint qualifies for scoring yet.
    fn pick(&self, pool: &EndpointPool, now: Instant) -> Option<EndpointId>;
}

pub mod scored;

pub use scored::{endpoint_score, ScoredBalancer};

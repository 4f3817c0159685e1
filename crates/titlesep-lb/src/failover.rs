use crate::types::{EndpointId, EndpointPool};

/// How a successful fallback affects endpoint selection for later calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// The endpoint that worked is pinned for subsequent calls.
    Sticky,
    /// The selection in force before the call is restored.
    Transient,
}

/// Remaining endpoints to try after `tried` failed, in declaration order.
pub fn fallback_order(pool: &EndpointPool, tried: EndpointId) -> Vec<EndpointId> {
    pool.ids().filter(|id| *id != tried).collect()
}

//! TitleSep endpoint registry
//!
//! Provides:
//! - Endpoint pool with per-endpoint outcome statistics and primary reachability
//! - Performance scoring of attempted endpoints
//! - Fallback ordering and sticky/transient fallback policy
//! - One-time liveness probe of the primary endpoint
//! - Optional outbound request shaping
//! - Process-level prometheus metrics

pub mod algorithms;
pub mod failover;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod shaping;
pub mod types;

pub use algorithms::*;
pub use failover::*;
pub use health::*;
pub use registry::*;
pub use shaping::*;
pub use types::*;

use std::time::{Duration, Instant};
use thiserror::Error;
use titlesep_core::{NetworkConfig, TitleSepError};
use titlesep_lb::{EndpointId, EndpointRegistry, RequestShaper};
use tracing::{debug, warn};

use crate::transport::{RatingTransport, TransportError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed payload: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether another attempt on the same endpoint may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::RateLimited | FetchError::Transport(_))
    }

    pub fn into_core(self, endpoint: &str) -> TitleSepError {
        match self {
            FetchError::RateLimited => TitleSepError::RateLimited(endpoint.to_string()),
            FetchError::Status(status) => TitleSepError::HttpStatus {
                endpoint: endpoint.to_string(),
                status,
            },
            FetchError::Transport(e) => TitleSepError::Network(e.to_string()),
            FetchError::Decode(msg) => TitleSepError::Decode(format!("{msg} from {endpoint}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Base wait after a 429, doubled per attempt
    pub rate_limit_backoff: Duration,
    /// Base wait after a transport failure, doubled per attempt
    pub transport_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &NetworkConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            rate_limit_backoff: Duration::from_millis(cfg.rate_limit_backoff_ms),
            transport_backoff: Duration::from_millis(cfg.transport_backoff_ms),
        }
    }

    /// Wait before the attempt following `attempt` (0-based): `2^attempt * base`.
    pub fn backoff(&self, error: &FetchError, attempt: u32) -> Duration {
        let base = match error {
            FetchError::RateLimited => self.rate_limit_backoff,
            _ => self.transport_backoff,
        };
        base * 2u32.saturating_pow(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_backoff: Duration::from_millis(1000),
            transport_backoff: Duration::from_millis(500),
        }
    }
}

/// Everything a single-endpoint fetch needs.
pub struct FetchContext<'a> {
    pub transport: &'a dyn RatingTransport,
    pub registry: &'a EndpointRegistry,
    pub shaper: &'a RequestShaper,
    pub policy: &'a RetryPolicy,
    pub timeout: Duration,
}

/// GET `url` on `endpoint` with the retry policy, then decode the body.
///
/// 429s and transport failures are retried with exponential backoff; any other
/// non-OK status and undecodable payloads fail at once. Every attempt's outcome
/// is recorded against `endpoint`.
pub async fn fetch_with_retry<T>(
    ctx: &FetchContext<'_>,
    endpoint: EndpointId,
    url: &str,
    decode: impl Fn(&str) -> Result<T, FetchError>,
) -> Result<T, FetchError> {
    let name = ctx.registry.name(endpoint).to_string();
    let mut last_error = FetchError::Transport(TransportError::Connect(
        "no attempt made".to_string(),
    ));

    for attempt in 0..ctx.policy.max_attempts {
        if !ctx.shaper.try_acquire() {
            debug!(endpoint = %name, "request throttled");
            ctx.shaper.acquire().await;
        }
        debug!(endpoint = %name, attempt, url, "GET");

        let started = Instant::now();
        let result = ctx.transport.get(url, ctx.timeout).await;
        let elapsed = started.elapsed();

        let error = match result {
            Ok(resp) if resp.is_success() => match decode(&resp.body) {
                Ok(value) => {
                    ctx.registry.record_outcome(endpoint, true, elapsed);
                    return Ok(value);
                }
                Err(e) => {
                    ctx.registry.record_outcome(endpoint, false, elapsed);
                    warn!(endpoint = %name, error = %e, "undecodable response");
                    return Err(e);
                }
            },
            Ok(resp) if resp.status == 429 => FetchError::RateLimited,
            Ok(resp) => {
                ctx.registry.record_outcome(endpoint, false, elapsed);
                warn!(endpoint = %name, status = resp.status, "request failed");
                return Err(FetchError::Status(resp.status));
            }
            Err(e) => FetchError::Transport(e),
        };

        ctx.registry.record_outcome(endpoint, false, elapsed);
        if attempt + 1 < ctx.policy.max_attempts {
            let wait = ctx.policy.backoff(&error, attempt);
            warn!(
                endpoint = %name,
                error = %error,
                "attempt {}/{} failed, retrying in {:?}",
                attempt + 1,
                ctx.policy.max_attempts,
                wait
            );
            tokio::time::sleep(wait).await;
        }
        last_error = error;
    }

    Err(last_error)
}

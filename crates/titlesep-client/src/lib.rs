//! Access layer for the rating API.
//!
//! Requests go through a [`RatingTransport`], are retried per endpoint by
//! [`fetch_with_retry`], and fall back across the endpoint registry in
//! [`RatingService`], which also memoizes every lookup.

pub mod api;
pub mod retry;
pub mod service;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use api::{decode_games, decode_player, ApiRequest};
pub use retry::{fetch_with_retry, FetchContext, FetchError, RetryPolicy};
pub use service::{LookupCounters, RatingService};
pub use transport::{HttpTransport, RatingTransport, RawResponse, TransportError, TransportProbe};

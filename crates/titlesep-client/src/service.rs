use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use titlesep_cache::ResultCache;
use titlesep_core::{GameList, GameType, NetworkConfig, PlayerRecord, Result};
use titlesep_lb::{
    fallback_order, probe_primary, EndpointId, EndpointRegistry, FallbackPolicy,
    HealthCheckConfig, RequestShaper,
};
use tracing::{debug, info, warn};

use crate::api::{decode_games, decode_player, ApiRequest};
use crate::retry::{fetch_with_retry, FetchContext, FetchError, RetryPolicy};
use crate::transport::{RatingTransport, TransportProbe};

/// Remote lookups issued (cache misses), reset at the start of each search.
#[derive(Debug, Default)]
pub struct LookupCounters {
    player_lookups: AtomicU64,
    game_lookups: AtomicU64,
}

impl LookupCounters {
    pub fn reset(&self) {
        self.player_lookups.store(0, Ordering::Relaxed);
        self.game_lookups.store(0, Ordering::Relaxed);
    }

    pub fn player_lookups(&self) -> u64 {
        self.player_lookups.load(Ordering::Relaxed)
    }

    pub fn game_lookups(&self) -> u64 {
        self.game_lookups.load(Ordering::Relaxed)
    }
}

/// Cached, retrying, endpoint-falling-back access to the rating API.
pub struct RatingService {
    transport: Arc<dyn RatingTransport>,
    registry: Arc<EndpointRegistry>,
    cache: ResultCache,
    shaper: RequestShaper,
    policy: RetryPolicy,
    api_base: String,
    timeout: Duration,
    probe_timeout: Duration,
    counters: LookupCounters,
}

impl RatingService {
    pub fn new(
        config: &NetworkConfig,
        transport: Arc<dyn RatingTransport>,
        cache: ResultCache,
    ) -> Result<Self> {
        let registry = Arc::new(EndpointRegistry::from_config(&config.endpoints)?);
        Ok(Self {
            transport,
            registry,
            cache,
            shaper: RequestShaper::new(config.requests_per_second),
            policy: RetryPolicy::from_config(config),
            api_base: config.api_base.clone(),
            timeout: config.request_timeout(),
            probe_timeout: config.probe_timeout(),
            counters: LookupCounters::default(),
        })
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn counters(&self) -> &LookupCounters {
        &self.counters
    }

    /// One-time startup check of the primary endpoint.
    pub async fn probe_primary(&self) -> bool {
        let cfg = HealthCheckConfig {
            timeout: self.probe_timeout,
        };
        probe_primary(&self.registry, &TransportProbe(self.transport.as_ref()), &cfg).await
    }

    fn context(&self) -> FetchContext<'_> {
        FetchContext {
            transport: self.transport.as_ref(),
            registry: &self.registry,
            shaper: &self.shaper,
            policy: &self.policy,
            timeout: self.timeout,
        }
    }

    /// Player lookup on one endpoint, with retries.
    pub async fn fetch_player(
        &self,
        endpoint: EndpointId,
        code: &str,
    ) -> std::result::Result<PlayerRecord, FetchError> {
        let url = self.url_for(endpoint, &ApiRequest::player(code))?;
        fetch_with_retry(&self.context(), endpoint, &url, |body| decode_player(body, code)).await
    }

    /// Game-list lookup on one endpoint, with retries.
    pub async fn fetch_games(
        &self,
        endpoint: EndpointId,
        code: &str,
        game_type: GameType,
        limit: usize,
    ) -> std::result::Result<GameList, FetchError> {
        let url = self.url_for(endpoint, &ApiRequest::games(code, game_type, limit))?;
        fetch_with_retry(&self.context(), endpoint, &url, decode_games).await
    }

    fn url_for(
        &self,
        endpoint: EndpointId,
        request: &ApiRequest,
    ) -> std::result::Result<String, FetchError> {
        let ep = self
            .registry
            .endpoint(endpoint)
            .ok_or_else(|| FetchError::Decode(format!("unknown endpoint {}", endpoint.0)))?;
        Ok(request.url_for(ep, &self.api_base))
    }

    /// Cached player lookup with endpoint fallback. `None` means no endpoint
    /// could produce the record; that outcome is cached too.
    ///
    /// A success on a fallback endpoint pins it for subsequent calls.
    pub async fn player_with_fallback(&self, code: &str) -> Option<PlayerRecord> {
        if let Some(cached) = self.cache.get_player(code) {
            debug!(code, found = cached.is_some(), "player cache hit");
            return cached;
        }
        self.counters.player_lookups.fetch_add(1, Ordering::Relaxed);

        let record = self
            .with_fallback(FallbackPolicy::Sticky, |ep| self.fetch_player(ep, code))
            .await;
        match &record {
            Some(r) => debug!(code, name = %r.full_name, "resolved player"),
            None => warn!(code, "player could not be resolved on any endpoint"),
        }
        self.cache.put_player(code, record.clone());
        record
    }

    /// Cached game-list lookup with endpoint fallback; empty when every
    /// endpoint failed. A fallback success does not change endpoint selection.
    pub async fn games_with_fallback(
        &self,
        code: &str,
        game_type: GameType,
        limit: usize,
    ) -> Arc<GameList> {
        if let Some(cached) = self.cache.get_games(code, game_type) {
            debug!(code, %game_type, "games cache hit");
            return cached;
        }
        self.counters.game_lookups.fetch_add(1, Ordering::Relaxed);

        let games = self
            .with_fallback(FallbackPolicy::Transient, |ep| {
                self.fetch_games(ep, code, game_type, limit)
            })
            .await
            .unwrap_or_default();
        debug!(code, %game_type, count = games.len(), "fetched games");
        self.cache.put_games(code, game_type, games)
    }

    /// Try the selected endpoint, then every other endpoint once in
    /// declaration order.
    async fn with_fallback<T, F, Fut>(&self, policy: FallbackPolicy, fetch: F) -> Option<T>
    where
        F: Fn(EndpointId) -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, FetchError>>,
    {
        let previous_pin = self.registry.pinned();
        let first = self.registry.select();

        let mut last_error = match fetch(first).await {
            Ok(value) => return Some(value),
            Err(e) => {
                self.on_endpoint_failure(first, &e);
                (first, e)
            }
        };

        for ep in fallback_order(self.registry.pool(), first) {
            match fetch(ep).await {
                Ok(value) => {
                    match policy {
                        FallbackPolicy::Sticky => {
                            info!(
                                endpoint = %self.registry.name(ep),
                                "switching to fallback endpoint"
                            );
                            self.registry.pin(ep);
                        }
                        FallbackPolicy::Transient => self.registry.restore_pin(previous_pin),
                    }
                    return Some(value);
                }
                Err(e) => {
                    self.on_endpoint_failure(ep, &e);
                    last_error = (ep, e);
                }
            }
        }

        let (ep, error) = last_error;
        let error = error.into_core(self.registry.name(ep));
        warn!(error = %error, "all endpoints failed");
        None
    }

    fn on_endpoint_failure(&self, endpoint: EndpointId, error: &FetchError) {
        warn!(endpoint = %self.registry.name(endpoint), error = %error, "endpoint failed");
        self.registry.unpin_if(endpoint);
        if endpoint == self.registry.pool().primary() {
            self.registry.mark_unreachable(endpoint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Reply, ScriptedTransport};
    use titlesep_core::{EndpointConfig, EndpointKind};

    fn network() -> NetworkConfig {
        NetworkConfig {
            api_base: "http://upstream.test/api.php".into(),
            endpoints: vec![
                EndpointConfig {
                    name: "primary".into(),
                    kind: EndpointKind::Direct,
                    base: "http://primary.test/api.php".into(),
                    health_check_path: Some("/".into()),
                },
                EndpointConfig {
                    name: "relay-a".into(),
                    kind: EndpointKind::Relay,
                    base: "http://relay-a.test/?url=".into(),
                    health_check_path: None,
                },
                EndpointConfig {
                    name: "relay-b".into(),
                    kind: EndpointKind::Relay,
                    base: "http://relay-b.test/raw?url=".into(),
                    health_check_path: None,
                },
            ],
            max_attempts: 1,
            ..NetworkConfig::default()
        }
    }

    fn service(transport: Arc<ScriptedTransport>) -> RatingService {
        RatingService::new(&network(), transport, ResultCache::new()).unwrap()
    }

    #[tokio::test]
    async fn second_player_lookup_is_served_from_cache() {
        let transport = Arc::new(ScriptedTransport::new().with_player("1", "Doe, Jane", "FM"));
        let svc = service(transport.clone());

        let first = svc.player_with_fallback("1").await;
        let second = svc.player_with_fallback("1").await;

        assert_eq!(first, second);
        assert_eq!(first.unwrap().title, "FM");
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(svc.counters().player_lookups(), 1);
    }

    #[tokio::test]
    async fn negative_player_result_is_cached() {
        let transport = Arc::new(ScriptedTransport::new());
        let svc = service(transport.clone());

        assert!(svc.player_with_fallback("404").await.is_none());
        let issued = transport.requests().len();
        assert_eq!(issued, 3);
        assert!(svc.player_with_fallback("404").await.is_none());
        assert_eq!(transport.requests().len(), issued);
    }

    #[tokio::test]
    async fn player_fallback_success_is_sticky() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_player("1", "A", "")
                .with_player("2", "B", ""),
        );
        transport.set_down("primary.test");
        let svc = service(transport.clone());

        assert!(svc.player_with_fallback("1").await.is_some());
        assert_eq!(svc.registry().pinned(), Some(EndpointId(1)));
        assert!(!svc.registry().primary_reachable());

        transport.clear_requests();
        assert!(svc.player_with_fallback("2").await.is_some());
        assert_eq!(transport.count_host("relay-a.test"), 1);
        assert_eq!(transport.count_host("primary.test"), 0);
    }

    #[tokio::test]
    async fn malformed_payload_falls_back_without_retry() {
        let transport = Arc::new(ScriptedTransport::new().with_player("1", "Doe, Jane", ""));
        transport.push_reply("primary.test", Reply::Body("<html>".into()));
        let config = NetworkConfig {
            max_attempts: 3,
            ..network()
        };
        let svc = RatingService::new(&config, transport.clone(), ResultCache::new()).unwrap();

        let record = svc.player_with_fallback("1").await;

        assert_eq!(record.unwrap().full_name, "Doe, Jane");
        assert_eq!(transport.count_host("primary.test"), 1);
        assert_eq!(transport.count_host("relay-a.test"), 1);
        assert_eq!(svc.registry().pinned(), Some(EndpointId(1)));
        assert!(!svc.registry().primary_reachable());
    }

    #[tokio::test]
    async fn games_fallback_success_is_transient() {
        let transport = Arc::new(ScriptedTransport::new().with_win("1", "2", GameType::Standard));
        transport.push_reply("primary.test", Reply::Status(503));
        let svc = service(transport.clone());

        let games = svc.games_with_fallback("1", GameType::Standard, 1000).await;
        assert_eq!(games.len(), 1);
        assert_eq!(svc.registry().pinned(), None);
        assert_eq!(transport.count_host("relay-a.test"), 1);
    }

    #[tokio::test]
    async fn games_fallback_restores_previous_pin() {
        let transport = Arc::new(ScriptedTransport::new().with_win("1", "2", GameType::Rapid));
        let svc = service(transport.clone());
        svc.registry().pin(EndpointId(2));
        transport.push_reply("relay-b.test", Reply::Fail);

        let games = svc.games_with_fallback("1", GameType::Rapid, 1000).await;
        assert_eq!(games.len(), 1);
        assert_eq!(svc.registry().pinned(), Some(EndpointId(2)));
    }

    #[tokio::test]
    async fn exhausted_game_lookup_is_cached_empty() {
        let transport = Arc::new(ScriptedTransport::new());
        for host in ["primary.test", "relay-a.test", "relay-b.test"] {
            transport.set_down(host);
        }
        let svc = service(transport.clone());

        assert!(svc.games_with_fallback("1", GameType::Blitz, 10).await.is_empty());
        assert_eq!(transport.requests().len(), 3);
        assert!(svc.games_with_fallback("1", GameType::Blitz, 10).await.is_empty());
        assert_eq!(transport.requests().len(), 3);
        assert_eq!(svc.counters().game_lookups(), 1);
    }

    #[tokio::test]
    async fn probe_failure_marks_primary_unreachable() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_down("primary.test");
        let svc = service(transport.clone());

        assert!(!svc.probe_primary().await);
        assert!(!svc.registry().primary_reachable());
        assert_eq!(svc.registry().best_endpoint(), EndpointId(1));
    }

    #[tokio::test]
    async fn counters_reset() {
        let transport = Arc::new(ScriptedTransport::new().with_player("1", "A", ""));
        let svc = service(transport);
        svc.player_with_fallback("1").await;
        svc.games_with_fallback("1", GameType::Standard, 5).await;
        assert_eq!((svc.counters().player_lookups(), svc.counters().game_lookups()), (1, 1));
        svc.counters().reset();
        assert_eq!((svc.counters().player_lookups(), svc.counters().game_lookups()), (0, 0));
    }
}

use std::sync::Arc;
use std::time::Instant;
use titlesep_cache::ResultCache;
use titlesep_client::{RatingService, RatingTransport};
use titlesep_core::{
    normalize_player_code, Result, SearchConfig, SearchResult, TitleSepConfig, TitleSepError,
    TitleSet,
};
use tracing::{info, warn};

use crate::explorer::{ExplorerConfig, GraphExplorer};
use crate::sink::{ResultSink, SearchEvent};

/// One search as supplied by the configuration source.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub player_code: String,
    pub titles: TitleSet,
    /// 0 = results only, 1 = per-player lines, 2 = per-opponent lines
    pub debug_level: u8,
}

impl SearchRequest {
    pub fn new(player_code: impl Into<String>, titles: TitleSet) -> Self {
        Self {
            player_code: player_code.into(),
            titles,
            debug_level: 0,
        }
    }

    pub fn with_debug_level(mut self, level: u8) -> Self {
        self.debug_level = level;
        self
    }
}

/// Owns the rating service (cache, endpoint registry, lookup counters) that
/// successive searches share.
pub struct SearchSession {
    service: RatingService,
    config: SearchConfig,
}

impl SearchSession {
    pub fn new(service: RatingService, config: SearchConfig) -> Self {
        Self { service, config }
    }

    /// Session over `transport` with a fresh cache.
    pub fn from_config(
        config: &TitleSepConfig,
        transport: Arc<dyn RatingTransport>,
    ) -> Result<Self> {
        let service = RatingService::new(&config.network, transport, ResultCache::new())?;
        Ok(Self::new(service, config.search.clone()))
    }

    pub fn service(&self) -> &RatingService {
        &self.service
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Startup reachability probe of the primary endpoint.
    pub async fn probe(&self) -> bool {
        self.service.probe_primary().await
    }

    /// Forget every cached lookup and search outcome.
    pub fn clear_cache(&self) {
        self.service.cache().clear();
    }

    /// Run one search, reporting to `sink`. Only a missing player code is an
    /// error; unreachable players and empty frontiers are normal outcomes.
    pub async fn run(
        &self,
        request: &SearchRequest,
        sink: &dyn ResultSink,
    ) -> Result<SearchResult> {
        let Some(code) = normalize_player_code(&request.player_code, self.config.strip_check_letter)
        else {
            let err = TitleSepError::InvalidInput("no player code supplied".to_string());
            sink.emit(SearchEvent::Error(err.to_string()));
            return Err(err);
        };

        sink.emit(SearchEvent::Status(format!(
            "Searching for the nearest {} from {code}...",
            request.titles
        )));

        self.service.counters().reset();
        let started = Instant::now();

        if let Some(cached) = self.service.cache().get_search(&code, &request.titles) {
            info!(code = %code, "reusing cached search outcome");
            sink.emit(SearchEvent::Status("Using cached result.".to_string()));
            sink.emit(SearchEvent::Result {
                code,
                result: cached.clone(),
            });
            self.report_summary(request, started, sink);
            return Ok(cached);
        }

        let exploration = GraphExplorer::new(
            &self.service,
            ExplorerConfig::from(&self.config),
            &request.titles,
        )
        .with_debug_level(request.debug_level)
        .explore(&code, sink)
        .await;
        let result = exploration.result;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if !self.service.cache().put_search(&code, &request.titles, result.clone()) {
            warn!(code = %code, "search outcome already cached");
        }
        info!(
            code = %code,
            value = result.value,
            expanded = exploration.expanded.len(),
            elapsed_ms,
            "search finished"
        );

        sink.emit(SearchEvent::Result {
            code,
            result: result.clone(),
        });
        self.report_summary(request, started, sink);

        Ok(result)
    }

    /// Trailing timing, lookup, endpoint and cache lines of a search.
    fn report_summary(&self, request: &SearchRequest, started: Instant, sink: &dyn ResultSink) {
        sink.emit(SearchEvent::Elapsed(started.elapsed()));
        sink.emit(SearchEvent::Lookups {
            players: self.service.counters().player_lookups(),
            games: self.service.counters().game_lookups(),
        });
        for summary in self.service.registry().summaries() {
            sink.emit(SearchEvent::Endpoint(summary));
        }
        if request.debug_level >= 1 {
            sink.emit(SearchEvent::Cache(self.service.cache().stats()));
        }
    }
}

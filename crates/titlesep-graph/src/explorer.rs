use std::collections::{BTreeSet, HashSet, VecDeque};
use titlesep_client::RatingService;
use titlesep_core::{
    is_titled_player, GameType, PathStep, PlayerRecord, SearchConfig, SearchPath, SearchResult,
    TitleSepError, TitleSet,
};
use tracing::{debug, info};

use crate::sink::{ResultSink, SearchEvent};

/// Limits for one exploration.
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// Nodes at this distance are not expanded
    pub max_depth: usize,
    /// Games requested per (player, game type)
    pub game_limit: usize,
    /// Progress is reported every this many expanded players; 0 disables it
    pub progress_interval: usize,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for ExplorerConfig {
    fn from(cfg: &SearchConfig) -> Self {
        Self {
            max_depth: cfg.max_depth,
            game_limit: cfg.game_limit,
            progress_interval: cfg.progress_interval,
        }
    }
}

/// Outcome of an exploration plus the order players were expanded in.
#[derive(Debug, Clone)]
pub struct Exploration {
    pub result: SearchResult,
    /// `(code, distance)` per expanded player, in expansion order
    pub expanded: Vec<(String, usize)>,
}

impl Exploration {
    fn finish(result: SearchResult, expanded: Vec<(String, usize)>) -> Self {
        Self { result, expanded }
    }
}

struct FrontierNode {
    code: String,
    distance: usize,
    path: SearchPath,
}

/// Breadth-first walk of the beat relation from a query player towards the
/// nearest player holding one of the requested titles.
///
/// Distance counts intermediate wins: beating a titled player directly is 0.
pub struct GraphExplorer<'a> {
    service: &'a RatingService,
    config: ExplorerConfig,
    titles: &'a TitleSet,
    debug_level: u8,
}

impl<'a> GraphExplorer<'a> {
    pub fn new(service: &'a RatingService, config: ExplorerConfig, titles: &'a TitleSet) -> Self {
        Self {
            service,
            config,
            titles,
            debug_level: 0,
        }
    }

    pub fn with_debug_level(mut self, level: u8) -> Self {
        self.debug_level = level;
        self
    }

    pub async fn explore(&self, query: &str, sink: &dyn ResultSink) -> Exploration {
        let Some(root) = self.service.player_with_fallback(query).await else {
            let err = TitleSepError::PlayerNotFound(query.to_string());
            info!(error = %err, "search ends without a root");
            return Exploration::finish(SearchResult::player_not_found(), Vec::new());
        };

        if is_titled_player(Some(&root), self.titles, true) {
            info!(
                code = query,
                title = %root.title,
                "query player already holds a requested title"
            );
            return Exploration::finish(
                SearchResult::found(0, vec![PathStep::from_record(&root)]),
                Vec::new(),
            );
        }

        let mut frontier = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut expanded = Vec::new();

        visited.insert(query.to_string());
        frontier.push_back(FrontierNode {
            code: query.to_string(),
            distance: 0,
            path: vec![PathStep::from_record(&root)],
        });

        while let Some(node) = frontier.pop_front() {
            if node.distance >= self.config.max_depth {
                continue;
            }
            let Some(current) = self.service.player_with_fallback(&node.code).await else {
                continue;
            };

            expanded.push((node.code.clone(), node.distance));
            self.report_progress(expanded.len(), sink);
            debug!(code = %node.code, distance = node.distance, "expanding player");
            if self.debug_level >= 1 {
                sink.emit(SearchEvent::Diagnostic(format!(
                    "Checking {} ({}) at distance {}",
                    current.display_name(),
                    node.code,
                    node.distance
                )));
            }

            let beaten = self.beaten_opponents(&node.code).await;
            if self.debug_level >= 1 {
                sink.emit(SearchEvent::Diagnostic(format!(
                    "{} beat {} distinct opponents",
                    current.display_name(),
                    beaten.len()
                )));
            }

            for opponent in beaten {
                if !visited.insert(opponent.clone()) {
                    continue;
                }
                let Some(record) = self.resolve_opponent(&opponent, sink).await else {
                    continue;
                };

                let mut path = node.path.clone();
                path.push(PathStep::from_record(&record));

                if is_titled_player(Some(&record), self.titles, true) {
                    info!(
                        code = %opponent,
                        title = %record.title,
                        distance = node.distance,
                        "reached titled player"
                    );
                    return Exploration::finish(
                        SearchResult::found(node.distance as i32, path),
                        expanded,
                    );
                }

                if node.distance + 1 < self.config.max_depth {
                    frontier.push_back(FrontierNode {
                        code: opponent,
                        distance: node.distance + 1,
                        path,
                    });
                }
            }
        }

        info!(code = query, expanded = expanded.len(), "frontier exhausted");
        Exploration::finish(SearchResult::exhausted(), expanded)
    }

    /// Opponents `code` has beaten in any game type, de-duplicated and in
    /// lexicographic order.
    pub async fn beaten_opponents(&self, code: &str) -> BTreeSet<String> {
        let mut beaten = BTreeSet::new();
        for game_type in GameType::ALL {
            let games = self
                .service
                .games_with_fallback(code, game_type, self.config.game_limit)
                .await;
            beaten.extend(
                games
                    .iter()
                    .filter(|game| game.is_win())
                    .filter_map(|game| game.opponent_identity())
                    .map(str::to_string),
            );
        }
        beaten
    }

    async fn resolve_opponent(&self, code: &str, sink: &dyn ResultSink) -> Option<PlayerRecord> {
        let cached = self.service.cache().has_player(code);
        let record = self.service.player_with_fallback(code).await;
        if self.debug_level >= 2 {
            let source = if cached { " (cached)" } else { "" };
            let line = match &record {
                Some(r) if r.title.is_empty() => format!("  {} [{code}]{source}", r.display_name()),
                Some(r) => format!("  {} [{code}] {}{source}", r.display_name(), r.title),
                None => format!("  [{code}] unresolved{source}"),
            };
            sink.emit(SearchEvent::Diagnostic(line));
        }
        record
    }

    fn report_progress(&self, checked: usize, sink: &dyn ResultSink) {
        let interval = self.config.progress_interval;
        if interval > 0 && checked % interval == 0 {
            sink.emit(SearchEvent::Progress(checked));
        }
    }
}

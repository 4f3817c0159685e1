use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use titlesep_core::{GameList, GameType, PlayerRecord, SearchResult, TitleSet};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GamesKey {
    pub code: String,
    pub game_type: GameType,
}

impl GamesKey {
    pub fn new(code: &str, game_type: GameType) -> Self {
        Self {
            code: code.to_string(),
            game_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub code: String,
    /// Sorted title codes, see [`TitleSet::cache_key`]
    pub titles: String,
}

impl SearchKey {
    pub fn new(code: &str, titles: &TitleSet) -> Self {
        Self {
            code: code.to_string(),
            titles: titles.cache_key(),
        }
    }
}

#[derive(Debug, Default)]
struct Counter {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counter {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub player_hits: u64,
    pub player_misses: u64,
    pub games_hits: u64,
    pub games_misses: u64,
    pub search_hits: u64,
    pub search_misses: u64,
    pub players: usize,
    pub game_lists: usize,
    pub searches: usize,
}

impl CacheStats {
    pub fn render(&self) -> String {
        format!(
            "cache: players {}/{} hit, games {}/{} hit, searches {}/{} hit \
             ({} players, {} game lists)",
            self.player_hits,
            self.player_hits + self.player_misses,
            self.games_hits,
            self.games_hits + self.games_misses,
            self.search_hits,
            self.search_hits + self.search_misses,
            self.players,
            self.game_lists,
        )
    }
}

/// Memoizes player lookups (`None` = not found), game lists per
/// `(code, game type)` and search outcomes per `(code, title set)`.
///
/// Each key is written at most once; later writes for the same key are ignored.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    players: Arc<DashMap<String, Option<PlayerRecord>>>,
    games: Arc<DashMap<GamesKey, Arc<GameList>>>,
    searches: Arc<DashMap<SearchKey, SearchResult>>,
    player_counter: Arc<Counter>,
    games_counter: Arc<Counter>,
    search_counter: Arc<Counter>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(None)` is a cached "not found".
    pub fn get_player(&self, code: &str) -> Option<Option<PlayerRecord>> {
        let found = self.players.get(code).map(|e| e.value().clone());
        self.record(&self.player_counter, found.is_some());
        found
    }

    /// Presence check that leaves the hit/miss counters alone.
    pub fn has_player(&self, code: &str) -> bool {
        self.players.contains_key(code)
    }

    pub fn put_player(&self, code: &str, record: Option<PlayerRecord>) -> bool {
        trace!(code, found = record.is_some(), "caching player");
        Self::insert_once(&self.players, code.to_string(), record)
    }

    pub fn get_games(&self, code: &str, game_type: GameType) -> Option<Arc<GameList>> {
        let found = self
            .games
            .get(&GamesKey::new(code, game_type))
            .map(|e| Arc::clone(e.value()));
        self.record(&self.games_counter, found.is_some());
        found
    }

    /// Stores `games` unless the key is already present; returns the cached list.
    pub fn put_games(&self, code: &str, game_type: GameType, games: GameList) -> Arc<GameList> {
        trace!(code, %game_type, count = games.len(), "caching games");
        let entry = self
            .games
            .entry(GamesKey::new(code, game_type))
            .or_insert_with(|| Arc::new(games));
        Arc::clone(entry.value())
    }

    pub fn get_search(&self, code: &str, titles: &TitleSet) -> Option<SearchResult> {
        let found = self
            .searches
            .get(&SearchKey::new(code, titles))
            .map(|e| e.value().clone());
        self.record(&self.search_counter, found.is_some());
        found
    }

    pub fn put_search(&self, code: &str, titles: &TitleSet, result: SearchResult) -> bool {
        Self::insert_once(&self.searches, SearchKey::new(code, titles), result)
    }

    pub fn stats(&self) -> CacheStats {
        let (player_hits, player_misses) = self.player_counter.snapshot();
        let (games_hits, games_misses) = self.games_counter.snapshot();
        let (search_hits, search_misses) = self.search_counter.snapshot();
        CacheStats {
            player_hits,
            player_misses,
            games_hits,
            games_misses,
            search_hits,
            search_misses,
            players: self.players.len(),
            game_lists: self.games.len(),
            searches: self.searches.len(),
        }
    }

    pub fn clear(&self) {
        self.players.clear();
        self.games.clear();
        self.searches.clear();
    }

    fn record(&self, counter: &Counter, hit: bool) {
        if hit {
            counter.hit();
        } else {
            counter.miss();
        }
    }

    fn insert_once<K, V>(map: &DashMap<K, V>, key: K, value: V) -> bool
    where
        K: Eq + std::hash::Hash,
    {
        match map.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }
}

use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;
use titlesep_cache::CacheStats;
use titlesep_core::{SearchResult, SearchStatus};
use titlesep_lb::EndpointSummary;

/// Something a search reports while it runs.
#[derive(Debug, Clone)]
pub enum SearchEvent {
    Status(String),
    /// Expanded-player count, emitted at the configured interval
    Progress(usize),
    /// Debug-level detail; only produced when the request asks for it
    Diagnostic(String),
    Result {
        code: String,
        result: SearchResult,
    },
    Elapsed(Duration),
    Lookups {
        players: u64,
        games: u64,
    },
    Endpoint(EndpointSummary),
    Cache(CacheStats),
    Error(String),
}

impl fmt::Display for SearchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchEvent::Status(msg) | SearchEvent::Diagnostic(msg) => f.write_str(msg),
            SearchEvent::Progress(checked) => write!(f, "{checked} players checked..."),
            SearchEvent::Result { code, result } => match result.status {
                SearchStatus::Found => write!(
                    f,
                    "Title separation: {} ({})",
                    result.value,
                    result.render_path()
                ),
                SearchStatus::Exhausted => {
                    write!(f, "No titled player reachable from {code} (-1)")
                }
                SearchStatus::PlayerNotFound => write!(f, "Player {code} not found."),
            },
            SearchEvent::Elapsed(elapsed) => {
                write!(f, "Search took {:.2}s", elapsed.as_secs_f64())
            }
            SearchEvent::Lookups { players, games } => {
                write!(f, "Lookups: {players} players, {games} game lists")
            }
            SearchEvent::Endpoint(summary) => f.write_str(&summary.render()),
            SearchEvent::Cache(stats) => f.write_str(&stats.render()),
            SearchEvent::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Receives the ordered stream of search events.
pub trait ResultSink: Send + Sync {
    fn emit(&self, event: SearchEvent);
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SearchEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SearchEvent> {
        self.events.lock().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events.lock().iter().map(ToString::to_string).collect()
    }
}

impl ResultSink for MemorySink {
    fn emit(&self, event: SearchEvent) {
        self.events.lock().push(event);
    }
}

/// Drops everything.
pub struct NullSink;

impl ResultSink for NullSink {
    fn emit(&self, _event: SearchEvent) {}
}

//! In-memory rating source for tests.
//!
//! [`ScriptedTransport`] serves a small world of players and games, decoding
//! both direct and relayed URLs. Hosts can be taken down or given one-shot
//! scripted replies, and every requested URL is logged.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use titlesep_core::GameType;
use url::Url;

use crate::transport::{RatingTransport, RawResponse, TransportError};

#[derive(Debug, Clone)]
pub enum Reply {
    /// Empty body with this status
    Status(u16),
    /// 200 with this body
    Body(String),
    /// Connection failure
    Fail,
}

#[derive(Default)]
pub struct ScriptedTransport {
    players: Mutex<HashMap<String, Value>>,
    games: Mutex<HashMap<(String, GameType), Vec<Value>>>,
    scripted: Mutex<HashMap<String, VecDeque<Reply>>>,
    down: Mutex<HashSet<String>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_player(self, code: &str, name: &str, title: &str) -> Self {
        self.players.lock().insert(
            code.to_string(),
            json!({ "full_name": name, "title": title, "rating": 1800 }),
        );
        self
    }

    /// Record a win of `winner` over `loser` in `winner`'s game list.
    pub fn with_win(self, winner: &str, loser: &str, game_type: GameType) -> Self {
        self.with_game(
            winner,
            game_type,
            json!({
                "score": 1,
                "opponent_ecf_code": loser,
                "opponent_no": 0,
                "opponent_name": format!("Player {loser}"),
                "colour": "W",
                "game_date": "2024-05-01",
            }),
        )
    }

    pub fn with_game(self, code: &str, game_type: GameType, game: Value) -> Self {
        self.games
            .lock()
            .entry((code.to_string(), game_type))
            .or_default()
            .push(game);
        self
    }

    /// Queue a one-shot reply for the next request to `host`.
    pub fn push_reply(&self, host: &str, reply: Reply) {
        self.scripted
            .lock()
            .entry(host.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn set_down(&self, host: &str) {
        self.down.lock().insert(host.to_string());
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Requests whose decoded upstream target contains `needle`.
    pub fn count_requests(&self, needle: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|url| target_of(url).contains(needle))
            .count()
    }

    /// Requests sent to `host`.
    pub fn count_host(&self, host: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|url| host_of(url).as_deref() == Some(host))
            .count()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    fn serve(&self, url: &str) -> RawResponse {
        let target = target_of(url);
        let Some((_, path)) = target.split_once('?') else {
            return RawResponse::ok("ok");
        };
        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
        match parts.as_slice() {
            ["v2", "players", "code", code] => match self.players.lock().get(*code) {
                Some(player) => RawResponse::ok(player.to_string()),
                None => RawResponse::status(404),
            },
            ["v2", "games", game_type, "player", code, "limit", limit] => {
                let Ok(game_type) = game_type.parse::<GameType>() else {
                    return RawResponse::status(400);
                };
                let limit: usize = limit.parse().unwrap_or(usize::MAX);
                let games: Vec<Value> = self
                    .games
                    .lock()
                    .get(&(code.to_string(), game_type))
                    .map(|g| g.iter().take(limit).cloned().collect())
                    .unwrap_or_default();
                RawResponse::ok(json!({ "games": games }).to_string())
            }
            _ => RawResponse::status(404),
        }
    }
}

#[async_trait]
impl RatingTransport for ScriptedTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<RawResponse, TransportError> {
        self.requests.lock().push(url.to_string());
        let host = host_of(url).unwrap_or_default();

        let scripted = self
            .scripted
            .lock()
            .get_mut(&host)
            .and_then(|queue| queue.pop_front());
        if let Some(reply) = scripted {
            return match reply {
                Reply::Status(status) => Ok(RawResponse::status(status)),
                Reply::Body(body) => Ok(RawResponse::ok(body)),
                Reply::Fail => Err(TransportError::Connect(format!("{host} refused"))),
            };
        }

        if self.down.lock().contains(&host) {
            return Err(TransportError::Connect(format!("{host} is down")));
        }
        Ok(self.serve(url))
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Upstream URL a request resolves to: the decoded `url=` parameter for relays,
/// the URL itself otherwise.
pub fn target_of(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url) {
        if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "url") {
            return target.into_owned();
        }
    }
    url.to_string()
}

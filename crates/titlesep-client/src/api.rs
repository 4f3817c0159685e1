use serde::Deserialize;
use serde_json::Value;
use titlesep_core::{EndpointKind, GameList, GameRecord, GameType, PlayerRecord};
use titlesep_lb::Endpoint;
use url::form_urlencoded;

use crate::retry::FetchError;

/// A lookup against the upstream rating API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    Player {
        code: String,
    },
    Games {
        code: String,
        game_type: GameType,
        limit: usize,
    },
}

impl ApiRequest {
    pub fn player(code: &str) -> Self {
        ApiRequest::Player {
            code: code.to_string(),
        }
    }

    pub fn games(code: &str, game_type: GameType, limit: usize) -> Self {
        ApiRequest::Games {
            code: code.to_string(),
            game_type,
            limit,
        }
    }

    /// Query part understood by the upstream API.
    pub fn api_path(&self) -> String {
        match self {
            ApiRequest::Player { code } => format!("v2/players/code/{code}"),
            ApiRequest::Games {
                code,
                game_type,
                limit,
            } => format!("v2/games/{game_type}/player/{code}/limit/{limit}"),
        }
    }

    /// URL to send through `endpoint`. Direct endpoints take the API path as
    /// their query; relays get the full upstream URL percent-encoded.
    pub fn url_for(&self, endpoint: &Endpoint, api_base: &str) -> String {
        match endpoint.kind {
            EndpointKind::Direct => format!("{}?{}", endpoint.base, self.api_path()),
            EndpointKind::Relay => {
                let target = format!("{}?{}", api_base, self.api_path());
                let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
                format!("{}{}", endpoint.base, encoded)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GamesPayload {
    #[serde(default)]
    games: Option<Vec<GameRecord>>,
}

/// Player payload: a JSON object with at least `full_name`.
pub fn decode_player(body: &str, code: &str) -> Result<PlayerRecord, FetchError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    match &value {
        Value::Object(map) if map.contains_key("full_name") => {}
        _ => {
            return Err(FetchError::Decode(format!(
                "player payload for {code} has no full_name"
            )))
        }
    }
    let mut record: PlayerRecord =
        serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))?;
    record.code = code.to_string();
    Ok(record)
}

/// Game-list payload `{ "games": [...] }`; a missing `games` field is an empty list.
pub fn decode_games(body: &str) -> Result<GameList, FetchError> {
    let payload: GamesPayload =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(payload.games.unwrap_or_default())
}

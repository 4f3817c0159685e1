use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::TitleSepError;

/// A rated player as returned by the player lookup.
///
/// `code` is filled in by the fetcher; the remote payload does not always echo it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerRecord {
    #[serde(default)]
    pub code: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub full_name: String,
    /// Raw title field. Free text: may be empty, multi-valued ("IM/GM") or irregular.
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub standard_rating: Option<f64>,
}

impl PlayerRecord {
    /// Name used when rendering paths; falls back to the code.
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.code
        } else {
            &self.full_name
        }
    }
}

/// One game from a player's game list, seen from that player's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GameRecord {
    #[serde(
        default,
        rename = "opponent_ecf_code",
        deserialize_with = "lenient_string"
    )]
    pub opponent_code: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub opponent_name: String,
    /// Fallback identity when no code is recorded.
    #[serde(default, rename = "opponent_no", deserialize_with = "lenient_string")]
    pub opponent_number: String,
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub colour: String,
    #[serde(default, rename = "game_date", deserialize_with = "lenient_string")]
    pub date: String,
}

impl GameRecord {
    pub fn is_win(&self) -> bool {
        self.score == 1.0
    }

    /// Opponent identity: the rating code, else the stringified opponent number.
    /// Placeholder identities ("", "0", "undefined") yield `None`.
    pub fn opponent_identity(&self) -> Option<&str> {
        let code = self.opponent_code.trim();
        let id = if code.is_empty() {
            self.opponent_number.trim()
        } else {
            code
        };
        match id {
            "" | "0" | "undefined" | "null" => None,
            other => Some(other),
        }
    }
}

pub type GameList = Vec<GameRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GameType {
    Standard,
    Rapid,
    Blitz,
}

impl GameType {
    pub const ALL: [GameType; 3] = [GameType::Standard, GameType::Rapid, GameType::Blitz];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Standard => "Standard",
            GameType::Rapid => "Rapid",
            GameType::Blitz => "Blitz",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameType {
    type Err = TitleSepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(GameType::Standard),
            "rapid" => Ok(GameType::Rapid),
            "blitz" => Ok(GameType::Blitz),
            other => Err(TitleSepError::InvalidInput(format!(
                "unknown game type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub name: String,
    pub code: String,
}

impl PathStep {
    pub fn from_record(record: &PlayerRecord) -> Self {
        Self {
            name: record.display_name().to_string(),
            code: record.code.clone(),
        }
    }
}

pub type SearchPath = Vec<PathStep>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// An exact-title match was reached.
    Found,
    /// The frontier emptied within the depth bound.
    Exhausted,
    /// The query player could not be resolved on any endpoint.
    PlayerNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Separation distance, or -1 when no path exists within the depth bound.
    pub value: i32,
    pub path: SearchPath,
    pub status: SearchStatus,
}

impl SearchResult {
    pub fn found(value: i32, path: SearchPath) -> Self {
        Self {
            value,
            path,
            status: SearchStatus::Found,
        }
    }

    pub fn exhausted() -> Self {
        Self {
            value: -1,
            path: Vec::new(),
            status: SearchStatus::Exhausted,
        }
    }

    pub fn player_not_found() -> Self {
        Self {
            value: -1,
            path: Vec::new(),
            status: SearchStatus::PlayerNotFound,
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == SearchStatus::Found
    }

    /// Player names joined with arrows, e.g. `A → B → C`.
    pub fn render_path(&self) -> String {
        self.path
            .iter()
            .map(|step| step.name.as_str())
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

/// Normalise a user-supplied player code: trim, uppercase, and optionally drop
/// the trailing check letter (`120787J` -> `120787`).
pub fn normalize_player_code(raw: &str, strip_check_letter: bool) -> Option<String> {
    let mut code = raw.trim().to_ascii_uppercase();
    if strip_check_letter && code.len() > 1 && code.ends_with(|c: char| c.is_ascii_alphabetic())
    {
        code.pop();
    }
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_number(deserializer).map(|n| n.unwrap_or(0.0))
}

//! Chess.com public API data types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One game as served by a monthly archive. Every field is optional and
/// unknown fields are kept, so re-serializing gives back the whole object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGame {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pgn: Option<String>,
    #[serde(default)]
    pub time_control: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_by: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracies: Option<Accuracies>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fen: Option<String>,
    #[serde(default)]
    pub time_class: String,
    #[serde(default)]
    pub rules: String,
    #[serde(default)]
    pub white: RawPlayer,
    #[serde(default)]
    pub black: RawPlayer,
    /// Opening page URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eco: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tournament: Option<String>,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_url: Option<String>,
    /// Side to move, only present on games still in progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawGame {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPlayer {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Value>,
    #[serde(default)]
    pub result: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawPlayer {
    /// Rating as a number. Absent or non-numeric ratings give `None`.
    pub fn rating(&self) -> Option<i32> {
        match self.rating.as_ref()? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .and_then(|r| i32::try_from(r).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Accuracies {
    #[serde(default)]
    pub white: Option<f64>,
    #[serde(default)]
    pub black: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchivesResponse {
    #[serde(default)]
    pub archives: Vec<String>,
}

/// Monthly archive page. Games are kept as raw values so that one bad game
/// doesn't sink the whole month.
#[derive(Debug, Clone, Deserialize)]
pub struct GamesResponse {
    #[serde(default)]
    pub games: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerProfile {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Country resource URL, e.g. `https://api.chess.com/pub/country/US`
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub joined: Option<i64>,
    #[serde(default)]
    pub last_online: Option<i64>,
}

impl PlayerProfile {
    pub fn country_code(&self) -> Option<&str> {
        self.country
            .as_deref()
            .and_then(|c| c.trim_end_matches('/').rsplit('/').next())
            .filter(|c| !c.is_empty())
    }
}

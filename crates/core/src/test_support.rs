//! Game fixtures shared by the unit tests

use serde_json::json;

use crate::chesscom::RawGame;
use crate::config::Config;
use crate::games::{normalize, NormalizedGameRecord};

pub const ME: &str = "me_player";

/// Midnight UTC, 2024-03-01.
pub const MARCH_1: i64 = 1_709_251_200;
pub const DAY: i64 = 86_400;

pub fn config() -> Config {
    Config::new(ME).without_delay().without_enrichment()
}

/// A finished game between `ME` (White) and an opponent.
#[derive(Debug, Clone)]
pub struct GameBuilder {
    id: String,
    time_class: String,
    end_time: i64,
    my_rating: Option<i32>,
    opponent: String,
    opponent_rating: Option<i32>,
    my_result: String,
    opponent_result: String,
    length_secs: Option<u32>,
    movetext: String,
}

impl GameBuilder {
    pub fn new(id: u64, time_class: &str, end_time: i64) -> Self {
        Self {
            id: id.to_string(),
            time_class: time_class.to_string(),
            end_time,
            my_rating: Some(1500),
            opponent: "opponent".to_string(),
            opponent_rating: Some(1500),
            my_result: "win".to_string(),
            opponent_result: "resigned".to_string(),
            length_secs: None,
            movetext: "1. e4 e5 *".to_string(),
        }
    }

    pub fn opaque_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn rating(mut self, rating: Option<i32>) -> Self {
        self.my_rating = rating;
        self
    }

    pub fn opponent(mut self, name: &str, rating: Option<i32>) -> Self {
        self.opponent = name.to_string();
        self.opponent_rating = rating;
        self
    }

    pub fn lost(mut self) -> Self {
        self.my_result = "checkmated".to_string();
        self.opponent_result = "win".to_string();
        self
    }

    pub fn drawn(mut self) -> Self {
        self.my_result = "agreed".to_string();
        self.opponent_result = "agreed".to_string();
        self
    }

    pub fn length(mut self, secs: u32) -> Self {
        self.length_secs = Some(secs);
        self
    }

    pub fn movetext(mut self, movetext: &str) -> Self {
        self.movetext = movetext.to_string();
        self
    }

    pub fn raw(&self) -> RawGame {
        let mut pgn = format!("[Event \"Live Chess\"]\n[White \"{}\"]\n[Black \"{}\"]\n", ME, self.opponent);
        if let Some(secs) = self.length_secs {
            let end = 12 * 3600 + secs;
            pgn.push_str(&format!(
                "[StartTime \"12:00:00\"]\n[EndTime \"{}:{:02}:{:02}\"]\n",
                end / 3600,
                (end / 60) % 60,
                end % 60
            ));
        }
        pgn.push('\n');
        pgn.push_str(&self.movetext);

        let value = json!({
            "url": format!("https://www.chess.com/game/live/{}", self.id),
            "pgn": pgn,
            "time_control": "180",
            "end_time": self.end_time,
            "rated": true,
            "time_class": self.time_class,
            "rules": "chess",
            "white": {"username": ME, "rating": self.my_rating, "result": self.my_result},
            "black": {"username": self.opponent, "rating": self.opponent_rating, "result": self.opponent_result},
        });
        serde_json::from_value(value).expect("fixture game")
    }

    pub fn record(&self) -> NormalizedGameRecord {
        normalize(&self.raw(), &config())
    }
}

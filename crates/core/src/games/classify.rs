//! Classification of games into rating pools and time-control buckets

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rating-pool bucket of a game. Distinct from the raw time class: 960 games
/// and other variants get pools of their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Format {
    Bullet,
    Blitz,
    Rapid,
    Daily,
    Daily960,
    Live960,
    Other(String),
}

impl Format {
    /// The pools that take part in the daily view.
    pub const LIVE: [Format; 3] = [Format::Bullet, Format::Blitz, Format::Rapid];

    pub fn classify(rules: &str, time_class: &str) -> Self {
        let time_class = time_class.trim().to_ascii_lowercase();
        match rules.trim().to_ascii_lowercase().as_str() {
            "chess" => match time_class.as_str() {
                "daily" => Format::Daily,
                "bullet" => Format::Bullet,
                "blitz" => Format::Blitz,
                "rapid" => Format::Rapid,
                other => Format::Other(title_case(other)),
            },
            "chess960" => {
                if time_class == "daily" {
                    Format::Daily960
                } else {
                    Format::Live960
                }
            }
            other => Format::Other(title_case(other)),
        }
    }

    /// Reads back a label written by [`Format::as_str`].
    pub fn from_label(label: &str) -> Self {
        match label {
            "Bullet" => Format::Bullet,
            "Blitz" => Format::Blitz,
            "Rapid" => Format::Rapid,
            "Daily" => Format::Daily,
            "Daily 960" => Format::Daily960,
            "Live 960" => Format::Live960,
            other => Format::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Format::Bullet => "Bullet",
            Format::Blitz => "Blitz",
            Format::Rapid => "Rapid",
            Format::Daily => "Daily",
            Format::Daily960 => "Daily 960",
            Format::Live960 => "Live 960",
            Format::Other(name) => name,
        }
    }

    /// Bullet, Blitz or Rapid.
    pub fn is_live(&self) -> bool {
        matches!(self, Format::Bullet | Format::Blitz | Format::Rapid)
    }

    /// Index into [`Format::LIVE`].
    pub fn live_index(&self) -> Option<usize> {
        match self {
            Format::Bullet => Some(0),
            Format::Blitz => Some(1),
            Format::Rapid => Some(2),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hyphens and underscores become spaces, each word gets a capital first
/// letter.
pub fn title_case(raw: &str) -> String {
    raw.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Bucketing by base time alone, independent of [`Format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeControlCategory {
    Bullet,
    Blitz,
    Rapid,
    Classical,
    Daily,
}

impl TimeControlCategory {
    pub fn from_base_seconds(base: u32) -> Self {
        match base {
            b if b < 180 => TimeControlCategory::Bullet,
            b if b < 600 => TimeControlCategory::Blitz,
            b if b < 1800 => TimeControlCategory::Rapid,
            _ => TimeControlCategory::Classical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeControlCategory::Bullet => "Bullet",
            TimeControlCategory::Blitz => "Blitz",
            TimeControlCategory::Rapid => "Rapid",
            TimeControlCategory::Classical => "Classical",
            TimeControlCategory::Daily => "Daily",
        }
    }
}

/// A parsed `seconds[+increment]` time control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeControl {
    pub base_seconds: Option<u32>,
    pub increment: Option<u32>,
    pub category: Option<TimeControlCategory>,
}

impl TimeControl {
    /// `"180+2"` → 180 s + 2 s. Daily controls such as `"1/86400"` count days
    /// per move, so they only yield the Daily category.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.contains('/') {
            return TimeControl {
                category: Some(TimeControlCategory::Daily),
                ..Default::default()
            };
        }

        let (base, increment) = match raw.split_once('+') {
            Some((base, increment)) => (base, Some(increment)),
            None => (raw, None),
        };
        let Ok(base_seconds) = base.trim().parse::<u32>() else {
            return TimeControl::default();
        };
        let increment = match increment {
            Some(inc) => inc.trim().parse::<u32>().ok(),
            None => Some(0),
        };

        TimeControl {
            base_seconds: Some(base_seconds),
            increment,
            category: Some(TimeControlCategory::from_base_seconds(base_seconds)),
        }
    }
}

/// `H:MM:SS` or `H:MM:SS.f` to seconds.
pub fn parse_clock_seconds(clock: &str) -> Option<f64> {
    let mut parts = clock.trim().split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + seconds)
}

/// Wall-clock length of a live game in minutes, one decimal, from the PGN
/// `StartTime`/`EndTime` headers. An end before the start means the game ran
/// past midnight. Other formats and unreadable headers give zero.
pub fn game_length_minutes(format: &Format, start: &str, end: &str) -> f64 {
    if !format.is_live() {
        return 0.0;
    }
    let (Some(start), Some(end)) = (parse_clock_seconds(start), parse_clock_seconds(end)) else {
        return 0.0;
    };
    let mut elapsed = end - start;
    if elapsed < 0.0 {
        elapsed += 86_400.0;
    }
    round_to_tenth(elapsed / 60.0)
}

pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Outcome from my side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameResult {
    Win,
    Loss,
    Draw,
}

impl GameResult {
    /// From the platform result codes (`win`, `checkmated`, `agreed`, ...).
    pub fn from_codes(mine: &str, theirs: &str) -> Self {
        if mine.eq_ignore_ascii_case("win") {
            GameResult::Win
        } else if theirs.eq_ignore_ascii_case("win") {
            GameResult::Loss
        } else {
            GameResult::Draw
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameResult::Win => "Win",
            GameResult::Loss => "Loss",
            GameResult::Draw => "Draw",
        }
    }
}

//! Flattening of raw games into one analytics row per game

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use shakmaty::Color;
use tracing::debug;

use super::classify::{
    game_length_minutes, round_to_tenth, Format, GameResult, TimeControl, TimeControlCategory,
};
use crate::chesscom::{RawGame, RawPlayer};
use crate::config::Config;
use crate::parser::{parse_pgn, PgnHeaders, PlyMap, PromotedTag};

pub const GAME_ID_COLUMN: &str = "Game ID";
pub const RATING_CHANGE_COLUMN: &str = "Rating Change";
pub const RAW_JSON_COLUMN: &str = "Raw JSON";

const LEADING_COLUMNS: &[&str] = &[
    GAME_ID_COLUMN,
    "URL",
    "Start Time",
    "End Time",
    "Date",
    "Rated",
    "Rules",
    "Time Class",
    "Format",
    "Time Control",
    "Base Time (s)",
    "Increment (s)",
    "Time Control Category",
    "My Username",
    "My Color",
    "My Rating",
    "My Result",
    "My Accuracy",
    "Opponent Username",
    "Opponent Rating",
    "Opponent Result",
    "Opponent Accuracy",
    "Result",
    RATING_CHANGE_COLUMN,
    "ECO",
    "Opening",
    "Variation",
    "Moves",
    "Game Length (min)",
    "Tournament",
    "Match",
    "FEN",
];

const TRAILING_COLUMNS: &[&str] = &["Other Headers", "Move Data", RAW_JSON_COLUMN];

/// Header row of the Games table.
pub fn game_columns() -> Vec<String> {
    LEADING_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(PromotedTag::ALL.iter().map(|t| format!("PGN {}", t.as_str())))
        .chain(TRAILING_COLUMNS.iter().map(|c| c.to_string()))
        .collect()
}

/// One player as seen in a game.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerSide {
    pub username: String,
    pub rating: Option<i32>,
    pub result_code: String,
    /// Percent, one decimal
    pub accuracy: Option<f64>,
}

impl PlayerSide {
    fn from_raw(player: &RawPlayer, accuracy: Option<f64>) -> Self {
        Self {
            username: player.username.clone(),
            rating: player.rating(),
            result_code: player.result.clone(),
            accuracy: accuracy.filter(|a| a.is_finite()).map(round_to_tenth),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedGameRecord {
    /// Numeric id from the game URL, or the URL itself when it has none
    pub game_id: String,
    pub url: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub rated: Option<bool>,
    pub rules: String,
    pub time_class: String,
    pub format: Format,
    pub time_control: String,
    pub base_seconds: Option<u32>,
    pub increment: Option<u32>,
    pub time_control_category: Option<TimeControlCategory>,
    pub my_color: Color,
    pub me: PlayerSide,
    pub opponent: PlayerSide,
    pub result: GameResult,
    pub eco: String,
    pub opening: String,
    pub variation: String,
    pub move_count: u32,
    pub game_length_minutes: f64,
    pub tournament_url: Option<String>,
    pub match_url: Option<String>,
    pub fen: Option<String>,
    pub headers: PgnHeaders,
    pub plies: PlyMap,
    pub raw_json: String,
    /// Filled in by the rating annotator
    pub rating_change: Option<i32>,
}

impl NormalizedGameRecord {
    /// Numeric game id used for ordering; `None` for opaque ids.
    pub fn numeric_id(&self) -> Option<u64> {
        self.game_id.parse().ok()
    }

    pub fn end_date(&self, tz: Tz) -> Option<NaiveDate> {
        self.end_time.map(|t| t.with_timezone(&tz).date_naive())
    }

    pub fn to_row(&self, tz: Tz) -> Vec<String> {
        let time = |t: Option<DateTime<Utc>>| {
            t.map(|t| t.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default()
        };
        let num = |v: Option<u32>| v.map(|v| v.to_string()).unwrap_or_default();
        let rating = |v: Option<i32>| v.map(|v| v.to_string()).unwrap_or_default();
        let pct = |v: Option<f64>| v.map(|v| format!("{:.1}", v)).unwrap_or_default();

        let mut row = vec![
            self.game_id.clone(),
            self.url.clone(),
            time(self.start_time),
            time(self.end_time),
            self.end_date(tz).map(|d| d.to_string()).unwrap_or_default(),
            self.rated.map(|r| r.to_string()).unwrap_or_default(),
            self.rules.clone(),
            self.time_class.clone(),
            self.format.to_string(),
            self.time_control.clone(),
            num(self.base_seconds),
            num(self.increment),
            self.time_control_category
                .map(|c| c.as_str().to_string())
                .unwrap_or_default(),
            self.me.username.clone(),
            color_name(self.my_color).to_string(),
            rating(self.me.rating),
            self.me.result_code.clone(),
            pct(self.me.accuracy),
            self.opponent.username.clone(),
            rating(self.opponent.rating),
            self.opponent.result_code.clone(),
            pct(self.opponent.accuracy),
            self.result.as_str().to_string(),
            rating(self.rating_change),
            self.eco.clone(),
            self.opening.clone(),
            self.variation.clone(),
            self.move_count.to_string(),
            format!("{:.1}", self.game_length_minutes),
            self.tournament_url.clone().unwrap_or_default(),
            self.match_url.clone().unwrap_or_default(),
            self.fen.clone().unwrap_or_default(),
        ];
        row.extend(
            PromotedTag::ALL
                .iter()
                .map(|tag| self.headers.get(*tag).to_string()),
        );
        row.push(self.headers.other_headers());
        row.push(self.plies.to_json());
        row.push(self.raw_json.clone());
        row
    }

    /// Rebuilds a record from a stored Games row by normalizing its raw JSON
    /// again and restoring the stored rating change.
    pub fn from_row(columns: &[String], row: &[String], config: &Config) -> Option<Self> {
        let cell = |name: &str| {
            columns
                .iter()
                .position(|c| c == name)
                .and_then(|i| row.get(i))
                .map(String::as_str)
        };

        let raw: RawGame = serde_json::from_str(cell(RAW_JSON_COLUMN)?).ok()?;
        let mut record = normalize(&raw, config);
        record.rating_change = cell(RATING_CHANGE_COLUMN).and_then(|c| c.trim().parse().ok());
        Some(record)
    }
}

pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "White",
        Color::Black => "Black",
    }
}

/// Trailing numeric path segment of a game URL. Handles `/game/live/<id>`,
/// `/game/daily/<id>` and the older `/game/<id>`.
pub fn extract_game_id(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?.trim_end_matches('/');
    let last = path.rsplit('/').next()?;
    if last.is_empty() || !last.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(last.to_string())
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
}

/// `UTCDate` + `UTCTime` headers, used when the source has no start epoch.
fn header_start_time(headers: &PgnHeaders) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(headers.get(PromotedTag::UtcDate), "%Y.%m.%d").ok()?;
    let time = NaiveTime::parse_from_str(headers.get(PromotedTag::UtcTime), "%H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

/// `https://www.chess.com/openings/Kings-Pawn-Opening` → `Kings Pawn Opening`.
fn opening_from_url(url: &str) -> Option<String> {
    let slug = url.trim_end_matches('/').rsplit('/').next()?;
    let name = slug.replace('-', " ");
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Flattens one raw game from the perspective of `config.username`.
pub fn normalize(raw: &RawGame, config: &Config) -> NormalizedGameRecord {
    let pgn = parse_pgn(raw.pgn.as_deref());
    let headers = pgn.headers;

    let my_color = if raw.black.username.eq_ignore_ascii_case(&config.username) {
        Color::Black
    } else {
        if !raw.white.username.eq_ignore_ascii_case(&config.username) {
            debug!("{} is not a player in {}, treating as White", config.username, raw.url);
        }
        Color::White
    };

    let accuracies = raw.accuracies.unwrap_or_default();
    let white = PlayerSide::from_raw(&raw.white, accuracies.white);
    let black = PlayerSide::from_raw(&raw.black, accuracies.black);
    let (me, opponent) = match my_color {
        Color::White => (white, black),
        Color::Black => (black, white),
    };
    let result = GameResult::from_codes(&me.result_code, &opponent.result_code);

    let format = Format::classify(&raw.rules, &raw.time_class);
    let time_control = TimeControl::parse(&raw.time_control);
    let game_length = game_length_minutes(
        &format,
        headers.get(PromotedTag::StartTime),
        headers.get(PromotedTag::EndTime),
    );

    let opening = match headers.get(PromotedTag::Opening) {
        "" => headers
            .other("ECOUrl")
            .or(raw.eco.as_deref())
            .and_then(opening_from_url)
            .unwrap_or_default(),
        name => name.to_string(),
    };

    NormalizedGameRecord {
        game_id: extract_game_id(&raw.url).unwrap_or_else(|| raw.url.clone()),
        url: raw.url.clone(),
        start_time: timestamp(raw.start_time).or_else(|| header_start_time(&headers)),
        end_time: timestamp(raw.end_time),
        rated: raw.rated,
        rules: raw.rules.clone(),
        time_class: raw.time_class.clone(),
        format,
        time_control: raw.time_control.clone(),
        base_seconds: time_control.base_seconds,
        increment: time_control.increment,
        time_control_category: time_control.category,
        my_color,
        me,
        opponent,
        result,
        eco: headers.get(PromotedTag::Eco).to_string(),
        opening,
        variation: headers.get(PromotedTag::Variation).to_string(),
        move_count: pgn.plies.max_move_number(),
        game_length_minutes: game_length,
        tournament_url: raw.tournament.clone(),
        match_url: raw.match_url.clone(),
        fen: raw.fen.clone(),
        headers,
        plies: pgn.plies,
        raw_json: raw.to_json(),
        rating_change: None,
    }
}

//! Movetext parsing into a sparse, ply-indexed map
//!
//! The movetext is tokenized first and then consumed in a single pass.
//! Variations are skipped with a depth counter, so nested variations are
//! dropped as a whole. Comments are only read for an embedded `[%clk ...]`
//! annotation. Parsing never fails: anything it can't make sense of is left
//! out of the map.

use serde_json::{Map, Value};
use shakmaty::san::SanPlus;
use shakmaty::Color;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Position of one half-move: move number and the side that played it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlyKey {
    pub move_number: u32,
    pub side: Color,
}

impl PlyKey {
    pub fn new(move_number: u32, side: Color) -> Self {
        Self { move_number, side }
    }

    /// Column label such as `12w` or `12b`.
    pub fn label(&self) -> String {
        let suffix = match self.side {
            Color::White => 'w',
            Color::Black => 'b',
        };
        format!("{}{}", self.move_number, suffix)
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let side = match label.chars().last()? {
            'w' => Color::White,
            'b' => Color::Black,
            _ => return None,
        };
        let move_number = label[..label.len() - 1].parse().ok()?;
        Some(Self::new(move_number, side))
    }

    fn side_rank(&self) -> u8 {
        match self.side {
            Color::White => 0,
            Color::Black => 1,
        }
    }
}

impl Ord for PlyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.move_number
            .cmp(&other.move_number)
            .then(self.side_rank().cmp(&other.side_rank()))
    }
}

impl PartialOrd for PlyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyRecord {
    pub san: String,
    pub clock: Option<String>,
}

impl PlyRecord {
    pub fn clock_str(&self) -> &str {
        self.clock.as_deref().unwrap_or("")
    }
}

/// Plies of one game keyed by move number and side. Sparse: absent plies
/// have no entry at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlyMap(BTreeMap<PlyKey, PlyRecord>);

impl PlyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, move_number: u32, side: Color) -> Option<&PlyRecord> {
        self.0.get(&PlyKey::new(move_number, side))
    }

    /// Inserts a ply unless that slot is already taken. Returns whether the
    /// ply was stored.
    pub fn insert_vacant(&mut self, key: PlyKey, record: PlyRecord) -> bool {
        if self.0.contains_key(&key) {
            return false;
        }
        self.0.insert(key, record);
        true
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn max_move_number(&self) -> u32 {
        self.0.keys().next_back().map(|k| k.move_number).unwrap_or(0)
    }

    /// `{"1w": ["e4", "0:03:00"], ...}`, with an empty string for a missing
    /// clock.
    pub fn to_json(&self) -> String {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(key, ply)| {
                (
                    key.label(),
                    Value::Array(vec![
                        Value::String(ply.san.clone()),
                        Value::String(ply.clock_str().to_string()),
                    ]),
                )
            })
            .collect();
        Value::Object(map).to_string()
    }

    /// Inverse of [`PlyMap::to_json`]. Unreadable entries are skipped.
    pub fn from_json(json: &str) -> Self {
        let mut plies = PlyMap::new();
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(json) else {
            return plies;
        };
        for (label, value) in map {
            let Some(key) = PlyKey::from_label(&label) else {
                continue;
            };
            let Some(san) = value.get(0).and_then(Value::as_str) else {
                continue;
            };
            let clock = value
                .get(1)
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(String::from);
            plies.insert_vacant(
                key,
                PlyRecord {
                    san: san.to_string(),
                    clock,
                },
            );
        }
        plies
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    /// `12.` or `12...`
    MoveNumber { number: u32, black: bool },
    San(&'a str),
    Comment(&'a str),
    VariationStart,
    VariationEnd,
    Nag,
    Result,
    /// Anything else, including bare `.` / `...`.
    Junk,
}

const RESULTS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '{' | '}' | '(' | ')' | ';' | '$')
}

struct Tokenizer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    /// Consumes up to (not including) the first char matching `stop`.
    fn take_until(&mut self, stop: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(stop).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn word(&mut self, word: &'a str) -> Token<'a> {
        if RESULTS.contains(&word) {
            return Token::Result;
        }

        let digits = word.len() - word.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits > 0 {
            let after_digits = &word[digits..];
            let dots = after_digits.len() - after_digits.trim_start_matches('.').len();
            if dots > 0 {
                // `12...Qd7` without a space: hand the SAN part back.
                self.pos -= after_digits.len() - dots;
                return match word[..digits].parse() {
                    Ok(number) => Token::MoveNumber {
                        number,
                        black: dots >= 3,
                    },
                    Err(_) => Token::Junk,
                };
            }
        }

        if word.trim_start_matches('.').is_empty() {
            return Token::Junk;
        }
        Token::San(word)
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        self.take_until(|c| !c.is_whitespace());
        let c = self.rest().chars().next()?;

        let token = match c {
            '{' => {
                self.pos += 1;
                let body = self.take_until(|c| c == '}');
                if !self.rest().is_empty() {
                    self.pos += 1;
                }
                Token::Comment(body)
            }
            ';' => {
                self.pos += 1;
                Token::Comment(self.take_until(|c| c == '\n'))
            }
            '(' => {
                self.pos += 1;
                Token::VariationStart
            }
            ')' => {
                self.pos += 1;
                Token::VariationEnd
            }
            '$' => {
                self.pos += 1;
                self.take_until(|c| !c.is_ascii_digit());
                Token::Nag
            }
            '}' => {
                self.pos += 1;
                Token::Junk
            }
            _ => {
                let word = self.take_until(is_delimiter);
                self.word(word)
            }
        };
        Some(token)
    }
}

/// Pulls `H:MM:SS` or `H:MM:SS.F` out of a `[%clk ...]` comment command.
pub fn extract_clock(comment: &str) -> Option<String> {
    let start = comment.find("[%clk")? + "[%clk".len();
    let rest = &comment[start..];
    let end = rest.find(']')?;
    let clock = rest[..end].trim();

    let mut parts = clock.split(':');
    let (hours, minutes, seconds) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let (whole, fraction) = match seconds.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (seconds, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(hours) || !all_digits(minutes) || !all_digits(whole) {
        return None;
    }
    if fraction.is_some_and(|f| !all_digits(f)) {
        return None;
    }
    Some(clock.to_string())
}

/// Highest move number a group may open. Larger numbers are malformed.
pub const MAX_MOVE_NUMBER: u32 = 1000;

/// Strips trailing `!`/`?` annotations, spells zero-castling with letters
/// and checks what's left is SAN.
fn clean_san(token: &str) -> Option<String> {
    let san = token.trim_end_matches(['!', '?']);
    let san = if san.starts_with("0-0") {
        san.replace('0', "O")
    } else {
        san.to_string()
    };
    san.parse::<SanPlus>().ok().map(|_| san)
}

/// Parses movetext into a ply map.
///
/// A white move number opens a group of up to two plies (white then black);
/// a `N...` number opens a black-only group. A ply slot is filled once and
/// never overwritten, so whichever group reaches a slot first in the text
/// keeps it.
pub fn parse_movetext(movetext: &str) -> PlyMap {
    let mut plies = PlyMap::new();
    let mut depth = 0u32;
    let mut expected: Option<PlyKey> = None;
    let mut last: Option<PlyKey> = None;

    for token in Tokenizer::new(movetext) {
        match token {
            Token::VariationStart => depth += 1,
            Token::VariationEnd => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            Token::MoveNumber { number, black } => {
                let side = if black { Color::Black } else { Color::White };
                expected = (1..=MAX_MOVE_NUMBER)
                    .contains(&number)
                    .then(|| PlyKey::new(number, side));
                last = None;
            }
            Token::San(word) => {
                let Some(key) = expected.take() else {
                    last = None;
                    continue;
                };
                if key.side == Color::White {
                    expected = Some(PlyKey::new(key.move_number, Color::Black));
                }
                last = None;
                if let Some(san) = clean_san(word) {
                    let record = PlyRecord { san, clock: None };
                    if plies.insert_vacant(key, record) {
                        last = Some(key);
                    }
                }
            }
            Token::Comment(text) => {
                if let (Some(key), Some(clock)) = (last, extract_clock(text)) {
                    if let Some(ply) = plies.0.get_mut(&key) {
                        ply.clock.get_or_insert(clock);
                    }
                }
            }
            Token::Nag | Token::Result | Token::Junk => {}
        }
    }

    plies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ply(plies: &PlyMap, n: u32, side: Color) -> Option<(String, String)> {
        plies
            .get(n, side)
            .map(|p| (p.san.clone(), p.clock_str().to_string()))
    }

    fn pair(san: &str, clock: &str) -> Option<(String, String)> {
        Some((san.to_string(), clock.to_string()))
    }

    #[test]
    fn test_moves_with_clocks() {
        let plies = parse_movetext("1. e4 {[%clk 0:03:00]} e5 {[%clk 0:02:59]} 2. Nf3");
        assert_eq!(plies.len(), 3);
        assert_eq!(ply(&plies, 1, Color::White), pair("e4", "0:03:00"));
        assert_eq!(ply(&plies, 1, Color::Black), pair("e5", "0:02:59"));
        assert_eq!(ply(&plies, 2, Color::White), pair("Nf3", ""));
    }

    #[test]
    fn test_black_only_continuation() {
        let plies = parse_movetext("12... Qd7 {[%clk 0:01:10]}");
        assert_eq!(plies.len(), 1);
        assert_eq!(ply(&plies, 12, Color::Black), pair("Qd7", "0:01:10"));
    }

    #[test]
    fn test_first_group_to_reach_a_slot_wins() {
        let plies = parse_movetext("12... Qd7 {[%clk 0:01:10]} 12. Nf3 Qe7 13. a3");
        assert_eq!(ply(&plies, 12, Color::Black), pair("Qd7", "0:01:10"));
        assert_eq!(ply(&plies, 12, Color::White), pair("Nf3", ""));
        assert_eq!(ply(&plies, 13, Color::White), pair("a3", ""));
    }

    #[test]
    fn test_platform_style_repeated_numbers() {
        let text = "1. d4 {[%clk 0:09:58.3]} 1... Nf6 {[%clk 0:09:57.1]} 2. c4 {[%clk 0:09:50]} 2... e6 0-1";
        let plies = parse_movetext(text);
        assert_eq!(plies.len(), 4);
        assert_eq!(ply(&plies, 1, Color::White), pair("d4", "0:09:58.3"));
        assert_eq!(ply(&plies, 1, Color::Black), pair("Nf6", "0:09:57.1"));
        assert_eq!(ply(&plies, 2, Color::Black), pair("e6", ""));
    }

    #[test]
    fn test_variations_are_stripped_including_nested() {
        let text = "1. e4 (1. d4 d5 (1... Nf6 2. c4) 2. c4) 1... c5 (1... e5) 2. Nf3 *";
        let plies = parse_movetext(text);
        assert_eq!(plies.len(), 3);
        assert_eq!(ply(&plies, 1, Color::White), pair("e4", ""));
        assert_eq!(ply(&plies, 1, Color::Black), pair("c5", ""));
        assert_eq!(ply(&plies, 2, Color::White), pair("Nf3", ""));
    }

    #[test]
    fn test_nags_and_suffix_annotations() {
        let plies = parse_movetext("1. e4 $1 e5?! 2. Qh5!! $18 Nc6 3. Bc4 Nf6?? 4. Qxf7# 1-0");
        assert_eq!(ply(&plies, 1, Color::Black), pair("e5", ""));
        assert_eq!(ply(&plies, 2, Color::White), pair("Qh5", ""));
        assert_eq!(ply(&plies, 3, Color::Black), pair("Nf6", ""));
        assert_eq!(ply(&plies, 4, Color::White), pair("Qxf7#", ""));
        assert_eq!(plies.max_move_number(), 4);
    }

    #[test]
    fn test_plain_comments_are_discarded() {
        let plies = parse_movetext("1. e4 {best by test} e5 ; a rest-of-line comment\n2. Nf3");
        assert_eq!(ply(&plies, 1, Color::White), pair("e4", ""));
        assert_eq!(ply(&plies, 1, Color::Black), pair("e5", ""));
        assert_eq!(ply(&plies, 2, Color::White), pair("Nf3", ""));
    }

    #[test]
    fn test_clock_inside_a_longer_comment() {
        let plies = parse_movetext("1. e4 {[%clk 0:02:59.9] [%eval 0.3]}");
        assert_eq!(ply(&plies, 1, Color::White), pair("e4", "0:02:59.9"));
    }

    #[test]
    fn test_lone_dots_are_not_moves() {
        let plies = parse_movetext("5 . ... 5. . Nf3 ...");
        assert_eq!(plies.len(), 1);
        assert_eq!(ply(&plies, 5, Color::White), pair("Nf3", ""));
    }

    #[test]
    fn test_number_glued_to_move() {
        let plies = parse_movetext("7.Bb5 7...a6");
        assert_eq!(ply(&plies, 7, Color::White), pair("Bb5", ""));
        assert_eq!(ply(&plies, 7, Color::Black), pair("a6", ""));
    }

    #[test]
    fn test_malformed_input_is_partial_not_fatal() {
        let plies = parse_movetext("{unterminated 1. e4 e5");
        assert!(plies.is_empty());

        let plies = parse_movetext("1. e4 e5 2. Nf3 ) ) 2... Nc6 3. Bb5 {[%clk garbage]}");
        assert_eq!(ply(&plies, 2, Color::Black), pair("Nc6", ""));
        assert_eq!(ply(&plies, 3, Color::White), pair("Bb5", ""));

        assert!(parse_movetext("").is_empty());
        assert!(parse_movetext("1-0").is_empty());
    }

    #[test]
    fn test_moves_without_numbers_are_ignored() {
        let plies = parse_movetext("e4 e5 3. Nf3 Nc6 Bb5");
        assert_eq!(plies.len(), 2);
        assert_eq!(ply(&plies, 3, Color::White), pair("Nf3", ""));
        assert_eq!(ply(&plies, 3, Color::Black), pair("Nc6", ""));
    }

    #[test]
    fn test_extract_clock() {
        assert_eq!(extract_clock("[%clk 1:02:03]").as_deref(), Some("1:02:03"));
        assert_eq!(extract_clock("[%clk 0:00:09.7]").as_deref(), Some("0:00:09.7"));
        assert_eq!(extract_clock("[%clk 12:00]"), None);
        assert_eq!(extract_clock("[%clk a:bc:de]"), None);
        assert_eq!(extract_clock("no clock here"), None);
    }

    #[test]
    fn test_json_round_trip() {
        let plies = parse_movetext("1. e4 {[%clk 0:03:00]} e5 2. Nf3");
        let json = plies.to_json();
        assert_eq!(PlyMap::from_json(&json), plies);
        assert!(PlyMap::from_json("not json").is_empty());
    }

    #[test]
    fn test_ply_key_order_and_labels() {
        let white = PlyKey::new(10, Color::White);
        let black = PlyKey::new(9, Color::Black);
        assert!(black < white);
        assert!(PlyKey::new(9, Color::White) < black);
        assert_eq!(white.label(), "10w");
        assert_eq!(PlyKey::from_label("9b"), Some(black));
        assert_eq!(PlyKey::from_label("b"), None);
        assert_eq!(PlyKey::from_label("9x"), None);
    }

    #[test]
    fn test_zero_castling_is_kept() {
        let plies = parse_movetext("1. O-O 0-0 2. 0-0-0+ {[%clk 0:01:00]} e4");
        assert_eq!(plies.len(), 4);
        assert_eq!(ply(&plies, 1, Color::White), pair("O-O", ""));
        assert_eq!(ply(&plies, 1, Color::Black), pair("O-O", ""));
        assert_eq!(ply(&plies, 2, Color::White), pair("O-O-O+", "0:01:00"));
        assert_eq!(ply(&plies, 2, Color::Black), pair("e4", ""));
    }

    #[test]
    fn test_oversized_move_number_opens_no_group() {
        let plies = parse_movetext("1. e4 e5 1000000. Nf3 Nc6 2. d4");
        assert_eq!(plies.len(), 3);
        assert_eq!(plies.max_move_number(), 2);
        assert_eq!(ply(&plies, 2, Color::White), pair("d4", ""));

        let edge = parse_movetext("1000. Kg1 1001. Kh1");
        assert_eq!(edge.max_move_number(), MAX_MOVE_NUMBER);
        assert_eq!(edge.len(), 1);
    }
}

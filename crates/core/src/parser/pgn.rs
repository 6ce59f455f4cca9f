//! PGN header parsing

use pgn_reader::{RawTag, Visitor};
use std::collections::HashMap;
use std::io::Cursor;
use std::ops::ControlFlow;
use tracing::debug;

use super::movetext::{parse_movetext, PlyMap};

/// Header tags that get their own column. Everything else lands in the
/// "other headers" string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromotedTag {
    Event,
    Site,
    Date,
    Round,
    White,
    Black,
    Result,
    WhiteElo,
    BlackElo,
    TimeControl,
    Termination,
    StartTime,
    EndTime,
    Link,
    CurrentPosition,
    Timezone,
    Eco,
    Opening,
    Variation,
    UtcDate,
    UtcTime,
    WhiteTitle,
    BlackTitle,
    WhiteTeam,
    BlackTeam,
}

impl PromotedTag {
    pub const ALL: [PromotedTag; 25] = [
        PromotedTag::Event,
        PromotedTag::Site,
        PromotedTag::Date,
        PromotedTag::Round,
        PromotedTag::White,
        PromotedTag::Black,
        PromotedTag::Result,
        PromotedTag::WhiteElo,
        PromotedTag::BlackElo,
        PromotedTag::TimeControl,
        PromotedTag::Termination,
        PromotedTag::StartTime,
        PromotedTag::EndTime,
        PromotedTag::Link,
        PromotedTag::CurrentPosition,
        PromotedTag::Timezone,
        PromotedTag::Eco,
        PromotedTag::Opening,
        PromotedTag::Variation,
        PromotedTag::UtcDate,
        PromotedTag::UtcTime,
        PromotedTag::WhiteTitle,
        PromotedTag::BlackTitle,
        PromotedTag::WhiteTeam,
        PromotedTag::BlackTeam,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromotedTag::Event => "Event",
            PromotedTag::Site => "Site",
            PromotedTag::Date => "Date",
            PromotedTag::Round => "Round",
            PromotedTag::White => "White",
            PromotedTag::Black => "Black",
            PromotedTag::Result => "Result",
            PromotedTag::WhiteElo => "WhiteElo",
            PromotedTag::BlackElo => "BlackElo",
            PromotedTag::TimeControl => "TimeControl",
            PromotedTag::Termination => "Termination",
            PromotedTag::StartTime => "StartTime",
            PromotedTag::EndTime => "EndTime",
            PromotedTag::Link => "Link",
            PromotedTag::CurrentPosition => "CurrentPosition",
            PromotedTag::Timezone => "Timezone",
            PromotedTag::Eco => "ECO",
            PromotedTag::Opening => "Opening",
            PromotedTag::Variation => "Variation",
            PromotedTag::UtcDate => "UTCDate",
            PromotedTag::UtcTime => "UTCTime",
            PromotedTag::WhiteTitle => "WhiteTitle",
            PromotedTag::BlackTitle => "BlackTitle",
            PromotedTag::WhiteTeam => "WhiteTeam",
            PromotedTag::BlackTeam => "BlackTeam",
        }
    }

    /// Case-insensitive lookup of a tag name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(name))
    }
}

/// Header tag pairs of one game. Duplicate tags keep the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PgnHeaders {
    promoted: HashMap<PromotedTag, String>,
    other: Vec<(String, String)>,
}

impl PgnHeaders {
    /// Value of a promoted tag, empty when the tag was absent.
    pub fn get(&self, tag: PromotedTag) -> &str {
        self.promoted.get(&tag).map(String::as_str).unwrap_or("")
    }

    /// Value of a non-promoted tag, looked up case-insensitively.
    pub fn other(&self, name: &str) -> Option<&str> {
        self.other
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Non-promoted tags as `Key: Value` pairs joined by `; `, in the order
    /// they were first seen.
    pub fn other_headers(&self) -> String {
        self.other
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn is_empty(&self) -> bool {
        self.promoted.is_empty() && self.other.is_empty()
    }

    fn insert(&mut self, name: &str, value: String) {
        if let Some(tag) = PromotedTag::from_name(name) {
            self.promoted.insert(tag, value);
            return;
        }
        match self.other.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = value,
            None => self.other.push((name.to_string(), value)),
        }
    }
}

/// A parsed game: its headers and the plies of its main line.
#[derive(Debug, Clone, Default)]
pub struct PgnGame {
    pub headers: PgnHeaders,
    pub plies: PlyMap,
}

impl PgnGame {
    /// Number of full moves reached, i.e. the highest move number with a ply.
    pub fn move_count(&self) -> u32 {
        self.plies.max_move_number()
    }
}

/// Parses a PGN blob. Missing or malformed input yields empty headers and
/// an empty ply map rather than an error.
pub fn parse_pgn(pgn: Option<&str>) -> PgnGame {
    let Some(pgn) = pgn else {
        return PgnGame::default();
    };
    let (headers, movetext) = split_pgn(pgn);
    PgnGame {
        headers,
        plies: parse_movetext(movetext),
    }
}

/// Splits a PGN blob at the first blank line into parsed headers and the raw
/// movetext. Without a blank line the whole blob is headers and the movetext
/// is empty.
pub fn split_pgn(pgn: &str) -> (PgnHeaders, &str) {
    let body = pgn.trim_start_matches(['\r', '\n', ' ', '\t']);

    let mut offset = 0;
    let mut split = None;
    for line in body.split_inclusive('\n') {
        if line.trim().is_empty() {
            split = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }

    match split {
        Some((header_end, movetext_start)) => (
            parse_headers(&body[..header_end]),
            body[movetext_start..].trim(),
        ),
        None => (parse_headers(body), ""),
    }
}

struct HeaderCollector;

impl Visitor for HeaderCollector {
    type Tags = PgnHeaders;
    type Movetext = PgnHeaders;
    type Output = PgnHeaders;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(PgnHeaders::default())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let name = String::from_utf8_lossy(name);
        tags.insert(name.trim(), value.decode_utf8_lossy().into_owned());
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Break(tags)
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        movetext
    }
}

/// Reads the tag pairs of a header block. Lines that do not open a tag are
/// dropped first, so stray text cannot end the tag section early.
fn parse_headers(block: &str) -> PgnHeaders {
    let tag_lines = block
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('['))
        .collect::<Vec<_>>()
        .join("\n");
    if tag_lines.is_empty() {
        return PgnHeaders::default();
    }

    let mut reader = pgn_reader::Reader::new(Cursor::new(tag_lines.as_bytes()));
    match reader.read_game(&mut HeaderCollector) {
        Ok(Some(headers)) => headers,
        Ok(None) => PgnHeaders::default(),
        Err(e) => {
            debug!("Unreadable PGN headers: {}", e);
            PgnHeaders::default()
        }
    }
}

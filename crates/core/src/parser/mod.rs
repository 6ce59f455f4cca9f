//! PGN parsing: header tag pairs and movetext plies

pub mod movetext;
pub mod pgn;

pub use movetext::{parse_movetext, PlyKey, PlyMap, PlyRecord};
pub use pgn::{parse_pgn, split_pgn, PgnGame, PgnHeaders, PromotedTag};

//! Chess History Core Library
//!
//! Turns a player's Chess.com game archives into flat analytics tables:
//! one row per game, dense move and clock matrices, day-by-day activity with
//! carried ratings, and per-opponent results.

pub mod chesscom;
pub mod config;
pub mod error;
pub mod games;
pub mod parser;
pub mod stats;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use chesscom::{ChessComClient, GameSource, ProfileLookup};
pub use config::Config;
pub use error::{Error, Result};
pub use games::{normalize, NormalizedGameRecord};
pub use parser::{parse_movetext, parse_pgn, PlyMap};
pub use storage::{Database, Table, TableSink};
pub use sync::{full_rebuild, incremental_update, run_sync, SyncMode, SyncReport};

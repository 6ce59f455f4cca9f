//! Chess.com public API: game archives and player profiles

mod client;
mod types;

pub use client::{ChessComClient, GameSource, ProfileLookup};
pub use types::*;

//! Game record normalization

pub mod classify;
pub mod record;

pub use classify::{Format, GameResult, TimeControl, TimeControlCategory};
pub use record::{extract_game_id, game_columns, normalize, NormalizedGameRecord, PlayerSide};

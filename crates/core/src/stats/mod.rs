//! Derived tables: rating deltas, daily activity, opponents, move matrices

pub mod daily;
pub mod moves;
pub mod opponents;
pub mod rating;

pub use daily::{build_daily, buckets_from_table, daily_table, rebuild_from, DailyBucket, Tally};
pub use moves::{build_move_tables, max_move_from_columns, ply_columns, MoveTables};
pub use opponents::{
    aggregate_opponents, apply_known_profiles, enrich_opponents, opponents_table,
    profiles_from_table, OpponentProfile, OpponentSummary,
};
pub use rating::{annotate_batch, chain_order, RatingLedger};

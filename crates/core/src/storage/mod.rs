//! SQLite-backed table sink

mod db;
mod models;

pub use db::{Database, TableSink};
pub use models::*;

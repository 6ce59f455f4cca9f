use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use chess_history_core::storage::SyncRecord;
use chess_history_core::sync::TABLE_NAMES;
use chess_history_core::{run_sync, Database, SyncMode, SyncReport, Table, TableSink};

use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize)]
pub struct SyncQuery {
    pub mode: Option<String>,
}

#[derive(Serialize)]
pub struct TableSummary {
    pub name: &'static str,
    pub rows: u32,
}

/// Matches `Opponent Summary`, `opponent-summary` and `opponent_summary` alike.
fn resolve_table(name: &str) -> Option<&'static str> {
    let key = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase()
    };
    let wanted = key(name);
    TABLE_NAMES.iter().copied().find(|t| key(t) == wanted)
}

pub async fn list_tables(State(state): State<Arc<AppState>>) -> Result<Json<Vec<TableSummary>>, ApiError> {
    let db = state.db.lock().await;
    let tables = TABLE_NAMES
        .iter()
        .map(|&name| -> Result<TableSummary, ApiError> {
            Ok(TableSummary {
                name,
                rows: db.count_rows(name)?,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;
    Ok(Json(tables))
}

pub async fn get_table(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Table>, ApiError> {
    let resolved = resolve_table(&name).ok_or_else(|| ApiError::NotFound(name.clone()))?;
    let db = state.db.lock().await;
    db.read_table(resolved)?
        .map(Json)
        .ok_or(ApiError::NotFound(name))
}

pub async fn last_sync(State(state): State<Arc<AppState>>) -> Result<Json<Option<SyncRecord>>, ApiError> {
    let db = state.db.lock().await;
    Ok(Json(db.last_sync(&state.config.username)?))
}

/// Runs a sync on its own connection, so table reads keep working meanwhile.
pub async fn sync_games(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SyncQuery>,
) -> Result<Json<SyncReport>, ApiError> {
    let mode = match params.mode.as_deref() {
        Some(mode) => mode.parse::<SyncMode>()?,
        None => SyncMode::Incremental,
    };
    let Ok(_running) = state.sync_lock.try_lock() else {
        return Err(ApiError::Busy);
    };

    info!("{} sync requested for {}", mode, state.config.username);
    let mut db = Database::open(&state.config.db_path)?;
    let report = run_sync(mode, &mut db, &state.client, &state.client, &state.config).await?;
    Ok(Json(report))
}

pub async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_resolve_loosely() {
        assert_eq!(resolve_table("Games"), Some("Games"));
        assert_eq!(resolve_table("moves-san"), Some("Moves-SAN"));
        assert_eq!(resolve_table("Moves_Clock"), Some("Moves-Clock"));
        assert_eq!(resolve_table("opponent summary"), Some("Opponent Summary"));
        assert_eq!(resolve_table("daily"), Some("Daily"));
        assert_eq!(resolve_table("sheet_rows"), None);
    }
}

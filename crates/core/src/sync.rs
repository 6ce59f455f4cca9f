//! Fetch, normalize and persist: full rebuild and incremental update
//!
//! Every write is keyed by game id, so a run that stops part way (after the
//! Games rows were written but before the derived tables were) is repaired by
//! the next incremental run instead of double counting.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::chesscom::{GameSource, ProfileLookup};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::games::record::GAME_ID_COLUMN;
use crate::games::{game_columns, normalize, NormalizedGameRecord};
use crate::stats::{
    aggregate_opponents, annotate_batch, apply_known_profiles, buckets_from_table, build_daily,
    build_move_tables, chain_order, daily_table, enrich_opponents, max_move_from_columns,
    opponents_table, profiles_from_table, rebuild_from, OpponentProfile, RatingLedger,
};
use crate::storage::{Table, TableSink};

pub const GAMES_TABLE: &str = "Games";
pub const MOVES_SAN_TABLE: &str = "Moves-SAN";
pub const MOVES_CLOCK_TABLE: &str = "Moves-Clock";
pub const DAILY_TABLE: &str = "Daily";
pub const OPPONENTS_TABLE: &str = "Opponent Summary";

pub const TABLE_NAMES: [&str; 5] = [
    GAMES_TABLE,
    MOVES_SAN_TABLE,
    MOVES_CLOCK_TABLE,
    DAILY_TABLE,
    OPPONENTS_TABLE,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Full,
    Incremental,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" | "rebuild" => Ok(SyncMode::Full),
            "incremental" | "update" => Ok(SyncMode::Incremental),
            other => Err(Error::Config(format!("unknown sync mode: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub archives_fetched: usize,
    pub archives_failed: usize,
    pub new_games: usize,
    pub total_games: usize,
    pub daily_rows: usize,
    pub opponents: usize,
    pub profiles_fetched: usize,
}

impl SyncReport {
    fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            archives_fetched: 0,
            archives_failed: 0,
            new_games: 0,
            total_games: 0,
            daily_rows: 0,
            opponents: 0,
            profiles_fetched: 0,
        }
    }
}

async fn pause(config: &Config) {
    if !config.request_delay.is_zero() {
        tokio::time::sleep(config.request_delay).await;
    }
}

fn newest_first(records: &mut [NormalizedGameRecord]) {
    records.sort_by(|a, b| b.end_time.cmp(&a.end_time).then(chain_order(b, a)));
}

fn games_table(records: &[NormalizedGameRecord], config: &Config) -> Table {
    Table {
        columns: game_columns(),
        rows: records.iter().map(|r| r.to_row(config.timezone)).collect(),
    }
}

/// Records of a stored Games table. Rows whose raw JSON can't be read back
/// are left out.
pub fn records_from_table(table: &Table, config: &Config) -> Vec<NormalizedGameRecord> {
    table
        .rows
        .iter()
        .filter_map(|row| {
            let record = NormalizedGameRecord::from_row(&table.columns, row, config);
            if record.is_none() {
                warn!("Skipping unreadable stored game {}", row.first().map(String::as_str).unwrap_or(""));
            }
            record
        })
        .collect()
}

/// Runs either kind of sync.
pub async fn run_sync<S, G, P>(
    mode: SyncMode,
    sink: &mut S,
    source: &G,
    profiles: &P,
    config: &Config,
) -> Result<SyncReport>
where
    S: TableSink + Send,
    G: GameSource + Sync + ?Sized,
    P: ProfileLookup + Sync + ?Sized,
{
    match mode {
        SyncMode::Full => full_rebuild(sink, source, profiles, config).await,
        SyncMode::Incremental => incremental_update(sink, source, profiles, config).await,
    }
}

/// Fetches every archive, oldest first, and replaces all tables.
pub async fn full_rebuild<S, G, P>(
    sink: &mut S,
    source: &G,
    profiles: &P,
    config: &Config,
) -> Result<SyncReport>
where
    S: TableSink + Send,
    G: GameSource + Sync + ?Sized,
    P: ProfileLookup + Sync + ?Sized,
{
    info!("Full rebuild for {}", config.username);
    let mut report = SyncReport::new(SyncMode::Full);

    let archives = source.archives(&config.username).await?;
    info!("Found {} monthly archives", archives.len());

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for (i, url) in archives.iter().enumerate() {
        if i > 0 {
            pause(config).await;
        }
        let games = match source.archive_games(url).await {
            Ok(games) => games,
            Err(e) => {
                warn!("Skipping archive {}: {}", url, e);
                report.archives_failed += 1;
                continue;
            }
        };
        report.archives_fetched += 1;
        debug!("{} games in {}", games.len(), url);

        for raw in &games {
            let record = normalize(raw, config);
            if seen.insert(record.game_id.clone()) {
                records.push(record);
            }
        }
    }

    annotate_batch(&mut records);
    newest_first(&mut records);
    report.new_games = records.len();
    report.total_games = records.len();

    sink.replace_table(GAMES_TABLE, &games_table(&records, config))?;

    let moves = build_move_tables(&records, 0);
    sink.replace_table(MOVES_SAN_TABLE, &moves.san)?;
    sink.replace_table(MOVES_CLOCK_TABLE, &moves.clock)?;

    let buckets = build_daily(&records, config.timezone);
    report.daily_rows = buckets.len();
    sink.replace_table(DAILY_TABLE, &daily_table(&buckets))?;

    write_opponents(sink, &records, &HashMap::new(), profiles, config, &mut report).await?;

    sink.set_last_sync(&config.username, SyncMode::Full.as_str())?;
    info!(
        "Full rebuild done: {} games, {} days, {} opponents",
        report.total_games, report.daily_rows, report.opponents
    );
    Ok(report)
}

/// Fetches only what's newer than the stored games and brings every table up
/// to date. Falls back to a full rebuild when nothing is stored yet.
pub async fn incremental_update<S, G, P>(
    sink: &mut S,
    source: &G,
    profiles: &P,
    config: &Config,
) -> Result<SyncReport>
where
    S: TableSink + Send,
    G: GameSource + Sync + ?Sized,
    P: ProfileLookup + Sync + ?Sized,
{
    let stored_games = sink.read_table(GAMES_TABLE)?;
    let Some(stored_games) = stored_games else {
        info!("No stored games for {}, running a full rebuild", config.username);
        return full_rebuild(sink, source, profiles, config).await;
    };

    info!("Incremental update for {}", config.username);
    let mut report = SyncReport::new(SyncMode::Incremental);

    let stored = records_from_table(&stored_games, config);
    let known_ids: HashSet<String> = stored_games
        .column_values(GAME_ID_COLUMN)
        .into_iter()
        .map(String::from)
        .collect();

    let archives = source.archives(&config.username).await?;
    let mut seen = known_ids.clone();
    let mut fresh = Vec::new();
    for (i, url) in archives.iter().rev().enumerate() {
        if i > 0 {
            pause(config).await;
        }
        let games = match source.archive_games(url).await {
            Ok(games) => games,
            Err(e) => {
                warn!("Skipping archive {}, a full rebuild will pick it up: {}", url, e);
                report.archives_failed += 1;
                continue;
            }
        };
        report.archives_fetched += 1;

        let mut reached_stored = false;
        for raw in &games {
            let record = normalize(raw, config);
            if known_ids.contains(&record.game_id) {
                reached_stored = true;
            } else if seen.insert(record.game_id.clone()) {
                fresh.push(record);
            }
        }
        if reached_stored {
            debug!("Reached stored games in {}", url);
            break;
        }
    }

    RatingLedger::from_records(&stored).annotate(&mut fresh);
    newest_first(&mut fresh);
    report.new_games = fresh.len();
    info!("{} new games", fresh.len());

    if !fresh.is_empty() {
        sink.prepend_rows(GAMES_TABLE, &games_table(&fresh, config))?;
    }

    let earliest_new = fresh.iter().filter_map(|r| r.end_date(config.timezone)).min();
    let mut records = fresh;
    records.extend(stored);
    report.total_games = records.len();

    add_missing_moves(sink, &records)?;

    let stored_daily = sink.read_table(DAILY_TABLE)?;
    let existing = stored_daily.map(|t| buckets_from_table(&t)).unwrap_or_default();
    let buckets = match existing.last().map(|b| b.date) {
        Some(last) => {
            let from = earliest_new.map_or(last, |d| d.min(last));
            rebuild_from(&existing, &records, config.timezone, from)
        }
        None => build_daily(&records, config.timezone),
    };
    report.daily_rows = buckets.len();
    sink.replace_table(DAILY_TABLE, &daily_table(&buckets))?;

    let stored_opponents = sink.read_table(OPPONENTS_TABLE)?;
    let known = stored_opponents
        .map(|t| profiles_from_table(&t))
        .unwrap_or_default();
    write_opponents(sink, &records, &known, profiles, config, &mut report).await?;

    sink.set_last_sync(&config.username, SyncMode::Incremental.as_str())?;
    info!(
        "Incremental update done: {} new of {} games",
        report.new_games, report.total_games
    );
    Ok(report)
}

/// Prepends move rows for every record missing from each move table, so the
/// tables catch up even after an interrupted run.
fn add_missing_moves<S: TableSink>(sink: &mut S, records: &[NormalizedGameRecord]) -> Result<()> {
    for name in [MOVES_SAN_TABLE, MOVES_CLOCK_TABLE] {
        let (present, min_moves) = match sink.read_table(name)? {
            Some(table) => (
                table
                    .column_values(GAME_ID_COLUMN)
                    .into_iter()
                    .map(String::from)
                    .collect::<HashSet<_>>(),
                max_move_from_columns(&table.columns),
            ),
            None => (HashSet::new(), 0),
        };

        let missing: Vec<NormalizedGameRecord> = records
            .iter()
            .filter(|r| !present.contains(&r.game_id))
            .cloned()
            .collect();
        if missing.is_empty() {
            continue;
        }

        let tables = build_move_tables(&missing, min_moves);
        let table = if name == MOVES_SAN_TABLE {
            tables.san
        } else {
            tables.clock
        };
        sink.prepend_rows(name, &table)?;
        debug!("Added {} rows to {}", missing.len(), name);
    }
    Ok(())
}

async fn write_opponents<S, P>(
    sink: &mut S,
    records: &[NormalizedGameRecord],
    known: &HashMap<String, OpponentProfile>,
    profiles: &P,
    config: &Config,
    report: &mut SyncReport,
) -> Result<()>
where
    S: TableSink + Send,
    P: ProfileLookup + Sync + ?Sized,
{
    let mut summaries = aggregate_opponents(records);
    apply_known_profiles(&mut summaries, known);
    if config.enrich_opponents {
        report.profiles_fetched =
            enrich_opponents(&mut summaries, profiles, config.request_delay).await;
    }
    report.opponents = summaries.len();
    sink.replace_table(OPPONENTS_TABLE, &opponents_table(&summaries))
}

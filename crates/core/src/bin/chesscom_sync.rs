//! Sync a player's Chess.com history into the local database
//!
//! Usage: chesscom_sync [rebuild|update] [username]

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chess_history_core::{run_sync, ChessComClient, Config, Database, Result, SyncMode};

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let mode = match args.next().as_deref().map(str::parse::<SyncMode>) {
        None => SyncMode::Incremental,
        Some(Ok(mode)) => mode,
        Some(Err(e)) => {
            eprintln!("{}\nUsage: chesscom_sync [rebuild|update] [username]", e);
            std::process::exit(2);
        }
    };

    let config = match args.next() {
        Some(username) => Config::from_env_for(username),
        None => Config::from_env(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .init();

    if let Err(e) = run(mode, config).await {
        error!("Sync failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(mode: SyncMode, config: Config) -> Result<()> {
    let mut db = Database::open(&config.db_path)?;
    let client = ChessComClient::new(config.api_base.as_str())?;

    let report = run_sync(mode, &mut db, &client, &client, &config).await?;
    info!(
        "{} sync of {} finished: {} new games, {} total, {} days, {} opponents ({} archives, {} failed)",
        report.mode,
        config.username,
        report.new_games,
        report.total_games,
        report.daily_rows,
        report.opponents,
        report.archives_fetched,
        report.archives_failed
    );
    Ok(())
}

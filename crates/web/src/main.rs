use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chess_history_core::{ChessComClient, Config, Database, Result};

mod error;
mod routes;

pub struct AppState {
    pub db: Mutex<Database>,
    pub client: ChessComClient,
    pub config: Config,
    /// Held for the duration of a sync
    pub sync_lock: Mutex<()>,
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .init();

    if let Err(e) = run(config).await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    let db = Database::open(&config.db_path)?;
    info!("Database ready at {}", config.db_path);

    let client = ChessComClient::new(config.api_base.as_str())?;
    let bind_addr = config.bind_addr.clone();

    let state = Arc::new(AppState {
        db: Mutex::new(db),
        client,
        config,
        sync_lock: Mutex::new(()),
    });

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/tables", get(routes::list_tables))
        .route("/tables/:name", get(routes::get_table))
        .route("/sync", get(routes::last_sync).post(routes::sync_games))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

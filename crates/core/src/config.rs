//! Run configuration, passed explicitly into the normalizer, the aggregators
//! and the sync.

use chrono_tz::Tz;
use std::time::Duration;

use crate::error::{Error, Result};

pub const CHESSCOM_API_BASE: &str = "https://api.chess.com/pub";
pub const DEFAULT_DB_PATH: &str = "chess_history.db";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Pause between consecutive API requests, to stay under the public rate limit.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct Config {
    /// The "me" identity every game is seen from (CHESS_USERNAME)
    pub username: String,
    /// Zone calendar days are bucketed in (CHESS_TIMEZONE)
    pub timezone: Tz,
    pub api_base: String,
    pub db_path: String,
    pub request_delay: Duration,
    /// Look up opponent profiles after aggregation (ENRICH_OPPONENTS)
    pub enrich_opponents: bool,
    pub log_level: String,
    pub bind_addr: String,
}

impl Config {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            timezone: Tz::UTC,
            api_base: CHESSCOM_API_BASE.to_string(),
            db_path: DEFAULT_DB_PATH.to_string(),
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            enrich_opponents: true,
            log_level: "info".to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::load(std::env::var("CHESS_USERNAME").ok())
    }

    /// Like [`Config::from_env`], with the username given instead of read
    /// from CHESS_USERNAME.
    pub fn from_env_for(username: impl Into<String>) -> Result<Self> {
        Self::load(Some(username.into()))
    }

    fn load(username: Option<String>) -> Result<Self> {
        let username = username.map(|u| u.trim().to_string()).unwrap_or_default();
        if username.is_empty() {
            return Err(Error::Config("CHESS_USERNAME must be set".to_string()));
        }

        let timezone = std::env::var("CHESS_TIMEZONE")
            .unwrap_or_else(|_| "UTC".to_string())
            .parse::<Tz>()
            .map_err(|e| Error::Config(format!("CHESS_TIMEZONE: {}", e)))?;

        let request_delay_ms = std::env::var("REQUEST_DELAY_MS")
            .unwrap_or_else(|_| DEFAULT_REQUEST_DELAY_MS.to_string())
            .parse::<u64>()
            .map_err(|_| Error::Config("REQUEST_DELAY_MS must be a whole number".to_string()))?;

        let enrich_opponents = match std::env::var("ENRICH_OPPONENTS") {
            Ok(v) => parse_flag(&v)
                .ok_or_else(|| Error::Config("ENRICH_OPPONENTS must be true or false".to_string()))?,
            Err(_) => true,
        };

        Ok(Self {
            username,
            timezone,
            api_base: std::env::var("CHESS_API_BASE")
                .unwrap_or_else(|_| CHESSCOM_API_BASE.to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string()),
            request_delay: Duration::from_millis(request_delay_ms),
            enrich_opponents,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        })
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn without_delay(mut self) -> Self {
        self.request_delay = Duration::ZERO;
        self
    }

    pub fn without_enrichment(mut self) -> Self {
        self.enrich_opponents = false;
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

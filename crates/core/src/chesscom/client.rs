//! Chess.com API client for fetching game archives and player profiles

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::*;
use crate::error::{Error, Result};

const CLIENT_USER_AGENT: &str = concat!("chess-history/", env!("CARGO_PKG_VERSION"));

/// Where raw games come from.
#[async_trait]
pub trait GameSource {
    /// Monthly archive URLs for a player, oldest first.
    async fn archives(&self, username: &str) -> Result<Vec<String>>;

    /// All games of one monthly archive.
    async fn archive_games(&self, archive_url: &str) -> Result<Vec<RawGame>>;
}

/// Out-of-band profile data for opponents.
#[async_trait]
pub trait ProfileLookup {
    async fn player_profile(&self, username: &str) -> Result<PlayerProfile>;
}

pub struct ChessComClient {
    client: Client,
    base_url: String,
}

impl ChessComClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(Self::headers())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(Error::ChessCom(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl GameSource for ChessComClient {
    async fn archives(&self, username: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/player/{}/games/archives",
            self.base_url,
            username.to_lowercase()
        );
        let response: ArchivesResponse = self.get_json(&url).await?;
        Ok(response.archives)
    }

    async fn archive_games(&self, archive_url: &str) -> Result<Vec<RawGame>> {
        let response: GamesResponse = self.get_json(archive_url).await?;
        Ok(parse_archive_games(response.games))
    }
}

#[async_trait]
impl ProfileLookup for ChessComClient {
    async fn player_profile(&self, username: &str) -> Result<PlayerProfile> {
        let url = format!("{}/player/{}", self.base_url, username.to_lowercase());
        self.get_json(&url).await
    }
}

fn parse_archive_games(values: Vec<serde_json::Value>) -> Vec<RawGame> {
    let mut games = Vec::with_capacity(values.len());

    for value in values {
        match serde_json::from_value::<RawGame>(value) {
            Ok(game) => games.push(game),
            Err(e) => {
                warn!("Failed to parse game: {}", e);
                continue;
            }
        }
    }

    games
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bad_games_are_skipped() {
        let games = parse_archive_games(vec![
            json!({"url": "https://www.chess.com/game/live/1", "time_class": "blitz"}),
            json!({"url": 42}),
            json!({"url": "https://www.chess.com/game/daily/2", "time_class": "daily"}),
        ]);
        assert_eq!(games.len(), 2);
        assert_eq!(games[1].time_class, "daily");
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = ChessComClient::new("https://api.chess.com/pub/").unwrap();
        assert_eq!(client.base_url, "https://api.chess.com/pub");
    }
}

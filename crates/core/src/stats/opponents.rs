//! Per-opponent results, with optional profile enrichment

use chrono::DateTime;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::rating::chain_order;
use crate::chesscom::{PlayerProfile, ProfileLookup};
use crate::games::{GameResult, NormalizedGameRecord};
use crate::storage::Table;

/// Profile fields shown next to an opponent. Empty strings where unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpponentProfile {
    pub title: String,
    pub name: String,
    pub country: String,
    pub status: String,
    pub url: String,
    pub joined: String,
    pub last_online: String,
}

impl OpponentProfile {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<&PlayerProfile> for OpponentProfile {
    fn from(profile: &PlayerProfile) -> Self {
        let time = |t: Option<i64>| {
            t.and_then(|t| DateTime::from_timestamp(t, 0))
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default()
        };
        Self {
            title: profile.title.clone().unwrap_or_default(),
            name: profile.name.clone().unwrap_or_default(),
            country: profile.country_code().unwrap_or_default().to_string(),
            status: profile.status.clone().unwrap_or_default(),
            url: profile.url.clone().unwrap_or_default(),
            joined: time(profile.joined),
            last_online: time(profile.last_online),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpponentSummary {
    /// Spelling from the most recent game
    pub username: String,
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    /// In the order the games were played
    pub game_ids: Vec<String>,
    pub last_rating: Option<i32>,
    pub profile: Option<OpponentProfile>,
}

impl OpponentSummary {
    pub fn key(&self) -> String {
        self.username.to_lowercase()
    }

    /// My score against this opponent in percent.
    pub fn score_percentage(&self) -> Option<f64> {
        (self.games > 0).then(|| {
            (f64::from(self.wins) + f64::from(self.draws) / 2.0) / f64::from(self.games) * 100.0
        })
    }

    fn to_row(&self) -> Vec<String> {
        let profile = self.profile.clone().unwrap_or_default();
        vec![
            self.username.clone(),
            self.games.to_string(),
            self.wins.to_string(),
            self.losses.to_string(),
            self.draws.to_string(),
            self.score_percentage()
                .map(|s| format!("{:.1}", s))
                .unwrap_or_default(),
            self.last_rating.map(|r| r.to_string()).unwrap_or_default(),
            self.game_ids.join(", "),
            profile.title,
            profile.name,
            profile.country,
            profile.status,
            profile.url,
            profile.joined,
            profile.last_online,
        ]
    }
}

const OPPONENT_COLUMNS: [&str; 15] = [
    "Opponent",
    "Games",
    "Wins",
    "Losses",
    "Draws",
    "Score %",
    "Last Rating",
    "Game IDs",
    "Title",
    "Name",
    "Country",
    "Status",
    "Profile URL",
    "Joined",
    "Last Online",
];

/// Index of the first profile column.
const PROFILE_START: usize = 8;

pub fn opponents_table(summaries: &[OpponentSummary]) -> Table {
    Table {
        columns: OPPONENT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows: summaries.iter().map(OpponentSummary::to_row).collect(),
    }
}

/// Profiles already stored in an Opponent Summary table, keyed by lower-cased
/// username.
pub fn profiles_from_table(table: &Table) -> HashMap<String, OpponentProfile> {
    table
        .rows
        .iter()
        .filter_map(|row| {
            let cell = |i: usize| row.get(PROFILE_START + i).cloned().unwrap_or_default();
            let profile = OpponentProfile {
                title: cell(0),
                name: cell(1),
                country: cell(2),
                status: cell(3),
                url: cell(4),
                joined: cell(5),
                last_online: cell(6),
            };
            let username = row.first()?;
            (!profile.is_empty()).then(|| (username.to_lowercase(), profile))
        })
        .collect()
}

/// Groups games by case-insensitive opponent name. Games are visited in
/// played order, so the last rating seen is the most recent one. The result
/// is sorted by number of games, most first.
pub fn aggregate_opponents(records: &[NormalizedGameRecord]) -> Vec<OpponentSummary> {
    let mut ordered: Vec<&NormalizedGameRecord> = records.iter().collect();
    ordered.sort_by(|a, b| a.end_time.cmp(&b.end_time).then(chain_order(a, b)));

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut summaries = ordered
        .into_iter()
        .filter(|r| !r.opponent.username.is_empty())
        .fold(Vec::<OpponentSummary>::new(), |mut summaries, record| {
            let key = record.opponent.username.to_lowercase();
            let slot = *index.entry(key).or_insert_with(|| {
                summaries.push(OpponentSummary::default());
                summaries.len() - 1
            });

            let summary = &mut summaries[slot];
            summary.username = record.opponent.username.clone();
            summary.games += 1;
            match record.result {
                GameResult::Win => summary.wins += 1,
                GameResult::Loss => summary.losses += 1,
                GameResult::Draw => summary.draws += 1,
            }
            summary.game_ids.push(record.game_id.clone());
            if record.opponent.rating.is_some() {
                summary.last_rating = record.opponent.rating;
            }
            summaries
        });

    summaries.sort_by(|a, b| b.games.cmp(&a.games));
    summaries
}

/// Fills in profiles we already have without asking the API again.
pub fn apply_known_profiles(
    summaries: &mut [OpponentSummary],
    known: &HashMap<String, OpponentProfile>,
) {
    for summary in summaries.iter_mut().filter(|s| s.profile.is_none()) {
        summary.profile = known.get(&summary.key()).cloned();
    }
}

/// Looks up the profile of every opponent that doesn't have one yet. A
/// failed lookup leaves that opponent without a profile and moves on.
pub async fn enrich_opponents<P>(summaries: &mut [OpponentSummary], lookup: &P, delay: Duration) -> usize
where
    P: ProfileLookup + Sync + ?Sized,
{
    let mut enriched = 0;
    for summary in summaries.iter_mut().filter(|s| s.profile.is_none()) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result = lookup.player_profile(&summary.username).await;
        match result {
            Ok(profile) => {
                debug!("Fetched profile for {}", summary.username);
                summary.profile = Some(OpponentProfile::from(&profile));
                enriched += 1;
            }
            Err(e) => warn!("Profile lookup failed for {}: {}", summary.username, e),
        }
    }
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::test_support::{GameBuilder, MARCH_1};
    use async_trait::async_trait;

    struct FakeProfiles;

    #[async_trait]
    impl ProfileLookup for FakeProfiles {
        async fn player_profile(&self, username: &str) -> Result<PlayerProfile> {
            if username.eq_ignore_ascii_case("ghost") {
                return Err(Error::ChessCom("404 Not Found".to_string()));
            }
            Ok(PlayerProfile {
                username: username.to_lowercase(),
                title: Some("FM".to_string()),
                country: Some("https://api.chess.com/pub/country/DE".to_string()),
                joined: Some(0),
                ..Default::default()
            })
        }
    }

    fn sample() -> Vec<NormalizedGameRecord> {
        vec![
            GameBuilder::new(3, "blitz", MARCH_1 + 300).opponent("foo", Some(1610)).lost().record(),
            GameBuilder::new(1, "blitz", MARCH_1 + 100).opponent("Foo", Some(1600)).record(),
            GameBuilder::new(2, "rapid", MARCH_1 + 200).opponent("bar", Some(1400)).drawn().record(),
            GameBuilder::new(4, "blitz", MARCH_1 + 400).opponent("FOO", None).drawn().record(),
        ]
    }

    #[test]
    fn test_case_insensitive_merge() {
        let summaries = aggregate_opponents(&sample());
        assert_eq!(summaries.len(), 2);

        let foo = &summaries[0];
        assert_eq!(foo.key(), "foo");
        assert_eq!(foo.username, "FOO");
        assert_eq!((foo.games, foo.wins, foo.losses, foo.draws), (3, 1, 1, 1));
        assert_eq!(foo.game_ids, vec!["1", "3", "4"]);
        assert_eq!(foo.last_rating, Some(1610));
        assert_eq!(foo.score_percentage(), Some(50.0));

        let bar = &summaries[1];
        assert_eq!((bar.games, bar.draws), (1, 1));
        assert_eq!(bar.last_rating, Some(1400));
    }

    #[test]
    fn test_later_encounter_rating_wins() {
        let records = vec![
            GameBuilder::new(2, "blitz", MARCH_1 + 200).opponent("foo", Some(1550)).record(),
            GameBuilder::new(1, "blitz", MARCH_1 + 100).opponent("Foo", Some(1500)).record(),
        ];
        let summaries = aggregate_opponents(&records);
        assert_eq!(summaries[0].last_rating, Some(1550));
        assert_eq!(summaries[0].wins, 2);
    }

    #[tokio::test]
    async fn test_enrichment_failures_are_ignored() {
        let mut records = sample();
        records.push(GameBuilder::new(5, "blitz", MARCH_1 + 500).opponent("ghost", Some(900)).record());
        let mut summaries = aggregate_opponents(&records);

        let enriched = enrich_opponents(&mut summaries, &FakeProfiles, Duration::ZERO).await;
        assert_eq!(enriched, 2);

        let foo = summaries.iter().find(|s| s.key() == "foo").unwrap();
        let profile = foo.profile.as_ref().unwrap();
        assert_eq!(profile.title, "FM");
        assert_eq!(profile.country, "DE");
        assert_eq!(profile.joined, "1970-01-01 00:00:00");

        let ghost = summaries.iter().find(|s| s.key() == "ghost").unwrap();
        assert!(ghost.profile.is_none());
        assert_eq!(ghost.games, 1);
    }

    #[test]
    fn test_known_profiles_from_table() {
        let mut summaries = aggregate_opponents(&sample());
        summaries[0].profile = Some(OpponentProfile {
            title: "IM".to_string(),
            ..Default::default()
        });
        let table = opponents_table(&summaries);
        assert_eq!(table.columns.len(), table.rows[0].len());

        let known = profiles_from_table(&table);
        assert_eq!(known.len(), 1);
        assert_eq!(known["foo"].title, "IM");

        let mut fresh = aggregate_opponents(&sample());
        apply_known_profiles(&mut fresh, &known);
        assert_eq!(fresh[0].profile.as_ref().map(|p| p.title.as_str()), Some("IM"));
        assert!(fresh[1].profile.is_none());
    }
}

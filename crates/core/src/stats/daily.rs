//! Day-bucketed activity with per-format ratings carried across idle days
//!
//! Days are folded oldest to newest. The carried rating of a format only
//! moves on a day with at least one game in that format; every other day
//! repeats it, or leaves it empty until the format's first game.

use chrono::{Days, NaiveDate};
use chrono_tz::Tz;
use std::collections::BTreeMap;

use crate::games::classify::round_to_tenth;
use crate::games::{Format, GameResult, NormalizedGameRecord};
use crate::storage::Table;

/// Games and time for one day, overall or for one format.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tally {
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub minutes: f64,
}

impl Tally {
    fn add(&mut self, result: GameResult, minutes: f64) {
        self.games += 1;
        match result {
            GameResult::Win => self.wins += 1,
            GameResult::Loss => self.losses += 1,
            GameResult::Draw => self.draws += 1,
        }
        self.minutes = round_to_tenth(self.minutes + minutes);
    }

    pub fn points(&self) -> f64 {
        f64::from(self.wins) + f64::from(self.draws) / 2.0
    }

    /// `(wins + draws / 2) / games`, none on a day without games.
    pub fn win_rate(&self) -> Option<f64> {
        (self.games > 0).then(|| self.points() / f64::from(self.games))
    }

    /// `"2.5/4"`
    pub fn score(&self) -> String {
        format!("{:.1}/{}", self.points(), self.games)
    }

    pub fn seconds(&self) -> u64 {
        (self.minutes * 60.0).round() as u64
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.games.to_string(),
            self.wins.to_string(),
            self.losses.to_string(),
            self.draws.to_string(),
            self.win_rate()
                .map(|r| format!("{:.1}", r * 100.0))
                .unwrap_or_default(),
            self.score(),
            format!("{:.1}", self.minutes),
            self.seconds().to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyBucket {
    pub date: NaiveDate,
    /// Carried Bullet, Blitz and Rapid ratings
    pub ratings: [Option<i32>; 3],
    /// Sum of the carried ratings that exist
    pub total_rating: Option<i32>,
    /// Day-over-day change of `total_rating`
    pub rating_change: Option<i32>,
    pub total: Tally,
    pub formats: [Tally; 3],
}

impl DailyBucket {
    pub fn tally(&self, format: &Format) -> Option<&Tally> {
        format.live_index().map(|i| &self.formats[i])
    }

    pub fn to_row(&self) -> Vec<String> {
        let opt = |v: Option<i32>| v.map(|v| v.to_string()).unwrap_or_default();
        let mut row = vec![self.date.to_string()];
        row.extend(self.ratings.iter().map(|r| opt(*r)));
        row.push(opt(self.total_rating));
        row.push(opt(self.rating_change));
        row.extend(self.total.cells());
        for tally in &self.formats {
            row.extend(tally.cells());
        }
        row
    }

    /// Reads back a row written by [`DailyBucket::to_row`].
    pub fn from_row(row: &[String]) -> Option<Self> {
        let opt = |i: usize| row.get(i).and_then(|c| c.trim().parse::<i32>().ok());
        let tally = |start: usize| -> Option<Tally> {
            let count = |i: usize| row.get(start + i).and_then(|c| c.trim().parse::<u32>().ok());
            Some(Tally {
                games: count(0)?,
                wins: count(1)?,
                losses: count(2)?,
                draws: count(3)?,
                minutes: row.get(start + 6)?.trim().parse().ok()?,
            })
        };

        Some(DailyBucket {
            date: row.first()?.parse().ok()?,
            ratings: [opt(1), opt(2), opt(3)],
            total_rating: opt(4),
            rating_change: opt(5),
            total: tally(6)?,
            formats: [
                tally(6 + TALLY_WIDTH)?,
                tally(6 + 2 * TALLY_WIDTH)?,
                tally(6 + 3 * TALLY_WIDTH)?,
            ],
        })
    }
}

const TALLY_COLUMNS: [&str; 8] = [
    "Games", "Wins", "Losses", "Draws", "Win %", "Score", "Minutes", "Seconds",
];
const TALLY_WIDTH: usize = TALLY_COLUMNS.len();

pub fn daily_columns() -> Vec<String> {
    let mut columns: Vec<String> = ["Date", "Bullet Rating", "Blitz Rating", "Rapid Rating", "Total Rating", "Rating Change"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    columns.extend(TALLY_COLUMNS.iter().map(|c| c.to_string()));
    for format in &Format::LIVE {
        columns.extend(TALLY_COLUMNS.iter().map(|c| format!("{} {}", format, c)));
    }
    columns
}

/// Daily table, newest day first.
pub fn daily_table(buckets: &[DailyBucket]) -> Table {
    Table {
        columns: daily_columns(),
        rows: buckets.iter().rev().map(DailyBucket::to_row).collect(),
    }
}

/// Daily buckets from a stored table, oldest day first. Unreadable rows are
/// dropped.
pub fn buckets_from_table(table: &Table) -> Vec<DailyBucket> {
    let mut buckets: Vec<DailyBucket> = table
        .rows
        .iter()
        .filter_map(|row| DailyBucket::from_row(row))
        .collect();
    buckets.sort_by_key(|b| b.date);
    buckets
}

/// What carries over from one day to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Carry {
    ratings: [Option<i32>; 3],
    total: Option<i32>,
}

impl Carry {
    fn after(bucket: &DailyBucket) -> Self {
        Self {
            ratings: bucket.ratings,
            total: bucket.total_rating,
        }
    }

    /// Folds one day's games (sorted by end time) into a bucket and the
    /// carry for the next day.
    fn step(self, date: NaiveDate, games: &[&NormalizedGameRecord]) -> (Carry, DailyBucket) {
        let mut ratings = self.ratings;
        let mut total = Tally::default();
        let mut formats = [Tally::default(); 3];

        for game in games {
            let minutes = if game.format.is_live() {
                game.game_length_minutes
            } else {
                0.0
            };
            total.add(game.result, minutes);
            if let Some(i) = game.format.live_index() {
                formats[i].add(game.result, minutes);
                if let Some(rating) = game.me.rating {
                    ratings[i] = Some(rating);
                }
            }
        }

        let present: Vec<i32> = ratings.iter().flatten().copied().collect();
        let total_rating = (!present.is_empty()).then(|| present.iter().sum::<i32>());
        let rating_change = match (total_rating, self.total) {
            (Some(today), Some(yesterday)) => Some(today - yesterday),
            _ => None,
        };

        let carry = Carry {
            ratings,
            total: total_rating,
        };
        let bucket = DailyBucket {
            date,
            ratings,
            total_rating,
            rating_change,
            total,
            formats,
        };
        (carry, bucket)
    }
}

/// Games with an end time, grouped by calendar day in `tz` and sorted by end
/// time within a day.
fn games_by_day<'a>(
    records: impl IntoIterator<Item = &'a NormalizedGameRecord>,
    tz: Tz,
) -> BTreeMap<NaiveDate, Vec<&'a NormalizedGameRecord>> {
    let mut days: BTreeMap<NaiveDate, Vec<&NormalizedGameRecord>> = BTreeMap::new();
    for record in records {
        if let Some(date) = record.end_date(tz) {
            days.entry(date).or_default().push(record);
        }
    }
    for games in days.values_mut() {
        games.sort_by(|a, b| a.end_time.cmp(&b.end_time).then(a.game_id.cmp(&b.game_id)));
    }
    days
}

fn fold_days(
    carry: Carry,
    start: NaiveDate,
    end: NaiveDate,
    days: &BTreeMap<NaiveDate, Vec<&NormalizedGameRecord>>,
) -> Vec<DailyBucket> {
    start
        .iter_days()
        .take_while(|date| *date <= end)
        .scan(carry, |carry, date| {
            let games = days.get(&date).map(Vec::as_slice).unwrap_or(&[]);
            let (next, bucket) = carry.step(date, games);
            *carry = next;
            Some(bucket)
        })
        .collect()
}

/// One bucket per calendar day from the first to the last game's end day,
/// oldest first.
pub fn build_daily(records: &[NormalizedGameRecord], tz: Tz) -> Vec<DailyBucket> {
    let days = games_by_day(records, tz);
    let (Some(&start), Some(&end)) = (days.keys().next(), days.keys().next_back()) else {
        return Vec::new();
    };
    fold_days(Carry::default(), start, end, &days)
}

/// Recomputes the buckets from `from` onwards over `records` (the complete
/// history), keeping the stored buckets before `from` as they are and
/// seeding the carry from the last of them.
pub fn rebuild_from(
    existing: &[DailyBucket],
    records: &[NormalizedGameRecord],
    tz: Tz,
    from: NaiveDate,
) -> Vec<DailyBucket> {
    let kept: Vec<DailyBucket> = existing
        .iter()
        .filter(|b| b.date < from)
        .cloned()
        .collect();
    let Some(last) = kept.last() else {
        return build_daily(records, tz);
    };
    let Some(start) = last.date.checked_add_days(Days::new(1)) else {
        return kept;
    };

    let days = games_by_day(
        records
            .iter()
            .filter(|r| r.end_date(tz).is_some_and(|d| d >= start)),
        tz,
    );
    let latest_stored = existing.iter().map(|b| b.date).max();
    let end = match (days.keys().next_back().copied(), latest_stored) {
        (Some(a), Some(b)) => a.max(b),
        (a, b) => match a.or(b) {
            Some(end) => end,
            None => return kept,
        },
    };

    let carry = Carry::after(last);
    let mut buckets = kept;
    buckets.extend(fold_days(carry, start, end, &days));
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{GameBuilder, DAY, MARCH_1};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn sample() -> Vec<NormalizedGameRecord> {
        vec![
            // Mar 1: two blitz games, one win one draw
            GameBuilder::new(1, "blitz", MARCH_1 + 3600).rating(Some(1500)).length(300).record(),
            GameBuilder::new(2, "blitz", MARCH_1 + 7200).rating(Some(1508)).drawn().length(420).record(),
            // Mar 2: nothing
            // Mar 3: a rapid loss and a daily win
            GameBuilder::new(3, "rapid", MARCH_1 + 2 * DAY + 100).rating(Some(1700)).lost().length(900).record(),
            GameBuilder::new(4, "daily", MARCH_1 + 2 * DAY + 200).rating(Some(1400)).record(),
            // Mar 5: bullet win
            GameBuilder::new(5, "bullet", MARCH_1 + 4 * DAY + 50).rating(Some(1300)).length(60).record(),
        ]
    }

    #[test]
    fn test_every_day_is_covered() {
        let buckets = build_daily(&sample(), Tz::UTC);
        let dates: Vec<_> = buckets.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![date(1), date(2), date(3), date(4), date(5)]);
    }

    #[test]
    fn test_ratings_carry_forward() {
        let buckets = build_daily(&sample(), Tz::UTC);
        let ratings: Vec<_> = buckets.iter().map(|b| b.ratings).collect();
        assert_eq!(
            ratings,
            vec![
                [None, Some(1508), None],
                [None, Some(1508), None],
                [None, Some(1508), Some(1700)],
                [None, Some(1508), Some(1700)],
                [Some(1300), Some(1508), Some(1700)],
            ]
        );

        for pair in buckets.windows(2) {
            for (i, format) in Format::LIVE.iter().enumerate() {
                if pair[1].tally(format).map(|t| t.games) == Some(0) {
                    assert_eq!(pair[1].ratings[i], pair[0].ratings[i]);
                }
            }
        }
    }

    #[test]
    fn test_total_rating_and_change() {
        let buckets = build_daily(&sample(), Tz::UTC);
        let totals: Vec<_> = buckets.iter().map(|b| b.total_rating).collect();
        assert_eq!(totals, vec![Some(1508), Some(1508), Some(3208), Some(3208), Some(4508)]);
        let changes: Vec<_> = buckets.iter().map(|b| b.rating_change).collect();
        assert_eq!(changes, vec![None, Some(0), Some(1700), Some(0), Some(1300)]);
    }

    #[test]
    fn test_counts_and_time() {
        let buckets = build_daily(&sample(), Tz::UTC);
        let first = &buckets[0];
        assert_eq!(first.total.games, 2);
        assert_eq!(first.total.wins, 1);
        assert_eq!(first.total.draws, 1);
        assert_eq!(first.total.minutes, 12.0);
        assert_eq!(first.total.seconds(), 720);
        assert_eq!(first.total.score(), "1.5/2");
        assert_eq!(first.total.win_rate(), Some(0.75));
        assert_eq!(first.tally(&Format::Blitz).unwrap().games, 2);

        let third = &buckets[2];
        assert_eq!(third.total.games, 2);
        assert_eq!(third.total.losses, 1);
        assert_eq!(third.total.minutes, 15.0);
        assert_eq!(third.tally(&Format::Rapid).unwrap().losses, 1);

        assert_eq!(buckets[1].total, Tally::default());
        assert_eq!(buckets[1].total.win_rate(), None);

        for bucket in &buckets {
            let t = bucket.total;
            assert_eq!(t.games, t.wins + t.losses + t.draws);
            for f in &bucket.formats {
                assert_eq!(f.games, f.wins + f.losses + f.draws);
            }
        }
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let records = sample();
        assert_eq!(build_daily(&records, Tz::UTC), build_daily(&records, Tz::UTC));
        assert_eq!(
            daily_table(&build_daily(&records, Tz::UTC)),
            daily_table(&build_daily(&records, Tz::UTC))
        );
    }

    #[test]
    fn test_days_follow_reference_zone() {
        let records = vec![GameBuilder::new(1, "blitz", MARCH_1 + 3600).record()];
        let buckets = build_daily(&records, chrono_tz::America::New_York);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_empty_input() {
        assert!(build_daily(&[], Tz::UTC).is_empty());
    }

    #[test]
    fn test_rebuild_from_matches_full_build() {
        let records = sample();
        let full = build_daily(&records, Tz::UTC);

        let stored = build_daily(&records[..3], Tz::UTC);
        let rebuilt = rebuild_from(&stored, &records, Tz::UTC, date(3));
        assert_eq!(rebuilt, full);
    }

    #[test]
    fn test_rebuild_without_history_is_full_build() {
        let records = sample();
        assert_eq!(rebuild_from(&[], &records, Tz::UTC, date(3)), build_daily(&records, Tz::UTC));
    }

    #[test]
    fn test_rows_round_trip_through_table() {
        let buckets = build_daily(&sample(), Tz::UTC);
        let table = daily_table(&buckets);
        assert_eq!(table.columns.len(), 6 + 4 * TALLY_WIDTH);
        assert_eq!(table.rows[0][0], "2024-03-05");
        assert_eq!(table.rows[0].len(), table.columns.len());
        assert_eq!(buckets_from_table(&table), buckets);
    }
}

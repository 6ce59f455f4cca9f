//! Per-format rating deltas between consecutive games
//!
//! Games are chained by numeric game id, which the platform hands out in
//! increasing order over time; end time breaks ties. Games whose id is not
//! numeric never take part in a chain.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::games::{Format, NormalizedGameRecord};

fn rating_delta(current: Option<i32>, previous: Option<i32>) -> Option<i32> {
    current?.checked_sub(previous?)
}

/// Chain order: numeric id ascending, then end time. Opaque ids sort last.
pub fn chain_order(a: &NormalizedGameRecord, b: &NormalizedGameRecord) -> Ordering {
    match (a.numeric_id(), b.numeric_id()) {
        (Some(x), Some(y)) => x.cmp(&y).then(a.end_time.cmp(&b.end_time)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.end_time.cmp(&b.end_time),
    }
}

/// Sets the rating change of every record from the full history: within
/// each format, the difference to the previous game. The first game of a
/// format gets none.
pub fn annotate_batch(records: &mut [NormalizedGameRecord]) {
    let mut groups: HashMap<Format, Vec<usize>> = HashMap::new();
    for (i, record) in records.iter_mut().enumerate() {
        record.rating_change = None;
        if record.numeric_id().is_some() {
            groups.entry(record.format.clone()).or_default().push(i);
        }
    }

    for mut indices in groups.into_values() {
        indices.sort_by(|&a, &b| chain_order(&records[a], &records[b]));
        indices.into_iter().fold(None, |previous: Option<Option<i32>>, i| {
            let rating = records[i].me.rating;
            records[i].rating_change = previous.and_then(|p| rating_delta(rating, p));
            Some(rating)
        });
    }
}

/// Stored ratings per format keyed by game id, used to annotate newly
/// fetched games against what's already persisted.
#[derive(Debug, Clone, Default)]
pub struct RatingLedger {
    by_format: HashMap<Format, BTreeMap<u64, Option<i32>>>,
}

impl RatingLedger {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a NormalizedGameRecord>) -> Self {
        let mut ledger = Self::default();
        for record in records {
            ledger.insert(record);
        }
        ledger
    }

    fn insert(&mut self, record: &NormalizedGameRecord) {
        if let Some(id) = record.numeric_id() {
            self.by_format
                .entry(record.format.clone())
                .or_default()
                .insert(id, record.me.rating);
        }
    }

    /// Closest game before `id` in the same format, as (id, rating).
    pub fn previous(&self, format: &Format, id: u64) -> Option<(u64, Option<i32>)> {
        self.by_format
            .get(format)?
            .range(..id)
            .next_back()
            .map(|(&id, &rating)| (id, rating))
    }

    /// Annotates new records against the ledger in chain order, folding each
    /// one in as it goes so later games in the same batch chain onto earlier
    /// ones before anything is persisted.
    pub fn annotate(&mut self, records: &mut [NormalizedGameRecord]) {
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|&a, &b| chain_order(&records[a], &records[b]));

        for i in order {
            let record = &mut records[i];
            record.rating_change = record.numeric_id().and_then(|id| {
                let (_, previous) = self.previous(&record.format, id)?;
                rating_delta(record.me.rating, previous)
            });
            self.insert(record);
        }
    }
}

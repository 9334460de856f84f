//! Bike interval diff and compaction.
//!
//! For every bike in a snapshot at time `t`, compare against the bike's current
//! interval (the stored row with the greatest `first_seen`):
//! - no current interval → open a new one at `t`;
//! - any tracked attribute differs → open a new one at `t`, leaving the old row as is;
//! - otherwise → continue the current interval (same `first_seen`).
//!
//! Every emitted row has `last_seen = t`, and the store's upsert keyed on
//! `(first_seen, number)` routes continuations to an update of `last_seen` and
//! new intervals to an insert.

use std::collections::{HashMap, HashSet};

use crate::models::BikeInterval;
use crate::snapshot::BikeRecord;

/// How a bike record relates to the bike's stored history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalChange {
    /// The number has never been seen.
    New,
    /// At least one of bike_type, place_id, active, state changed.
    Changed,
    /// Identical tracked attributes; the current interval is extended.
    Continued,
}

/// Rows to upsert for one snapshot, with per-outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BikeDiff {
    /// One row per distinct bike number in the snapshot.
    pub rows: Vec<BikeInterval>,
    /// Intervals opened for numbers never seen before.
    pub new: usize,
    /// Intervals opened because the bike's state changed.
    pub changed: usize,
    /// Intervals whose `last_seen` advances.
    pub continued: usize,
    /// Repeated numbers within the snapshot that were dropped.
    pub duplicates: usize,
}

/// Whether any tracked attribute of `record` differs from `prev`.
///
/// All four attributes are evaluated; no single field is singled out as the cause.
pub fn state_differs(prev: &BikeInterval, record: &BikeRecord) -> bool {
    let mismatches = [
        prev.bike_type != record.bike_type,
        prev.place_id != record.place_id,
        prev.active != record.active,
        prev.state != record.state,
    ];
    mismatches.iter().any(|m| *m)
}

/// Classify one record against its previous interval.
pub fn classify(prev: Option<&BikeInterval>, record: &BikeRecord) -> IntervalChange {
    match prev {
        None => IntervalChange::New,
        Some(p) if state_differs(p, record) => IntervalChange::Changed,
        Some(_) => IntervalChange::Continued,
    }
}

/// Compute the interval rows for a snapshot taken at `timestamp`.
///
/// When a number appears more than once, the first record wins and the rest are
/// counted in [`BikeDiff::duplicates`].
pub fn diff_bikes(
    timestamp: i64,
    records: &[BikeRecord],
    latest: &HashMap<String, BikeInterval>,
) -> BikeDiff {
    let mut diff = BikeDiff {
        rows: Vec::with_capacity(records.len()),
        ..BikeDiff::default()
    };
    let mut seen = HashSet::with_capacity(records.len());

    for record in records {
        if !seen.insert(record.number.as_str()) {
            tracing::warn!(number = %record.number, timestamp, "bike listed twice in snapshot; keeping first");
            diff.duplicates += 1;
            continue;
        }

        let prev = latest.get(&record.number);
        let first_seen = match classify(prev, record) {
            IntervalChange::New => {
                diff.new += 1;
                timestamp
            }
            IntervalChange::Changed => {
                diff.changed += 1;
                timestamp
            }
            IntervalChange::Continued => {
                diff.continued += 1;
                prev.map_or(timestamp, |p| p.first_seen)
            }
        };

        diff.rows.push(BikeInterval {
            first_seen,
            last_seen: timestamp,
            number: record.number.clone(),
            bike_type: record.bike_type,
            place_id: record.place_id,
            active: record.active,
            state: record.state.clone(),
        });
    }
    diff
}

//! Incremental ingestion of snapshots into the state store.
//!
//! ## What this does
//! For each snapshot, in timestamp order:
//! 1. **Ordering guard**: reject the snapshot unless its timestamp is strictly
//!    greater than `max(last_seen)` over all stored bike intervals.
//! 2. **Places/rentals**: insert one place and one rental row per place entry,
//!    ignoring rows whose key already exists.
//! 3. **Bike intervals**: load the current interval per bike number, compute the
//!    diff (see [`diff`]) and upsert it keyed on `(first_seen, number)`.
//!
//! ## Transactions & consistency
//! Steps 1-3 run inside one [`StateStore::unit_of_work`]. A failure anywhere rolls
//! the snapshot back completely, so the store only ever contains whole snapshots
//! and a run can be restarted after the cause is fixed.
//!
//! ## Runs
//! [`ingest_all`] applies snapshots one at a time and stops at the first error.
//! Snapshots committed before the error stay committed.

pub mod diff;
pub mod materialize;
mod report;

use thiserror::Error;
use tracing::{debug, info};

use crate::snapshot::{Snapshot, SnapshotError};
use crate::store::{StateStore, StoreError};

pub use diff::{BikeDiff, IntervalChange, diff_bikes};
pub use materialize::{DEFAULT_LOOSE_BIKE_PATTERN, LooseBikeMatcher, place_rows, rental_rows};
pub use report::{RunReport, SnapshotReport};

/// Errors that halt ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The snapshot is not newer than the latest stored bike record.
    #[error("snapshot {timestamp} is not newer than the latest stored record ({latest}); snapshots must be applied in strictly increasing order")]
    OutOfOrder {
        /// Timestamp of the rejected snapshot.
        timestamp: i64,
        /// Greatest stored `last_seen`.
        latest: i64,
    },

    /// The snapshot could not be read, parsed or validated.
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] SnapshotError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Engine settings.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Classifies loose-bike places.
    pub loose_bikes: LooseBikeMatcher,
}

/// Fail with [`IngestError::OutOfOrder`] unless `timestamp` is newer than every stored bike record.
pub fn check_order<S: StateStore>(store: &mut S, timestamp: i64) -> Result<(), IngestError> {
    match store.max_last_seen()? {
        Some(latest) if latest >= timestamp => Err(IngestError::OutOfOrder { timestamp, latest }),
        _ => Ok(()),
    }
}

/// Apply one snapshot as a single unit of work.
pub fn ingest_snapshot<S: StateStore>(
    store: &mut S,
    snapshot: &Snapshot,
    opts: &IngestOptions,
) -> Result<SnapshotReport, IngestError> {
    snapshot.validate()?;
    let timestamp = snapshot.timestamp;

    let report = store.unit_of_work(|store| {
        check_order(store, timestamp)?;

        let places = place_rows(snapshot, &opts.loose_bikes);
        let rentals = rental_rows(snapshot);
        let places_inserted = store.insert_places(&places)?;
        let rentals_inserted = store.insert_rentals(&rentals)?;

        let latest = store.latest_bikes()?;
        let diff = diff_bikes(timestamp, &snapshot.bikes, &latest);
        if !diff.rows.is_empty() {
            store.upsert_bikes(&diff.rows)?;
        }
        debug!(timestamp, known_bikes = latest.len(), rows = diff.rows.len(), "bike diff applied");

        Ok::<_, IngestError>(SnapshotReport {
            timestamp,
            places_inserted,
            rentals_inserted,
            bikes_new: diff.new,
            bikes_changed: diff.changed,
            bikes_continued: diff.continued,
            bikes_duplicate: diff.duplicates,
        })
    })?;

    info!(
        timestamp,
        places = report.places_inserted,
        rentals = report.rentals_inserted,
        bikes_new = report.bikes_new,
        bikes_changed = report.bikes_changed,
        bikes_continued = report.bikes_continued,
        "snapshot ingested"
    );
    Ok(report)
}

/// Apply snapshots in the order given, stopping at the first error.
///
/// Source errors (unreadable or unparsable files) halt the run like any other
/// malformed snapshot; nothing is skipped.
pub fn ingest_all<S, I>(store: &mut S, snapshots: I, opts: &IngestOptions) -> Result<RunReport, IngestError>
where
    S: StateStore,
    I: IntoIterator<Item = Result<Snapshot, SnapshotError>>,
{
    let mut run = RunReport::default();
    for snapshot in snapshots {
        let snapshot = snapshot?;
        let report = ingest_snapshot(store, &snapshot, opts)?;
        run.snapshots.push(report);
    }
    Ok(run)
}

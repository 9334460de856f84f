//! State store: durable storage for places, rentals and bike intervals.
//!
//! [`StateStore`] is the portable surface the ingestion engine talks to. Two
//! implementations exist and one is chosen when the run starts:
//! - [`SqliteStore`] (Diesel/SQLite) for real runs;
//! - [`MemoryStore`], ordered maps plus a number → current-interval index.
//!
//! Every bulk write is atomic per call: a batch either fully applies or fully
//! fails. The SQLite backend splits large batches into chunks of at most
//! `chunk_size` rows and issues them inside one savepoint.

mod memory;
mod sqlite;

use std::collections::HashMap;

use thiserror::Error;

use crate::models::{BikeInterval, Place, Rental};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Rows per statement used when no chunk size is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Bound parameters a single SQLite statement may carry (SQLite >= 3.32 default).
///
/// The SQLite backend never puts more than `SQLITE_MAX_VARIABLES / columns`
/// rows into one statement, whatever chunk size is configured.
pub const SQLITE_MAX_VARIABLES: usize = 32_766;

/// Errors surfaced by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A query failed (constraint, type mismatch, I/O inside SQLite).
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// The database could not be opened.
    #[error("connection error: {0}")]
    Connection(#[from] diesel::ConnectionError),

    /// A chunk size of zero was configured.
    #[error("invalid chunk size {0}; must be at least 1")]
    ChunkSize(usize),

    /// A row references a place that was never inserted.
    #[error("{table}: place {place_id} does not exist")]
    MissingPlace {
        /// Table the offending row was written to.
        table: &'static str,
        /// Referenced place id.
        place_id: i64,
    },
}

/// Result type used by store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    /// Rows in `places`.
    pub places: i64,
    /// Rows in `rentals`.
    pub rentals: i64,
    /// Rows in `bikes`.
    pub bikes: i64,
}

/// Portable storage surface used by the ingestion engine.
pub trait StateStore {
    /// Run `f` as one unit of work. If `f` fails, every write it made is discarded.
    fn unit_of_work<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<StoreError>;

    /// Insert places, silently skipping ids that already exist. Returns rows inserted.
    fn insert_places(&mut self, rows: &[Place]) -> StoreResult<usize>;

    /// Insert rentals, silently skipping existing `(place_id, timestamp)` pairs. Returns rows inserted.
    fn insert_rentals(&mut self, rows: &[Rental]) -> StoreResult<usize>;

    /// Insert new intervals or, on a `(first_seen, number)` conflict, advance the
    /// existing row's `last_seen`. No other column of an existing row changes.
    fn upsert_bikes(&mut self, rows: &[BikeInterval]) -> StoreResult<usize>;

    /// Greatest `last_seen` over all bike intervals, `None` for an empty table.
    fn max_last_seen(&mut self) -> StoreResult<Option<i64>>;

    /// The current interval (greatest `first_seen`) of every bike number ever stored.
    fn latest_bikes(&mut self) -> StoreResult<HashMap<String, BikeInterval>>;

    /// All intervals of one bike, ordered by `first_seen`.
    fn bike_history(&mut self, number: &str) -> StoreResult<Vec<BikeInterval>>;

    /// Row counts per table.
    fn counts(&mut self) -> StoreResult<TableCounts>;
}

/// Validate a configured chunk size.
pub fn check_chunk_size(chunk_size: usize) -> StoreResult<usize> {
    if chunk_size == 0 {
        return Err(StoreError::ChunkSize(chunk_size));
    }
    Ok(chunk_size)
}

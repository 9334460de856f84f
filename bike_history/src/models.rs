//! Diesel models mapping to the database schema.
//!
//! These types mirror the tables created by the embedded migrations and declared
//! in [`crate::schema`]:
//! - [`crate::schema::places`]: stations and loose-bike drop points
//! - [`crate::schema::rentals`]: per-snapshot availability counts, unique on `(place_id, timestamp)`
//! - [`crate::schema::bikes`]: bike state intervals, unique on `(first_seen, number)`
//!
//! The same structs are used by every [`crate::store::StateStore`] backend, so the
//! in-memory store and the SQLite store hold identical row shapes.

use diesel::prelude::*;

use crate::schema::*;

/// A row in [`crate::schema::places`].
///
/// `timestamp` is set only for synthetic loose-bike places; permanent stations keep it `NULL`.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = places, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct Place {
    /// External place identifier (`uid` in the feed). Primary key.
    pub id: i64,
    /// Snapshot timestamp for loose bikes, `None` for stations.
    pub timestamp: Option<i64>,
    /// Display name as reported by the feed.
    pub name: String,
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

/// A row in [`crate::schema::rentals`]: availability of one place at one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = rentals, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct Rental {
    /// FK to [`Place::id`].
    pub place_id: i64,
    /// Unix timestamp of the snapshot.
    pub timestamp: i64,
    /// Bikes physically present.
    pub bikes: i32,
    /// Bikes available to rent.
    pub available: i32,
}

/// A row in [`crate::schema::bikes`]: one interval of constant bike state.
///
/// The surrogate `id` column is never read; rows are addressed by `(first_seen, number)`.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, QueryableByName, Selectable, Insertable)]
#[diesel(table_name = bikes, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct BikeInterval {
    /// Timestamp of the first snapshot in which the bike held this state.
    pub first_seen: i64,
    /// Timestamp of the latest snapshot in which the bike held this state.
    pub last_seen: i64,
    /// Bike number (stable identifier).
    pub number: String,
    /// Feed-specific bike type code.
    pub bike_type: i32,
    /// FK to [`Place::id`].
    pub place_id: i64,
    /// Whether the bike is active.
    pub active: bool,
    /// Short status code (at most five characters).
    pub state: String,
}

impl BikeInterval {
    /// Key of the interval under the `(first_seen, number)` uniqueness constraint.
    pub fn key(&self) -> (i64, &str) {
        (self.first_seen, self.number.as_str())
    }
}

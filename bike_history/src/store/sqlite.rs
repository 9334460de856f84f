//! Diesel/SQLite implementation of [`StateStore`].

use std::collections::HashMap;

use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel::{SqliteConnection, sql_query};

use crate::db::connection::connect_sqlite;
use crate::models::{BikeInterval, Place, Rental};
use crate::schema::{bikes, places, rentals};
use crate::store::{
    SQLITE_MAX_VARIABLES, StateStore, StoreError, StoreResult, TableCounts, check_chunk_size,
};

/// Current interval per bike number: rank intervals by `first_seen` within each number.
const LATEST_BIKES_SQL: &str = "
    SELECT first_seen, last_seen, number, bike_type, place_id, active, state
    FROM (
        SELECT b.*,
               ROW_NUMBER() OVER (PARTITION BY b.number ORDER BY b.first_seen DESC) AS rn
        FROM bikes AS b
    )
    WHERE rn = 1";

const PLACE_COLUMNS: usize = 5;
const RENTAL_COLUMNS: usize = 4;
const BIKE_COLUMNS: usize = 7;

/// SQLite-backed store. Owns its connection; one store per ingestion run.
pub struct SqliteStore {
    conn: SqliteConnection,
    chunk_size: usize,
}

impl SqliteStore {
    /// Wrap an open connection. Fails when `chunk_size` is zero.
    pub fn new(conn: SqliteConnection, chunk_size: usize) -> StoreResult<Self> {
        Ok(Self {
            conn,
            chunk_size: check_chunk_size(chunk_size)?,
        })
    }

    /// Open `database_url` with the standard PRAGMAs (see [`connect_sqlite`]).
    ///
    /// Migrations are not run here; call [`crate::db::migrate::run_all`] first.
    pub fn open(database_url: &str, chunk_size: usize) -> anyhow::Result<Self> {
        let conn = connect_sqlite(database_url)?;
        Ok(Self::new(conn, chunk_size)?)
    }

    /// Direct access to the connection, e.g. for ad-hoc queries in tests.
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    fn rows_per_statement(&self, columns: usize) -> usize {
        self.chunk_size.min(SQLITE_MAX_VARIABLES / columns)
    }
}

impl StateStore for SqliteStore {
    fn unit_of_work<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<StoreError>,
    {
        // BEGIN IMMEDIATE takes the write lock up front, so the ordering check
        // and the writes that follow it cannot interleave with another writer.
        AnsiTransactionManager::begin_transaction_sql(&mut self.conn, "BEGIN IMMEDIATE")
            .map_err(StoreError::from)?;
        match f(self) {
            Ok(value) => {
                AnsiTransactionManager::commit_transaction(&mut self.conn)
                    .map_err(StoreError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = AnsiTransactionManager::rollback_transaction(&mut self.conn)
                {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    fn insert_places(&mut self, rows: &[Place]) -> StoreResult<usize> {
        let per_stmt = self.rows_per_statement(PLACE_COLUMNS);
        self.conn.transaction::<_, StoreError, _>(|conn| {
            let mut inserted = 0;
            for chunk in rows.chunks(per_stmt) {
                inserted += diesel::insert_into(places::table)
                    .values(chunk)
                    .on_conflict(places::id)
                    .do_nothing()
                    .execute(conn)?;
                tracing::debug!(rows = chunk.len(), inserted, "places chunk written");
            }
            Ok(inserted)
        })
    }

    fn insert_rentals(&mut self, rows: &[Rental]) -> StoreResult<usize> {
        let per_stmt = self.rows_per_statement(RENTAL_COLUMNS);
        self.conn.transaction::<_, StoreError, _>(|conn| {
            let mut inserted = 0;
            for chunk in rows.chunks(per_stmt) {
                inserted += diesel::insert_into(rentals::table)
                    .values(chunk)
                    .on_conflict((rentals::place_id, rentals::timestamp))
                    .do_nothing()
                    .execute(conn)?;
                tracing::debug!(rows = chunk.len(), inserted, "rentals chunk written");
            }
            Ok(inserted)
        })
    }

    fn upsert_bikes(&mut self, rows: &[BikeInterval]) -> StoreResult<usize> {
        let per_stmt = self.rows_per_statement(BIKE_COLUMNS);
        self.conn.transaction::<_, StoreError, _>(|conn| {
            let mut affected = 0;
            for chunk in rows.chunks(per_stmt) {
                affected += diesel::insert_into(bikes::table)
                    .values(chunk)
                    .on_conflict((bikes::first_seen, bikes::number))
                    .do_update()
                    .set(bikes::last_seen.eq(excluded(bikes::last_seen)))
                    .execute(conn)?;
                tracing::debug!(rows = chunk.len(), affected, "bikes chunk written");
            }
            Ok(affected)
        })
    }

    fn max_last_seen(&mut self) -> StoreResult<Option<i64>> {
        Ok(bikes::table
            .select(diesel::dsl::max(bikes::last_seen))
            .get_result::<Option<i64>>(&mut self.conn)?)
    }

    fn latest_bikes(&mut self) -> StoreResult<HashMap<String, BikeInterval>> {
        let rows = sql_query(LATEST_BIKES_SQL).load::<BikeInterval>(&mut self.conn)?;
        Ok(rows.into_iter().map(|b| (b.number.clone(), b)).collect())
    }

    fn bike_history(&mut self, number: &str) -> StoreResult<Vec<BikeInterval>> {
        Ok(bikes::table
            .filter(bikes::number.eq(number))
            .order(bikes::first_seen.asc())
            .select(BikeInterval::as_select())
            .load(&mut self.conn)?)
    }

    fn counts(&mut self) -> StoreResult<TableCounts> {
        Ok(TableCounts {
            places: places::table.count().get_result(&mut self.conn)?,
            rentals: rentals::table.count().get_result(&mut self.conn)?,
            bikes: bikes::table.count().get_result(&mut self.conn)?,
        })
    }
}

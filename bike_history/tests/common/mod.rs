#![allow(dead_code)]

use bike_history::db::{connection, migrate};
use bike_history::snapshot::{BikeRecord, PlaceRecord, Snapshot};
use bike_history::store::SqliteStore;
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Integer, Text};
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct Cnt {
    #[diesel(sql_type = BigInt)]
    cnt: i64,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_all(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn setup_store(chunk_size: usize) -> (TestDb, SqliteStore) {
    let (db, conn) = setup_db();
    let store = SqliteStore::new(conn, chunk_size).expect("store");
    (db, store)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal");

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);
}

pub fn count(conn: &mut SqliteConnection, table: &str) -> i64 {
    let c: Cnt = sql_query(format!("SELECT COUNT(*) AS cnt FROM {table}"))
        .get_result(conn)
        .unwrap();
    c.cnt
}

pub fn station(uid: i64, name: &str, bikes: i32) -> PlaceRecord {
    PlaceRecord {
        uid,
        name: name.into(),
        lng: 11.39 + uid as f64 / 1000.0,
        lat: 47.26,
        bikes,
        bikes_available_to_rent: bikes,
    }
}

pub fn bike(number: &str, state: &str, place_id: i64) -> BikeRecord {
    BikeRecord {
        number: number.into(),
        bike_type: 150,
        active: true,
        state: state.into(),
        place_id,
    }
}

/// Snapshot over stations 5 and 6 with the given bikes.
pub fn snapshot(timestamp: i64, bikes: Vec<BikeRecord>) -> Snapshot {
    Snapshot {
        timestamp,
        places: vec![station(5, "Hauptbahnhof", 2), station(6, "Uni", 0)],
        bikes,
    }
}

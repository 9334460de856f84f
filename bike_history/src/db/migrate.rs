//! Embedded schema migrations.

use anyhow::anyhow;
use diesel::{Connection, SqliteConnection, connection::SimpleConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::db::sqlite_path;

/// Embedded Diesel migrations bundled with this crate.
///
/// These are applied by [`run_sqlite`] to bring the database schema up to date.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Runs pending Diesel migrations on a SQLite database at the given URL.
///
/// Sets the journal mode to WAL and applies all embedded migrations, returning the
/// number of migrations that were applied.
pub fn run_sqlite(url: &str) -> anyhow::Result<usize> {
    let mut conn = SqliteConnection::establish(sqlite_path(url)?)?;
    conn.batch_execute("PRAGMA journal_mode=WAL;")?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!(e))?;

    for version in &applied {
        tracing::info!(%version, "applied migration");
    }
    Ok(applied.len())
}

/// Runs pending migrations for the given database URL.
///
/// Only SQLite is supported; URLs with other schemes are rejected before any
/// connection is attempted.
pub fn run_all(database_url: &str) -> anyhow::Result<usize> {
    sqlite_path(database_url)?;
    run_sqlite(database_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_on_temp_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let path = temp.path().to_string_lossy().to_string();

        let applied = run_sqlite(&path).expect("migration run");
        assert_eq!(applied, 1);

        // second run is a no-op
        assert_eq!(run_sqlite(&path).expect("rerun"), 0);

        let mut conn = SqliteConnection::establish(&path).unwrap();
        conn.batch_execute("INSERT INTO places (id, timestamp, name, lon, lat) VALUES (1, NULL, 'Hbf', 11.4, 47.26)")
            .unwrap();
    }

    #[test]
    fn postgres_urls_are_rejected() {
        let err = run_all("postgres://localhost/bikes").unwrap_err();
        assert!(err.to_string().contains("Unsupported"));
    }
}

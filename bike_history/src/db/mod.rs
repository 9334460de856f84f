//! Database utilities for connections and schema migrations.
//!
//! This module provides:
//! - SQLite connection helpers: [`connection::connect_sqlite`] applies WAL, foreign_keys=ON, and a 5000ms busy_timeout.
//! - Embedded Diesel migrations and runners: [`migrate::run_sqlite`] and [`migrate::run_all`],
//!   which validates the URL scheme first (`sqlite://`, `sqlite:` or a bare file path).
//!
//! Example:
//! ```no_run
//! use bike_history::db::{connection, migrate};
//!
//! let db_path = std::env::temp_dir().join("bike_history_example.db");
//! migrate::run_all(db_path.to_str().unwrap()).expect("migrations");
//!
//! let _conn = connection::connect_sqlite(db_path.to_str().unwrap()).expect("connect");
//! ```

pub mod connection;
pub mod migrate;

/// Resolve a database URL to the path handed to SQLite.
///
/// Accepts `sqlite://path`, `sqlite:path` and bare paths (including `:memory:`).
/// Server URLs (`postgres://`, `mysql://`) are rejected.
pub fn sqlite_path(database_url: &str) -> anyhow::Result<&str> {
    let url = database_url.trim();
    if let Some(rest) = url.strip_prefix("sqlite://") {
        return Ok(rest);
    }
    if let Some(rest) = url.strip_prefix("sqlite:") {
        return Ok(rest);
    }
    if url.contains("://") {
        anyhow::bail!("Unsupported DATABASE_URL: {database_url}");
    }
    if url.is_empty() {
        anyhow::bail!("DATABASE_URL is empty");
    }
    Ok(url)
}

//! Run configuration: parsing, environment overrides and validation.
//!
//! A TOML file describes where the database lives and where snapshot files are
//! found:
//!
//! ```toml
//! [database]
//! url = "sqlite://bikes.db"
//!
//! [ingest]
//! livedir = "data/live"
//! domain = "ib"
//! chunk_size = 500
//! loose_bike_pattern = '^BIKE\s+\d+$'
//! ```
//!
//! Only `ingest.livedir` is required. `DATABASE_URL` and `BIKE_HISTORY_CHUNK_SIZE`
//! override the file when set.
//!
//! Entrypoints:
//! - Parse + validate from a TOML string: [`load_config_str`]
//! - Parse + validate from a file path: [`load_config_path`]

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use shared_utils::env::{get_env_var_opt, parse_env_var_opt};

use crate::ingest::{DEFAULT_LOOSE_BIKE_PATTERN, IngestOptions, LooseBikeMatcher};
use crate::store::DEFAULT_CHUNK_SIZE;

/// Environment variable overriding [`DatabaseCfg::url`].
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
/// Environment variable overriding [`IngestCfg::chunk_size`].
pub const CHUNK_SIZE_VAR: &str = "BIKE_HISTORY_CHUNK_SIZE";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseCfg,
    /// Snapshot source and engine settings.
    pub ingest: IngestCfg,
}

/// Database settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseCfg {
    /// SQLite URL or path (`sqlite://bikes.db`, `sqlite:bikes.db`, `bikes.db`).
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseCfg {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Snapshot source and engine settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestCfg {
    /// Root of the dated snapshot tree.
    pub livedir: PathBuf,
    /// Only files named `<timestamp>_<domain>.json` are read when set.
    #[serde(default)]
    pub domain: Option<String>,
    /// Maximum rows per bulk statement.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Regex identifying loose-bike places by name.
    #[serde(default = "default_loose_bike_pattern")]
    pub loose_bike_pattern: String,
}

fn default_database_url() -> String {
    "sqlite://bike_history.db".to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_loose_bike_pattern() -> String {
    DEFAULT_LOOSE_BIKE_PATTERN.to_string()
}

impl Config {
    /// Replace values with `DATABASE_URL` / `BIKE_HISTORY_CHUNK_SIZE` when those are set.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Some(url) = get_env_var_opt(DATABASE_URL_VAR) {
            self.database.url = url;
        }
        if let Some(n) = parse_env_var_opt::<usize>(CHUNK_SIZE_VAR)? {
            self.ingest.chunk_size = n;
        }
        Ok(())
    }

    /// Check invariants that serde cannot express.
    ///
    /// Errors:
    /// - empty database URL or livedir
    /// - chunk size of zero
    /// - a loose-bike pattern that does not compile
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.trim().is_empty() {
            bail!("database.url cannot be empty");
        }
        if self.ingest.livedir.as_os_str().is_empty() {
            bail!("ingest.livedir cannot be empty");
        }
        if self.ingest.chunk_size == 0 {
            bail!("ingest.chunk_size must be at least 1");
        }
        if let Some(d) = &self.ingest.domain {
            if d.trim().is_empty() || d.contains('_') {
                bail!("ingest.domain must be non-empty and contain no '_': {d:?}");
            }
        }
        self.loose_bike_matcher()?;
        Ok(())
    }

    /// Compile the loose-bike matcher.
    pub fn loose_bike_matcher(&self) -> anyhow::Result<LooseBikeMatcher> {
        LooseBikeMatcher::new(&self.ingest.loose_bike_pattern)
            .with_context(|| format!("invalid loose_bike_pattern {:?}", self.ingest.loose_bike_pattern))
    }

    /// Engine options derived from this configuration.
    pub fn ingest_options(&self) -> anyhow::Result<IngestOptions> {
        Ok(IngestOptions {
            loose_bikes: self.loose_bike_matcher()?,
        })
    }
}

/// Parse and validate a configuration from TOML text (no environment overrides).
pub fn load_config_str(s: &str) -> anyhow::Result<Config> {
    let cfg: Config = toml::from_str(s).context("failed to parse configuration")?;
    cfg.validate()?;
    Ok(cfg)
}

/// Read a configuration file, apply environment overrides, then validate.
pub fn load_config_path(path: &Path) -> anyhow::Result<Config> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let mut cfg: Config =
        toml::from_str(&s).with_context(|| format!("failed to parse config {}", path.display()))?;
    cfg.apply_env_overrides()?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = load_config_str("[ingest]\nlivedir = \"live\"\n").unwrap();
        assert_eq!(cfg.database.url, "sqlite://bike_history.db");
        assert_eq!(cfg.ingest.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(cfg.ingest.domain, None);
        assert!(cfg.loose_bike_matcher().unwrap().is_loose("BIKE 123"));
    }

    #[test]
    fn full_config() {
        let cfg = load_config_str(
            r#"
[database]
url = "sqlite:/tmp/x.db"

[ingest]
livedir = "/srv/live"
domain = "ib"
chunk_size = 100
loose_bike_pattern = '^Rad \d+$'
"#,
        )
        .unwrap();
        assert_eq!(cfg.ingest.chunk_size, 100);
        assert_eq!(cfg.ingest.domain.as_deref(), Some("ib"));
        assert!(cfg.ingest_options().unwrap().loose_bikes.is_loose("Rad 7"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(load_config_str("[ingest]\nlivedir = \"live\"\nchunk_size = 0\n").is_err());
        assert!(load_config_str("[ingest]\nlivedir = \"live\"\nloose_bike_pattern = \"(\"\n").is_err());
        assert!(load_config_str("[ingest]\nlivedir = \"live\"\ndomain = \"a_b\"\n").is_err());
        assert!(load_config_str("[ingest]\nlivedir = \"live\"\nunknown = 1\n").is_err());
        assert!(load_config_str("[database]\nurl = \"x.db\"\n").is_err());
    }
}

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bike_history::config::{Config, DATABASE_URL_VAR, load_config_path};
use bike_history::db::migrate;
use bike_history::ingest::{ingest_all, ingest_snapshot};
use bike_history::source::{DirSource, SnapshotFile, read_snapshot, timestamp_from_path};
use bike_history::store::{SqliteStore, StateStore};

#[derive(Parser)]
#[command(version, about = "Bike-share history loader")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create or upgrade the database schema.
    Migrate {
        /// Database URL; falls back to $DATABASE_URL.
        #[arg(long)]
        database_url: Option<String>,
    },
    /// Ingest every snapshot file newer than the stored history, oldest first.
    Ingest {
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
        /// Read snapshots from this directory instead of `ingest.livedir`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Ingest a single snapshot file.
    Load {
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
        #[arg(long)]
        file: PathBuf,
        /// Capture time; derived from the file name when omitted.
        #[arg(long)]
        timestamp: Option<i64>,
    },
    /// Show the history watermark and table sizes.
    Status {
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
    },
}

fn open_store(cfg: &Config) -> Result<SqliteStore> {
    migrate::run_all(&cfg.database.url)?;
    SqliteStore::open(&cfg.database.url, cfg.ingest.chunk_size)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Migrate { database_url } => {
            let url = match database_url {
                Some(url) => url,
                None => shared_utils::env::get_env_var(DATABASE_URL_VAR)?,
            };
            let applied = migrate::run_all(&url)?;
            tracing::info!(applied, "schema up to date");
        }
        Cmd::Ingest { config, dir } => {
            let cfg = load_config_path(&config)?;
            let opts = cfg.ingest_options()?;
            let mut store = open_store(&cfg)?;

            let watermark = store.max_last_seen()?;
            let dir = dir.unwrap_or_else(|| cfg.ingest.livedir.clone());
            let source = DirSource::open(&dir, cfg.ingest.domain.as_deref(), watermark)?;
            tracing::info!(pending = source.remaining(), ?watermark, dir = %dir.display(), "starting ingestion");

            let run = ingest_all(&mut store, source, &opts)?;
            tracing::info!("{run}");
        }
        Cmd::Load {
            config,
            file,
            timestamp,
        } => {
            let cfg = load_config_path(&config)?;
            let opts = cfg.ingest_options()?;
            let mut store = open_store(&cfg)?;

            let timestamp = match timestamp {
                Some(ts) => ts,
                None => timestamp_from_path(&file)?,
            };
            let snapshot = read_snapshot(&SnapshotFile { timestamp, path: file })?;
            let report = ingest_snapshot(&mut store, &snapshot, &opts)?;
            tracing::info!("{report}");
        }
        Cmd::Status { config } => {
            let cfg = load_config_path(&config)?;
            let mut store = open_store(&cfg)?;
            let counts = store.counts()?;
            let watermark = store.max_last_seen()?;
            tracing::info!(
                ?watermark,
                places = counts.places,
                rentals = counts.rentals,
                bikes = counts.bikes,
                "status"
            );
        }
    }

    Ok(())
}

//! File-backed snapshot source.
//!
//! The downloader stores each capture as `<livedir>/YYYY/mm/dd/<timestamp>_<domain>.json`.
//! [`discover`] walks such a tree, derives each file's capture time from its name and
//! returns the files sorted by timestamp; [`DirSource`] then reads and parses them
//! lazily in that order.

use std::fs;
use std::path::{Path, PathBuf};

use crate::snapshot::{Snapshot, SnapshotError};

/// A snapshot file and the capture timestamp encoded in its name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotFile {
    /// Unix timestamp from the file name.
    pub timestamp: i64,
    /// Path to the JSON file.
    pub path: PathBuf,
}

/// Parse the leading `<timestamp>` of a `<timestamp>_<domain>.json` file name.
pub fn timestamp_from_path(path: &Path) -> Result<i64, SnapshotError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.split('_').next())
        .and_then(|ts| ts.parse::<i64>().ok())
        .ok_or_else(|| SnapshotError::FileName(path.to_path_buf()))
}

fn domain_matches(path: &Path, domain: Option<&str>) -> bool {
    let Some(domain) = domain else { return true };
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.split_once('_'))
        .is_some_and(|(_, d)| d == domain)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), SnapshotError> {
    let io_err = |source| SnapshotError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if path.extension().is_some_and(|e| e == "json") {
            out.push(path);
        }
    }
    Ok(())
}

/// Find snapshot files below `dir`, optionally restricted to one domain, sorted by timestamp.
///
/// JSON files whose names carry no timestamp are skipped with a warning.
pub fn discover(dir: &Path, domain: Option<&str>) -> Result<Vec<SnapshotFile>, SnapshotError> {
    let mut paths = Vec::new();
    walk(dir, &mut paths)?;

    let mut files: Vec<SnapshotFile> = paths
        .into_iter()
        .filter(|p| domain_matches(p, domain))
        .filter_map(|path| match timestamp_from_path(&path) {
            Ok(timestamp) => Some(SnapshotFile { timestamp, path }),
            Err(_) => {
                tracing::warn!(path = %path.display(), "skipping file without timestamp");
                None
            }
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Read and parse one snapshot file.
pub fn read_snapshot(file: &SnapshotFile) -> Result<Snapshot, SnapshotError> {
    let body = fs::read_to_string(&file.path).map_err(|source| SnapshotError::Io {
        path: file.path.clone(),
        source,
    })?;
    Snapshot::from_json_str(file.timestamp, &body)
}

/// Ordered, lazily parsed snapshots from a directory tree.
#[derive(Debug)]
pub struct DirSource {
    files: std::vec::IntoIter<SnapshotFile>,
}

impl DirSource {
    /// Discover snapshot files under `dir`, keeping only those newer than `after`.
    ///
    /// Passing the store's watermark as `after` makes a re-run pick up where the
    /// previous one stopped.
    pub fn open(dir: &Path, domain: Option<&str>, after: Option<i64>) -> Result<Self, SnapshotError> {
        let mut files = discover(dir, domain)?;
        if let Some(watermark) = after {
            let before = files.len();
            files.retain(|f| f.timestamp > watermark);
            tracing::debug!(skipped = before - files.len(), watermark, "already ingested files skipped");
        }
        Ok(Self::from_files(files))
    }

    /// Iterate over an explicit, already ordered list of files.
    pub fn from_files(files: Vec<SnapshotFile>) -> Self {
        Self {
            files: files.into_iter(),
        }
    }

    /// Files not yet yielded.
    pub fn remaining(&self) -> usize {
        self.files.len()
    }
}

impl Iterator for DirSource {
    type Item = Result<Snapshot, SnapshotError>;

    fn next(&mut self) -> Option<Self::Item> {
        let file = self.files.next()?;
        tracing::debug!(path = %file.path.display(), timestamp = file.timestamp, "reading snapshot");
        Some(read_snapshot(&file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_comes_from_file_name() {
        let p = Path::new("live/2024/05/01/1714521600_ib.json");
        assert_eq!(timestamp_from_path(p).unwrap(), 1_714_521_600);
        assert!(timestamp_from_path(Path::new("live/latest.json")).is_err());
    }

    #[test]
    fn domain_filter() {
        let p = Path::new("1714521600_ib.json");
        assert!(domain_matches(p, None));
        assert!(domain_matches(p, Some("ib")));
        assert!(!domain_matches(p, Some("wr")));
    }
}

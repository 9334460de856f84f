use std::fmt;

use chrono::DateTime;

/// What one snapshot contributed to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    /// Snapshot timestamp.
    pub timestamp: i64,
    /// Place rows inserted (existing ids are skipped).
    pub places_inserted: usize,
    /// Rental rows inserted.
    pub rentals_inserted: usize,
    /// Intervals opened for bikes never seen before.
    pub bikes_new: usize,
    /// Intervals opened because a bike's state changed.
    pub bikes_changed: usize,
    /// Intervals extended to this snapshot.
    pub bikes_continued: usize,
    /// Repeated bike numbers dropped from the snapshot.
    pub bikes_duplicate: usize,
}

impl SnapshotReport {
    /// Bikes written by this snapshot.
    pub fn bikes_total(&self) -> usize {
        self.bikes_new + self.bikes_changed + self.bikes_continued
    }
}

impl fmt::Display for SnapshotReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::from_timestamp(self.timestamp, 0) {
            Some(at) => write!(f, "{} ({})", self.timestamp, at.format("%Y-%m-%d %H:%M:%SZ"))?,
            None => write!(f, "{}", self.timestamp)?,
        }
        write!(
            f,
            ": +{} places, +{} rentals, bikes {} new / {} changed / {} continued",
            self.places_inserted,
            self.rentals_inserted,
            self.bikes_new,
            self.bikes_changed,
            self.bikes_continued
        )
    }
}

/// Summary of a whole ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Per-snapshot reports in processing order.
    pub snapshots: Vec<SnapshotReport>,
}

impl RunReport {
    /// Timestamp of the last committed snapshot.
    pub fn last_timestamp(&self) -> Option<i64> {
        self.snapshots.last().map(|s| s.timestamp)
    }

    /// Field-wise sum of all snapshot reports (timestamp is the last one).
    pub fn totals(&self) -> SnapshotReport {
        self.snapshots
            .iter()
            .fold(SnapshotReport::default(), |acc, s| SnapshotReport {
                timestamp: s.timestamp,
                places_inserted: acc.places_inserted + s.places_inserted,
                rentals_inserted: acc.rentals_inserted + s.rentals_inserted,
                bikes_new: acc.bikes_new + s.bikes_new,
                bikes_changed: acc.bikes_changed + s.bikes_changed,
                bikes_continued: acc.bikes_continued + s.bikes_continued,
                bikes_duplicate: acc.bikes_duplicate + s.bikes_duplicate,
            })
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.snapshots.is_empty() {
            return write!(f, "no snapshots ingested");
        }
        let t = self.totals();
        write!(
            f,
            "{} snapshots up to {}: +{} places, +{} rentals, bikes {} new / {} changed / {} continued",
            self.snapshots.len(),
            t.timestamp,
            t.places_inserted,
            t.rentals_inserted,
            t.bikes_new,
            t.bikes_changed,
            t.bikes_continued
        )
    }
}

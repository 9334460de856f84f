//! Snapshot → place/rental rows.

use regex::Regex;

use crate::models::{Place, Rental};
use crate::snapshot::Snapshot;

/// Name pattern of the synthetic places nextbike reports for bikes parked
/// outside a station (e.g. "BIKE 30123").
pub const DEFAULT_LOOSE_BIKE_PATTERN: &str = r"^BIKE\s+\d+$";

/// Decides whether a place name denotes a loose bike rather than a station.
#[derive(Debug, Clone)]
pub struct LooseBikeMatcher(Regex);

impl LooseBikeMatcher {
    /// Compile a matcher from a regular expression.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self(Regex::new(pattern)?))
    }

    /// True when `name` is a loose-bike pseudo place.
    pub fn is_loose(&self, name: &str) -> bool {
        self.0.is_match(name.trim())
    }
}

impl Default for LooseBikeMatcher {
    fn default() -> Self {
        Self(Regex::new(DEFAULT_LOOSE_BIKE_PATTERN).expect("default pattern compiles"))
    }
}

/// One place row per place entry. Loose bikes carry the snapshot timestamp.
pub fn place_rows(snapshot: &Snapshot, loose: &LooseBikeMatcher) -> Vec<Place> {
    snapshot
        .places
        .iter()
        .map(|p| Place {
            id: p.uid,
            timestamp: loose.is_loose(&p.name).then_some(snapshot.timestamp),
            name: p.name.clone(),
            lon: p.lng,
            lat: p.lat,
        })
        .collect()
}

/// One rental row per place entry, stamped with the snapshot timestamp.
pub fn rental_rows(snapshot: &Snapshot) -> Vec<Rental> {
    snapshot
        .places
        .iter()
        .map(|p| Rental {
            place_id: p.uid,
            timestamp: snapshot.timestamp,
            bikes: p.bikes,
            available: p.bikes_available_to_rent,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::PlaceRecord;

    fn record(uid: i64, name: &str) -> PlaceRecord {
        PlaceRecord {
            uid,
            name: name.into(),
            lng: 11.39,
            lat: 47.27,
            bikes: 4,
            bikes_available_to_rent: 3,
        }
    }

    #[test]
    fn loose_bikes_get_the_snapshot_timestamp() {
        let snap = Snapshot {
            timestamp: 1_700_000_000,
            places: vec![record(1, "Marktplatz"), record(2, "BIKE 30123")],
            bikes: vec![],
        };
        let rows = place_rows(&snap, &LooseBikeMatcher::default());
        assert_eq!(rows[0].timestamp, None);
        assert_eq!(rows[1].timestamp, Some(1_700_000_000));
        assert_eq!((rows[1].lon, rows[1].lat), (11.39, 47.27));
    }

    #[test]
    fn rentals_copy_counts() {
        let snap = Snapshot {
            timestamp: 42,
            places: vec![record(9, "Technik")],
            bikes: vec![],
        };
        assert_eq!(
            rental_rows(&snap),
            vec![Rental { place_id: 9, timestamp: 42, bikes: 4, available: 3 }]
        );
    }

    #[test]
    fn custom_pattern() {
        let m = LooseBikeMatcher::new(r"^Freies Rad").unwrap();
        assert!(m.is_loose("Freies Rad 12"));
        assert!(!m.is_loose("BIKE 12"));
        assert!(LooseBikeMatcher::new("(").is_err());
    }
}

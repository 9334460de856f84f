//! In-memory implementation of [`StateStore`].
//!
//! Intervals live in an ordered map keyed by `(first_seen, number)`; a second
//! index maps each bike number to the `first_seen` of its current interval, so
//! [`StateStore::latest_bikes`] never scans the history.

use std::collections::{BTreeMap, HashMap};

use crate::models::{BikeInterval, Place, Rental};
use crate::store::{StateStore, StoreError, StoreResult, TableCounts};

/// Volatile store backed by ordered maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    places: BTreeMap<i64, Place>,
    rentals: BTreeMap<(i64, i64), Rental>,
    bikes: BTreeMap<(i64, String), BikeInterval>,
    current: HashMap<String, i64>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_places(&self, table: &'static str, ids: impl IntoIterator<Item = i64>) -> StoreResult<()> {
        for place_id in ids {
            if !self.places.contains_key(&place_id) {
                return Err(StoreError::MissingPlace { table, place_id });
            }
        }
        Ok(())
    }
}

impl StateStore for MemoryStore {
    fn unit_of_work<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<StoreError>,
    {
        let before = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = before;
        }
        result
    }

    fn insert_places(&mut self, rows: &[Place]) -> StoreResult<usize> {
        let mut inserted = 0;
        for row in rows {
            if !self.places.contains_key(&row.id) {
                self.places.insert(row.id, row.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn insert_rentals(&mut self, rows: &[Rental]) -> StoreResult<usize> {
        // checked up front so a bad row leaves the batch unapplied
        self.ensure_places("rentals", rows.iter().map(|r| r.place_id))?;
        let mut inserted = 0;
        for row in rows {
            let key = (row.place_id, row.timestamp);
            if !self.rentals.contains_key(&key) {
                self.rentals.insert(key, row.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn upsert_bikes(&mut self, rows: &[BikeInterval]) -> StoreResult<usize> {
        self.ensure_places("bikes", rows.iter().map(|r| r.place_id))?;
        for row in rows {
            let (first_seen, number) = row.key();
            let key = (first_seen, number.to_string());
            match self.bikes.get_mut(&key) {
                Some(existing) => existing.last_seen = row.last_seen,
                None => {
                    self.bikes.insert(key, row.clone());
                    let current = self.current.entry(row.number.clone()).or_insert(row.first_seen);
                    *current = (*current).max(row.first_seen);
                }
            }
        }
        Ok(rows.len())
    }

    fn max_last_seen(&mut self) -> StoreResult<Option<i64>> {
        Ok(self.bikes.values().map(|b| b.last_seen).max())
    }

    fn latest_bikes(&mut self) -> StoreResult<HashMap<String, BikeInterval>> {
        Ok(self
            .current
            .iter()
            .filter_map(|(number, first_seen)| {
                self.bikes
                    .get(&(*first_seen, number.clone()))
                    .map(|b| (number.clone(), b.clone()))
            })
            .collect())
    }

    fn bike_history(&mut self, number: &str) -> StoreResult<Vec<BikeInterval>> {
        // map order is (first_seen, number), so the filtered values come out sorted
        Ok(self
            .bikes
            .values()
            .filter(|b| b.number == number)
            .cloned()
            .collect())
    }

    fn counts(&mut self) -> StoreResult<TableCounts> {
        Ok(TableCounts {
            places: self.places.len() as i64,
            rentals: self.rentals.len() as i64,
            bikes: self.bikes.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(id: i64) -> Place {
        Place {
            id,
            timestamp: None,
            name: format!("Station {id}"),
            lon: 11.4,
            lat: 47.26,
        }
    }

    fn interval(first_seen: i64, last_seen: i64, number: &str, state: &str) -> BikeInterval {
        BikeInterval {
            first_seen,
            last_seen,
            number: number.into(),
            bike_type: 150,
            place_id: 5,
            active: true,
            state: state.into(),
        }
    }

    #[test]
    fn duplicate_places_and_rentals_are_ignored() {
        let mut store = MemoryStore::new();
        assert_eq!(store.insert_places(&[place(5), place(5)]).unwrap(), 1);
        let moved = Place { lon: 0.0, ..place(5) };
        assert_eq!(store.insert_places(&[moved]).unwrap(), 0);

        let rental = Rental { place_id: 5, timestamp: 100, bikes: 3, available: 2 };
        assert_eq!(store.insert_rentals(&[rental.clone(), rental.clone()]).unwrap(), 1);
        assert_eq!(store.insert_rentals(&[rental]).unwrap(), 0);
        assert_eq!(store.counts().unwrap(), TableCounts { places: 1, rentals: 1, bikes: 0 });
    }

    #[test]
    fn upsert_only_advances_last_seen_on_conflict() {
        let mut store = MemoryStore::new();
        store.insert_places(&[place(5)]).unwrap();
        store.upsert_bikes(&[interval(100, 100, "111", "ok")]).unwrap();
        // same key, different payload: only last_seen moves
        store.upsert_bikes(&[interval(100, 200, "111", "fix")]).unwrap();

        let history = store.bike_history("111").unwrap();
        assert_eq!(history, vec![interval(100, 200, "111", "ok")]);
        assert_eq!(store.max_last_seen().unwrap(), Some(200));
    }

    #[test]
    fn latest_tracks_greatest_first_seen() {
        let mut store = MemoryStore::new();
        store.insert_places(&[place(5)]).unwrap();
        store
            .upsert_bikes(&[interval(300, 300, "111", "fix"), interval(100, 200, "111", "ok")])
            .unwrap();
        let latest = store.latest_bikes().unwrap();
        assert_eq!(latest["111"], interval(300, 300, "111", "fix"));
    }

    #[test]
    fn unknown_place_fails_whole_batch() {
        let mut store = MemoryStore::new();
        store.insert_places(&[place(5)]).unwrap();
        let mut stray = interval(100, 100, "222", "ok");
        stray.place_id = 99;
        let err = store
            .upsert_bikes(&[interval(100, 100, "111", "ok"), stray])
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingPlace { table: "bikes", place_id: 99 }));
        assert_eq!(store.counts().unwrap().bikes, 0);
    }

    #[test]
    fn history_is_keyed_by_first_seen_and_number() {
        let mut store = MemoryStore::new();
        store.insert_places(&[place(5)]).unwrap();
        let a = interval(100, 100, "111", "ok");
        let b = interval(100, 100, "222", "ok");
        assert_eq!(a.key(), (100, "111"));
        assert_ne!(a.key(), b.key());
        store.upsert_bikes(&[a, b]).unwrap();
        assert_eq!(store.counts().unwrap().bikes, 2);
    }

    #[test]
    fn failed_unit_of_work_restores_state() {
        let mut store = MemoryStore::new();
        let res: Result<(), StoreError> = store.unit_of_work(|s| {
            s.insert_places(&[place(1)])?;
            Err(StoreError::ChunkSize(0))
        });
        assert!(res.is_err());
        assert_eq!(store.counts().unwrap().places, 0);
    }
}

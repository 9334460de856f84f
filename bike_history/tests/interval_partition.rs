//! Property: for every bike number, the stored intervals are an exact,
//! non-overlapping compaction of the snapshots in which the bike appeared.

mod common;
use common::{bike, setup_store, snapshot};

use std::collections::BTreeMap;

use bike_history::ingest::{IngestOptions, ingest_snapshot};
use bike_history::snapshot::BikeRecord;
use bike_history::store::{MemoryStore, StateStore};
use proptest::prelude::*;

const NUMBERS: [&str; 4] = ["101", "102", "103", "104"];

/// Per snapshot: a time gap and, per bike number, either absence or (state, place).
fn steps() -> impl Strategy<Value = Vec<(i64, Vec<Option<(bool, i64)>>)>> {
    let presence = prop::option::of((any::<bool>(), prop_oneof![Just(5i64), Just(6i64)]));
    prop::collection::vec(
        (1i64..1_000, prop::collection::vec(presence, NUMBERS.len())),
        1..12,
    )
}

type Expected = BTreeMap<String, Vec<(i64, i64, bool, i64)>>;

fn run<S: StateStore>(store: &mut S, steps: &[(i64, Vec<Option<(bool, i64)>>)]) -> Expected {
    let opts = IngestOptions::default();
    let mut expected: Expected = BTreeMap::new();
    let mut t = 1_700_000_000;

    for (gap, presence) in steps {
        t += gap;
        let mut bikes: Vec<BikeRecord> = Vec::new();
        for (number, slot) in NUMBERS.iter().zip(presence) {
            let Some((broken, place)) = *slot else { continue };
            bikes.push(bike(number, if broken { "fix" } else { "ok" }, place));

            let intervals = expected.entry(number.to_string()).or_default();
            match intervals.last_mut() {
                Some(last) if last.2 == broken && last.3 == place => last.1 = t,
                _ => intervals.push((t, t, broken, place)),
            }
        }
        ingest_snapshot(store, &snapshot(t, bikes), &opts).expect("ingest");
    }
    expected
}

fn check<S: StateStore>(store: &mut S, expected: &Expected) {
    for number in NUMBERS {
        let got: Vec<_> = store
            .bike_history(number)
            .unwrap()
            .into_iter()
            .map(|b| (b.first_seen, b.last_seen, b.state == "fix", b.place_id))
            .collect();
        let want = expected.get(number).cloned().unwrap_or_default();
        assert_eq!(got, want, "bike {number}");

        for pair in got.windows(2) {
            assert!(pair[0].1 < pair[1].0, "overlapping intervals for {number}: {pair:?}");
        }
    }
}

proptest! {
    #[test]
    fn memory_store_intervals_partition_observations(steps in steps()) {
        let mut store = MemoryStore::new();
        let expected = run(&mut store, &steps);
        check(&mut store, &expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn sqlite_store_intervals_partition_observations(steps in steps()) {
        let (_db, mut store) = setup_store(3);
        let expected = run(&mut store, &steps);
        check(&mut store, &expected);
    }
}

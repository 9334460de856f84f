//! Parsed snapshot documents.
//!
//! A [`Snapshot`] is one capture of the network: every place with its rental
//! counts and every bike with its current place and status. The capture time is
//! not part of the JSON body; callers attach it (see [`crate::source`]).
//!
//! Two document shapes are accepted by [`Snapshot::from_value`]:
//! - the flat shape, with top-level `places` and `bikes` arrays (both required);
//! - the nextbike live API document (`countries[].cities[].places[]`), where bikes
//!   are nested in each place's `bike_list` and inherit that place's `uid`.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// Longest status code the `bikes.state` column accepts.
pub const MAX_STATE_LEN: usize = 5;

/// Errors raised while reading or validating a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The body is not valid JSON or does not match the expected record layout.
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required top-level key is absent.
    #[error("snapshot has no `{0}` key")]
    MissingKey(&'static str),

    /// A record carries a value the store cannot hold.
    #[error("invalid {field} in bike {number:?}: {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Bike number of the offending record.
        number: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The file name does not start with a Unix timestamp.
    #[error("cannot derive a timestamp from file name {0}")]
    FileName(PathBuf),
}

/// A place entry: a station or a loose-bike drop point, with its rental counts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaceRecord {
    /// External place identifier.
    pub uid: i64,
    /// Display name.
    pub name: String,
    /// Longitude.
    pub lng: f64,
    /// Latitude.
    pub lat: f64,
    /// Bikes physically present.
    pub bikes: i32,
    /// Bikes that can be rented right now.
    pub bikes_available_to_rent: i32,
}

/// A bike entry with the attributes tracked by the interval history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BikeRecord {
    /// Bike number; the feed sends integers or strings, both normalized to text.
    #[serde(deserialize_with = "bike_number")]
    pub number: String,
    /// Bike type code.
    pub bike_type: i32,
    /// Whether the bike is active.
    pub active: bool,
    /// Short status code.
    pub state: String,
    /// Place the bike is reported at.
    pub place_id: i64,
}

/// One timestamped capture of all places and bikes.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Unix timestamp of the capture.
    pub timestamp: i64,
    /// All places in the capture.
    pub places: Vec<PlaceRecord>,
    /// All bikes in the capture.
    pub bikes: Vec<BikeRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberRepr {
    Int(i64),
    Text(String),
}

fn bike_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match NumberRepr::deserialize(deserializer)? {
        NumberRepr::Int(n) => n.to_string(),
        NumberRepr::Text(s) => s.trim().to_string(),
    })
}

#[derive(Deserialize)]
struct FlatDocument {
    places: Vec<PlaceRecord>,
    bikes: Vec<BikeRecord>,
}

#[derive(Deserialize)]
struct LiveDocument {
    countries: Vec<LiveCountry>,
}

#[derive(Deserialize)]
struct LiveCountry {
    #[serde(default)]
    cities: Vec<LiveCity>,
}

#[derive(Deserialize)]
struct LiveCity {
    #[serde(default)]
    places: Vec<LivePlace>,
}

#[derive(Deserialize)]
struct LivePlace {
    uid: i64,
    name: String,
    lng: f64,
    lat: f64,
    bikes: i32,
    bikes_available_to_rent: i32,
    #[serde(default)]
    bike_list: Vec<LiveBike>,
}

#[derive(Deserialize)]
struct LiveBike {
    #[serde(deserialize_with = "bike_number")]
    number: String,
    bike_type: i32,
    active: bool,
    state: String,
}

impl Snapshot {
    /// Parse a JSON body captured at `timestamp`.
    pub fn from_json_str(timestamp: i64, body: &str) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_str(body)?;
        Self::from_value(timestamp, value)
    }

    /// Build a snapshot from an already-parsed JSON document.
    pub fn from_value(timestamp: i64, value: Value) -> Result<Self, SnapshotError> {
        if value.get("countries").is_some() {
            let doc: LiveDocument = serde_json::from_value(value)?;
            return Ok(Self::from_live(timestamp, doc));
        }
        for key in ["places", "bikes"] {
            if value.get(key).is_none() {
                return Err(SnapshotError::MissingKey(key));
            }
        }
        let doc: FlatDocument = serde_json::from_value(value)?;
        Ok(Self {
            timestamp,
            places: doc.places,
            bikes: doc.bikes,
        })
    }

    fn from_live(timestamp: i64, doc: LiveDocument) -> Self {
        let mut places = Vec::new();
        let mut bikes = Vec::new();
        for place in doc
            .countries
            .into_iter()
            .flat_map(|c| c.cities)
            .flat_map(|c| c.places)
        {
            bikes.extend(place.bike_list.into_iter().map(|b| BikeRecord {
                number: b.number,
                bike_type: b.bike_type,
                active: b.active,
                state: b.state,
                place_id: place.uid,
            }));
            places.push(PlaceRecord {
                uid: place.uid,
                name: place.name,
                lng: place.lng,
                lat: place.lat,
                bikes: place.bikes,
                bikes_available_to_rent: place.bikes_available_to_rent,
            });
        }
        Self {
            timestamp,
            places,
            bikes,
        }
    }

    /// Reject records the store would refuse, before anything is written.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        for bike in &self.bikes {
            if bike.number.is_empty() {
                return Err(SnapshotError::InvalidField {
                    field: "number",
                    number: bike.number.clone(),
                    reason: "empty bike number".into(),
                });
            }
            if bike.state.chars().count() > MAX_STATE_LEN {
                return Err(SnapshotError::InvalidField {
                    field: "state",
                    number: bike.number.clone(),
                    reason: format!("{:?} is longer than {MAX_STATE_LEN} characters", bike.state),
                });
            }
        }
        Ok(())
    }
}

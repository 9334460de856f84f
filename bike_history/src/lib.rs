//! Incremental history of a bike-share network.
//!
//! Snapshots of a network's live status (places, rental counts, bikes) are
//! applied in capture order to a relational store. Places and rentals are
//! append-only facts; each bike's history is compacted into intervals
//! `[first_seen, last_seen]` of constant state (see [`ingest`]).

#![deny(missing_docs)]

pub mod config;
pub mod db;
pub mod ingest;
pub mod models;
#[allow(missing_docs)]
pub mod schema;
pub mod snapshot;
pub mod source;
pub mod store;

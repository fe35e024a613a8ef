//! Beacon Proximity - signal stabilization for BLE beacon sightings
//!
//! Turns a noisy stream of raw beacon sightings into stable found/lost
//! events: a TTL cache keyed by beacon identity, distance estimation,
//! proximity classification and an aggregator that decides when a beacon is
//! reported.

pub mod api;
pub mod beacon;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use beacon::{Beacon, BeaconAggregator, BeaconDelegate, BeaconKind, Proximity, RawSighting};
pub use cache::TtlCache;
pub use config::{Config, ScanSettings};
pub use error::{BeaconError, Result};
pub use tasks::spawn_sweep_task;

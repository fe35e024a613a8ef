//! Beacon Module
//!
//! Domain types and the stabilization pipeline: sightings come in, distance
//! and proximity are estimated, readings are merged per identity and the
//! host is told when a beacon is found or lost.

mod aggregator;
mod delegate;
mod distance;
mod location;
mod model;
mod proximity;
mod sighting;
mod stats;

pub use aggregator::{BeaconAggregator, TAG_STATE, TAG_TYPE};
pub use delegate::{BeaconDelegate, BeaconEvent, EventLog, NoopDelegate};
pub use distance::{estimate_distance, CurveFittedDistanceCalculator, UNKNOWN_DISTANCE};
pub use location::{Coordinate, LocationFix, LocationTracker};
pub use model::{Beacon, BeaconState, MergeOutcome};
pub use proximity::{Proximity, FAR_RADIUS, IMMEDIATE_RADIUS, NEAR_RADIUS, UNKNOWN_RADIUS};
pub use sighting::{
    Advertisement, BeaconKind, RawSighting, SERVICE_EDDYSTONE, SERVICE_SECURECAST, SERVICE_TILE,
};
pub use stats::AggregatorStats;

//! Response DTOs for the debug API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::HashMap;

use serde::Serialize;

use crate::beacon::{AggregatorStats, Beacon, BeaconEvent, MergeOutcome};

/// Response body for POST /sightings
#[derive(Debug, Clone, Serialize)]
pub struct SightingResponse {
    /// Whether the sighting reached the cache
    pub accepted: bool,
    /// Identity the sighting was keyed by
    pub identity: Option<String>,
    /// How the sighting merged, absent when dropped
    pub outcome: Option<MergeOutcome>,
}

impl SightingResponse {
    pub fn accepted(identity: impl Into<String>, outcome: MergeOutcome) -> Self {
        Self {
            accepted: true,
            identity: Some(identity.into()),
            outcome: Some(outcome),
        }
    }

    pub fn dropped(identity: Option<String>) -> Self {
        Self {
            accepted: false,
            identity,
            outcome: None,
        }
    }
}

/// Response body for the beacon listings (GET /beacons, /beacons/reported,
/// /beacons/export)
#[derive(Debug, Clone, Serialize)]
pub struct BeaconsResponse {
    pub count: usize,
    pub beacons: HashMap<String, Beacon>,
}

impl BeaconsResponse {
    pub fn new(beacons: HashMap<String, Beacon>) -> Self {
        Self {
            count: beacons.len(),
            beacons,
        }
    }
}

/// Generic acknowledgement carrying a message and the identity or count it
/// concerns.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn evicted(identity: &str) -> Self {
        Self {
            message: format!("Beacon '{}' evicted", identity),
        }
    }

    pub fn imported(count: usize) -> Self {
        Self {
            message: format!("Imported {} beacons", count),
        }
    }

    pub fn location_updated(current: bool) -> Self {
        let message = if current {
            "Location updated"
        } else {
            "Location recorded but already stale"
        };
        Self {
            message: message.to_string(),
        }
    }

    pub fn settings_updated() -> Self {
        Self {
            message: "Settings updated".to_string(),
        }
    }
}

/// Response body for GET /events
#[derive(Debug, Clone, Serialize)]
pub struct EventsResponse {
    pub count: usize,
    pub events: Vec<BeaconEvent>,
}

impl EventsResponse {
    pub fn new(events: Vec<BeaconEvent>) -> Self {
        Self {
            count: events.len(),
            events,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub pipeline: AggregatorStats,
    /// Cache hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(pipeline: AggregatorStats) -> Self {
        Self {
            hit_rate: pipeline.cache.hit_rate(),
            pipeline,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

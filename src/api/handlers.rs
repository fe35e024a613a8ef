//! API Handlers
//!
//! HTTP request handlers for each debug API endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use tracing::debug;

use crate::beacon::{Beacon, BeaconAggregator, EventLog};
use crate::config::Config;
use crate::error::{BeaconError, Result};
use crate::models::{
    BeaconsResponse, EventsResponse, HealthResponse, LocationRequest, MessageResponse,
    SettingsPayload, SightingRequest, SightingResponse, StatsResponse,
};

/// Number of delegate events the debug API keeps.
const EVENT_LOG_CAPACITY: usize = 512;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Signal-stabilization pipeline
    pub aggregator: BeaconAggregator,
    /// Delegate recording found/lost notifications
    pub events: Arc<EventLog>,
}

impl AppState {
    /// Creates a new AppState around an aggregator reporting to `events`.
    pub fn new(aggregator: BeaconAggregator, events: Arc<EventLog>) -> Self {
        Self { aggregator, events }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Fails when the configured scan settings are invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let events = Arc::new(EventLog::new(EVENT_LOG_CAPACITY));
        let aggregator = BeaconAggregator::new(config.scan.clone(), events.clone())?;
        Ok(Self::new(aggregator, events))
    }
}

/// Handler for POST /sightings
///
/// Feeds one raw sighting to the aggregator. Dropped sightings are not an
/// error; the response says whether it was accepted.
pub async fn sighting_handler(
    State(state): State<AppState>,
    Json(req): Json<SightingRequest>,
) -> Result<Json<SightingResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(BeaconError::InvalidRequest(error_msg));
    }

    let sighting = req.into_sighting(Utc::now());
    let identity = sighting.identity();
    let response = match (state.aggregator.process_sighting(sighting), identity) {
        (Some(outcome), Some(identity)) => SightingResponse::accepted(identity, outcome),
        (_, identity) => SightingResponse::dropped(identity),
    };

    Ok(Json(response))
}

/// Handler for PUT /location
pub async fn location_handler(
    State(state): State<AppState>,
    Json(req): Json<LocationRequest>,
) -> Result<Json<MessageResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(BeaconError::InvalidRequest(error_msg));
    }

    state.aggregator.update_location(req.into_fix(Utc::now()));
    Ok(Json(MessageResponse::location_updated(
        state.aggregator.has_current_location(),
    )))
}

/// Handler for GET /beacons
pub async fn beacons_handler(State(state): State<AppState>) -> Json<BeaconsResponse> {
    Json(BeaconsResponse::new(state.aggregator.beacons()))
}

/// Handler for GET /beacons/reported
pub async fn reported_handler(State(state): State<AppState>) -> Json<BeaconsResponse> {
    Json(BeaconsResponse::new(state.aggregator.reported()))
}

/// Handler for GET /beacons/:identity
pub async fn beacon_handler(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<Beacon>> {
    state
        .aggregator
        .beacon(&identity)
        .map(Json)
        .ok_or(BeaconError::NotFound(identity))
}

/// Handler for GET /beacons/export
///
/// Returns the bare identity → beacon mapping accepted by the import
/// endpoint.
pub async fn export_handler(State(state): State<AppState>) -> Json<HashMap<String, Beacon>> {
    Json(state.aggregator.export())
}

/// Handler for POST /beacons/import
pub async fn import_handler(
    State(state): State<AppState>,
    Json(beacons): Json<HashMap<String, Beacon>>,
) -> Result<Json<MessageResponse>> {
    if let Some(key) = beacons.keys().find(|key| key.trim().is_empty()) {
        return Err(BeaconError::InvalidRequest(format!(
            "Invalid beacon identity '{}'",
            key
        )));
    }
    if let Some((key, beacon)) = beacons.iter().find(|(key, beacon)| **key != beacon.identity) {
        return Err(BeaconError::InvalidRequest(format!(
            "Key '{}' does not match beacon identity '{}'",
            key, beacon.identity
        )));
    }

    let count = state.aggregator.import(beacons);
    debug!(count, "beacons imported");

    Ok(Json(MessageResponse::imported(count)))
}

/// Handler for DELETE /beacons/:identity
///
/// Evicts the beacon without a lost notification.
pub async fn evict_handler(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<MessageResponse>> {
    if !state.aggregator.evict(&identity) {
        return Err(BeaconError::NotFound(identity));
    }
    Ok(Json(MessageResponse::evicted(&identity)))
}

/// Handler for GET /events
pub async fn events_handler(State(state): State<AppState>) -> Json<EventsResponse> {
    Json(EventsResponse::new(state.events.events()))
}

/// Handler for GET /settings
pub async fn get_settings_handler(State(state): State<AppState>) -> Json<SettingsPayload> {
    Json(SettingsPayload::from(&state.aggregator.settings()))
}

/// Handler for PUT /settings
pub async fn put_settings_handler(
    State(state): State<AppState>,
    Json(req): Json<SettingsPayload>,
) -> Result<Json<MessageResponse>> {
    state.aggregator.update_settings(req.into())?;
    Ok(Json(MessageResponse::settings_updated()))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.aggregator.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

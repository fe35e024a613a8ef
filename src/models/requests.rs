//! Request DTOs for the debug API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::beacon::{
    Advertisement, Coordinate, CurveFittedDistanceCalculator, LocationFix, RawSighting, SERVICE_EDDYSTONE,
};
use crate::config::ScanSettings;

/// Longest identifier accepted from a scanner.
const MAX_IDENTIFIER_LEN: usize = 256;

/// Request body for POST /sightings
///
/// Same shape as a [`RawSighting`]; the timestamp defaults to the time the
/// request is handled.
#[derive(Debug, Clone, Deserialize)]
pub struct SightingRequest {
    pub advertisement: Advertisement,
    pub rssi: i32,
    #[serde(default)]
    pub tx_power: Option<i32>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl SightingRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        let too_long = |value: &Option<String>| value.as_ref().is_some_and(|v| v.len() > MAX_IDENTIFIER_LEN);
        match &self.advertisement {
            Advertisement::IBeacon { proximity_uuid, .. } if proximity_uuid.len() > MAX_IDENTIFIER_LEN => {
                return Some("proximity_uuid exceeds maximum length of 256 characters".to_string());
            }
            Advertisement::Eddystone {
                namespace, instance, ..
            } if too_long(namespace) || too_long(instance) => {
                return Some("Eddystone identifier exceeds maximum length of 256 characters".to_string());
            }
            Advertisement::Vendor { service, .. } if *service == SERVICE_EDDYSTONE => {
                return Some("Eddystone frames must use the eddystone format".to_string());
            }
            Advertisement::Vendor { identifier, .. } if too_long(identifier) => {
                return Some("Vendor identifier exceeds maximum length of 256 characters".to_string());
            }
            _ => {}
        }
        if self.accuracy.is_some_and(|a| !a.is_finite() || a < 0.0) {
            return Some("accuracy must be a non-negative number".to_string());
        }
        None
    }

    pub fn into_sighting(self, received_at: DateTime<Utc>) -> RawSighting {
        RawSighting {
            advertisement: self.advertisement,
            rssi: self.rssi,
            tx_power: self.tx_power,
            accuracy: self.accuracy,
            timestamp: self.timestamp.unwrap_or(received_at),
        }
    }
}

/// Request body for PUT /location
#[derive(Debug, Clone, Deserialize)]
pub struct LocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LocationRequest {
    pub fn validate(&self) -> Option<String> {
        if !self.coordinate().is_valid() {
            return Some(format!(
                "Coordinate ({}, {}) is out of range",
                self.latitude, self.longitude
            ));
        }
        None
    }

    fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
        }
    }

    pub fn into_fix(self, received_at: DateTime<Utc>) -> LocationFix {
        LocationFix {
            coordinate: self.coordinate(),
            timestamp: self.timestamp.unwrap_or(received_at),
        }
    }
}

/// Body of GET and PUT /settings
///
/// Durations are given in milliseconds. Omitted fields keep the value of
/// the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPayload {
    pub cache_time_ms: u64,
    pub reset_on_every_access: bool,
    pub reset_on_every_add: bool,
    pub min_rssi: i32,
    pub max_rssi: i32,
    pub proximity_timeout_ms: u64,
    pub eddystone_timeout_ms: u64,
    pub location_retain_time_ms: u64,
    pub require_location: bool,
    pub distance: CurveFittedDistanceCalculator,
}

impl Default for SettingsPayload {
    fn default() -> Self {
        Self::from(&ScanSettings::default())
    }
}

impl From<&ScanSettings> for SettingsPayload {
    fn from(settings: &ScanSettings) -> Self {
        Self {
            cache_time_ms: millis(settings.cache_time),
            reset_on_every_access: settings.reset_on_every_access,
            reset_on_every_add: settings.reset_on_every_add,
            min_rssi: settings.min_rssi,
            max_rssi: settings.max_rssi,
            proximity_timeout_ms: millis(settings.proximity_timeout),
            eddystone_timeout_ms: millis(settings.eddystone_timeout),
            location_retain_time_ms: millis(settings.location_retain_time),
            require_location: settings.require_location,
            distance: settings.distance.clone(),
        }
    }
}

impl From<SettingsPayload> for ScanSettings {
    fn from(req: SettingsPayload) -> Self {
        Self {
            cache_time: Duration::from_millis(req.cache_time_ms),
            reset_on_every_access: req.reset_on_every_access,
            reset_on_every_add: req.reset_on_every_add,
            min_rssi: req.min_rssi,
            max_rssi: req.max_rssi,
            proximity_timeout: Duration::from_millis(req.proximity_timeout_ms),
            eddystone_timeout: Duration::from_millis(req.eddystone_timeout_ms),
            location_retain_time: Duration::from_millis(req.location_retain_time_ms),
            require_location: req.require_location,
            distance: req.distance,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

//! Location fixes supplied by the host's location collaborator.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::elapsed;

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters, if known
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
        }
    }

    /// Rejects values outside the valid latitude/longitude ranges.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A coordinate and when it was measured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub coordinate: Coordinate,
    pub timestamp: DateTime<Utc>,
}

// == Location Tracker ==
/// Holds the most recent fix and decides whether it is still current.
#[derive(Debug)]
pub struct LocationTracker {
    latest: Mutex<Option<LocationFix>>,
    retain_time: Mutex<Duration>,
}

impl LocationTracker {
    pub fn new(retain_time: Duration) -> Self {
        Self {
            latest: Mutex::new(None),
            retain_time: Mutex::new(retain_time),
        }
    }

    /// Records a new fix. Fixes older than the one already held are ignored.
    pub fn update(&self, fix: LocationFix) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if (*latest).map_or(true, |held| held.timestamp <= fix.timestamp) {
            *latest = Some(fix);
        }
    }

    pub fn set_retain_time(&self, retain_time: Duration) {
        *self.retain_time.lock().unwrap_or_else(PoisonError::into_inner) = retain_time;
    }

    /// The held fix if it is younger than the retain time at `now`.
    pub fn current(&self, now: DateTime<Utc>) -> Option<Coordinate> {
        let retain_time = *self.retain_time.lock().unwrap_or_else(PoisonError::into_inner);
        let latest = *self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest
            .filter(|fix| elapsed(fix.timestamp, now) < retain_time)
            .map(|fix| fix.coordinate)
    }

    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.current(now).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix_at(timestamp: DateTime<Utc>) -> LocationFix {
        LocationFix {
            coordinate: Coordinate::new(35.99, -78.9),
            timestamp,
        }
    }

    #[test]
    fn test_no_fix_is_not_current() {
        let tracker = LocationTracker::new(Duration::from_secs(60));
        assert_eq!(tracker.current(Utc::now()), None);
    }

    #[test]
    fn test_fix_goes_stale() {
        let now = Utc::now();
        let tracker = LocationTracker::new(Duration::from_secs(60));
        tracker.update(fix_at(now));

        assert!(tracker.is_current(now + chrono::Duration::seconds(59)));
        assert!(!tracker.is_current(now + chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_older_fix_ignored() {
        let now = Utc::now();
        let tracker = LocationTracker::new(Duration::from_secs(60));
        tracker.update(fix_at(now));
        tracker.update(LocationFix {
            coordinate: Coordinate::new(0.0, 0.0),
            timestamp: now - chrono::Duration::seconds(30),
        });

        assert_eq!(tracker.current(now), Some(Coordinate::new(35.99, -78.9)));
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(45.0, 120.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -181.0).is_valid());
    }
}

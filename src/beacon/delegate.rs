//! Host-facing notifications.
//!
//! The aggregator reports through a [`BeaconDelegate`]. [`EventLog`] is a
//! ready-made delegate that keeps the most recent events in memory; the
//! debug API serves it and tests assert against it.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::beacon::model::Beacon;
use crate::beacon::sighting::BeaconKind;

// == Delegate ==
/// Receives found/lost notifications from the aggregator.
///
/// Calls arrive on whatever thread or task triggered them and never while the
/// beacon cache is locked.
pub trait BeaconDelegate: Send + Sync {
    /// A beacon passed stabilization and is reported for the first time.
    fn found_beacon(&self, _kind: BeaconKind, _identifier: &str, _beacon: &Beacon) {}

    /// A reported beacon expired from the cache.
    fn lost_beacon(&self, _kind: BeaconKind, _identifier: &str) {}
}

/// Delegate that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelegate;

impl BeaconDelegate for NoopDelegate {}

// == Event Log ==
/// One delegate notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum BeaconEvent {
    Found {
        kind: BeaconKind,
        identifier: String,
        beacon: Beacon,
        at: DateTime<Utc>,
    },
    Lost {
        kind: BeaconKind,
        identifier: String,
        at: DateTime<Utc>,
    },
}

impl BeaconEvent {
    pub fn identifier(&self) -> &str {
        match self {
            BeaconEvent::Found { identifier, .. } | BeaconEvent::Lost { identifier, .. } => identifier,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, BeaconEvent::Found { .. })
    }
}

/// Bounded in-memory record of delegate notifications, oldest dropped first.
#[derive(Debug)]
pub struct EventLog {
    events: Mutex<VecDeque<BeaconEvent>>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<BeaconEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: BeaconEvent) {
        let mut events = self.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Events in the order they were delivered.
    pub fn events(&self) -> Vec<BeaconEvent> {
        self.lock().iter().cloned().collect()
    }

    pub fn found_count(&self) -> usize {
        self.lock().iter().filter(|e| e.is_found()).count()
    }

    pub fn lost_count(&self) -> usize {
        self.lock().iter().filter(|e| !e.is_found()).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(256)
    }
}

impl BeaconDelegate for EventLog {
    fn found_beacon(&self, kind: BeaconKind, identifier: &str, beacon: &Beacon) {
        debug!(%kind, identifier, proximity = %beacon.proximity, "found event recorded");
        self.push(BeaconEvent::Found {
            kind,
            identifier: identifier.to_string(),
            beacon: beacon.clone(),
            at: Utc::now(),
        });
    }

    fn lost_beacon(&self, kind: BeaconKind, identifier: &str) {
        debug!(%kind, identifier, "lost event recorded");
        self.push(BeaconEvent::Lost {
            kind,
            identifier: identifier.to_string(),
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::distance::CurveFittedDistanceCalculator;
    use crate::beacon::sighting::RawSighting;

    fn beacon() -> Beacon {
        let sighting = RawSighting::ibeacon("U1", 1, 1, -60, Utc::now());
        Beacon::from_sighting(sighting, &CurveFittedDistanceCalculator::default()).unwrap()
    }

    #[test]
    fn test_event_log_records_in_order() {
        let log = EventLog::default();
        log.found_beacon(BeaconKind::IBeacon, "U1-1-1", &beacon());
        log.lost_beacon(BeaconKind::IBeacon, "U1-1-1");

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_found());
        assert_eq!(events[1].identifier(), "U1-1-1");
        assert_eq!(log.found_count(), 1);
        assert_eq!(log.lost_count(), 1);
    }

    #[test]
    fn test_event_log_is_bounded() {
        let log = EventLog::new(2);
        for id in ["a", "b", "c"] {
            log.lost_beacon(BeaconKind::Tile, id);
        }

        let ids: Vec<String> = log.events().iter().map(|e| e.identifier().to_string()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_event_serialization() {
        let log = EventLog::default();
        log.lost_beacon(BeaconKind::Eddystone, "ns-inst");

        let json = serde_json::to_value(&log.events()[0]).unwrap();
        assert_eq!(json["event"], "lost");
        assert_eq!(json["kind"], "Eddystone");
        assert_eq!(json["identifier"], "ns-inst");
    }

    #[test]
    fn test_noop_delegate_accepts_calls() {
        NoopDelegate.found_beacon(BeaconKind::IBeacon, "x", &beacon());
        NoopDelegate.lost_beacon(BeaconKind::IBeacon, "x");
    }
}

//! Pipeline Integration Tests
//!
//! Drives the aggregator the way a host would: a scanner feeding sightings,
//! a delegate collecting notifications and time moving underneath.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use beacon_proximity::beacon::{
    Advertisement, Beacon, BeaconAggregator, BeaconDelegate, BeaconKind, Coordinate, LocationFix,
    Proximity, RawSighting, SERVICE_TILE,
};
use beacon_proximity::clock::{Clock, ManualClock};
use beacon_proximity::ScanSettings;
use tokio_test::{assert_err, assert_ok};

// == Recording Delegate ==

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Found(BeaconKind, String, i32),
    Lost(BeaconKind, String),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl BeaconDelegate for Recorder {
    fn found_beacon(&self, kind: BeaconKind, identifier: &str, beacon: &Beacon) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Found(kind, identifier.to_string(), beacon.rssi));
    }

    fn lost_beacon(&self, kind: BeaconKind, identifier: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Lost(kind, identifier.to_string()));
    }
}

fn pipeline(settings: ScanSettings) -> (BeaconAggregator, Arc<Recorder>, ManualClock) {
    let recorder = Arc::new(Recorder::default());
    let clock = ManualClock::default();
    let aggregator = assert_ok!(BeaconAggregator::with_clock(
        settings,
        recorder.clone(),
        Arc::new(clock.clone()),
    ));
    (aggregator, recorder, clock)
}

// == Scenarios ==

#[test]
fn test_found_after_wait_then_lost() {
    let settings = ScanSettings {
        require_location: true,
        ..ScanSettings::default()
    };
    let (aggregator, recorder, clock) = pipeline(settings);

    aggregator.process_sighting(RawSighting::ibeacon("U1", 1, 1, -60, clock.now()));
    clock.advance(Duration::from_secs(1));
    aggregator.process_sighting(RawSighting::ibeacon("U1", 1, 1, -50, clock.now()));
    assert!(recorder.events().is_empty());

    // Proximity timeout releases the beacon with the closest reading
    clock.advance(Duration::from_secs(9));
    aggregator.sweep();
    assert_eq!(
        recorder.events(),
        vec![Event::Found(BeaconKind::IBeacon, "U1-1-1".to_string(), -50)]
    );

    // The last sighting restarted the TTL at t=1s
    clock.advance(Duration::from_secs(50));
    aggregator.sweep();
    assert_eq!(recorder.events().len(), 1);

    clock.advance(Duration::from_secs(1));
    aggregator.sweep();
    aggregator.sweep();
    assert_eq!(
        recorder.events(),
        vec![
            Event::Found(BeaconKind::IBeacon, "U1-1-1".to_string(), -50),
            Event::Lost(BeaconKind::IBeacon, "U1-1-1".to_string()),
        ]
    );
}

#[test]
fn test_rediscovery_after_loss_reports_again() {
    let (aggregator, recorder, clock) = pipeline(ScanSettings::default());

    aggregator.process_sighting(RawSighting::ibeacon("U1", 1, 1, -60, clock.now()));
    clock.advance(Duration::from_secs(61));
    aggregator.process_sighting(RawSighting::ibeacon("U1", 1, 1, -60, clock.now()));

    let kinds: Vec<bool> = recorder
        .events()
        .iter()
        .map(|e| matches!(e, Event::Found(..)))
        .collect();
    assert_eq!(kinds, vec![true, false, true]);
}

#[test]
fn test_location_fix_attached_to_report() {
    let settings = ScanSettings {
        require_location: true,
        ..ScanSettings::default()
    };
    let (aggregator, _recorder, clock) = pipeline(settings);
    let spot = Coordinate::new(35.99, -78.9);

    aggregator.update_location(LocationFix {
        coordinate: spot,
        timestamp: clock.now(),
    });
    aggregator.process_sighting(RawSighting::ibeacon("U1", 1, 1, -60, clock.now()));

    let beacon = aggregator.beacon("U1-1-1").unwrap();
    assert_eq!(beacon.location, Some(spot));
    assert_eq!(beacon.proximity, Proximity::Immediate);
}

#[test]
fn test_stale_location_does_not_release() {
    let settings = ScanSettings {
        require_location: true,
        location_retain_time: Duration::from_secs(5),
        ..ScanSettings::default()
    };
    let (aggregator, recorder, clock) = pipeline(settings);

    aggregator.update_location(LocationFix {
        coordinate: Coordinate::new(1.0, 1.0),
        timestamp: clock.now(),
    });
    clock.advance(Duration::from_secs(5));
    aggregator.process_sighting(RawSighting::ibeacon("U1", 1, 1, -60, clock.now()));

    assert!(recorder.events().is_empty());
    assert!(!aggregator.has_current_location());
}

#[test]
fn test_vendor_beacon_uses_own_tx_power() {
    let (aggregator, recorder, clock) = pipeline(ScanSettings::default());
    let sighting = RawSighting {
        advertisement: Advertisement::Vendor {
            service: SERVICE_TILE,
            identifier: Some("tile-1".to_string()),
            payload: vec![0x01],
        },
        rssi: -80,
        tx_power: Some(-80),
        accuracy: None,
        timestamp: clock.now(),
    };

    aggregator.process_sighting(sighting);

    // At its own calibrated power the reading is about a meter away
    assert_eq!(
        recorder.events(),
        vec![Event::Found(BeaconKind::Tile, "FEED-tile-1".to_string(), -80)]
    );
}

#[test]
fn test_interleaved_beacons_tracked_independently() {
    let (aggregator, recorder, clock) = pipeline(ScanSettings::default());

    for minor in 1..=5u16 {
        aggregator.process_sighting(RawSighting::ibeacon("U1", 1, minor, -99, clock.now()));
    }
    aggregator.process_sighting(RawSighting::ibeacon("U1", 1, 3, -55, clock.now()));

    assert_eq!(
        recorder.events(),
        vec![Event::Found(BeaconKind::IBeacon, "U1-1-3".to_string(), -55)]
    );
    assert_eq!(aggregator.pending().len(), 4);

    clock.advance(Duration::from_secs(10));
    aggregator.sweep();
    assert_eq!(recorder.events().len(), 5);
    assert!(aggregator.pending().is_empty());
}

#[test]
fn test_invalid_settings_rejected_at_construction() {
    let recorder = Arc::new(Recorder::default());
    let settings = ScanSettings {
        proximity_timeout: Duration::ZERO,
        ..ScanSettings::default()
    };
    assert_err!(BeaconAggregator::new(settings, recorder));
}

// == Concurrency ==

#[test]
fn test_concurrent_sightings_report_once() {
    let (aggregator, recorder, clock) = pipeline(ScanSettings::default());
    let now = clock.now();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let aggregator = aggregator.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    aggregator.process_sighting(RawSighting::ibeacon("U1", 1, 1, -60 - i, now));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(recorder.events().len(), 1);
    assert_eq!(aggregator.stats().sightings, 400);
    assert_eq!(aggregator.beacons().len(), 1);
}

#[test]
fn test_concurrent_first_sightings_leave_no_stale_state() {
    let (aggregator, recorder, clock) = pipeline(ScanSettings::default());
    let now = clock.now();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let aggregator = aggregator.clone();
            std::thread::spawn(move || {
                for minor in 0..200u16 {
                    aggregator.process_sighting(RawSighting::ibeacon("U1", 1, minor, -60, now));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(recorder.events().len(), 200);
    assert_eq!(aggregator.reported().len(), 200);
    assert!(aggregator.pending().is_empty());
}

#[tokio::test]
async fn test_timer_releases_far_beacon() {
    let settings = ScanSettings {
        proximity_timeout: Duration::from_millis(100),
        ..ScanSettings::default()
    };
    let recorder = Arc::new(Recorder::default());
    let aggregator = assert_ok!(BeaconAggregator::new(settings, recorder.clone()));

    aggregator.process_sighting(RawSighting::ibeacon("U1", 1, 1, -99, chrono::Utc::now()));
    assert!(recorder.events().is_empty());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(recorder.events().len(), 1);

    aggregator.shutdown();
}

#[tokio::test]
async fn test_shutdown_cancels_timers() {
    let settings = ScanSettings {
        proximity_timeout: Duration::from_millis(100),
        ..ScanSettings::default()
    };
    let recorder = Arc::new(Recorder::default());
    let aggregator = assert_ok!(BeaconAggregator::new(settings, recorder.clone()));

    aggregator.process_sighting(RawSighting::ibeacon("U1", 1, 1, -99, chrono::Utc::now()));
    aggregator.shutdown();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(recorder.events().is_empty());
    assert_eq!(aggregator.stats().scheduled_timers, 0);
}

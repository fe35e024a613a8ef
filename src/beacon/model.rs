//! Aggregated beacon model.
//!
//! A [`Beacon`] is the best knowledge gathered so far about one physical
//! beacon: the closest reading seen, when it was first and last seen, and
//! whether it has been reported.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::beacon::distance::CurveFittedDistanceCalculator;
use crate::beacon::location::Coordinate;
use crate::beacon::proximity::Proximity;
use crate::beacon::sighting::{Advertisement, BeaconKind, RawSighting};
use crate::clock::{elapsed, to_chrono};

// == Merge Outcome ==
/// How a sighting related to what the cache already knew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeOutcome {
    /// First sighting of the identity
    New,
    /// Better reading than the cached one; it replaced the distance data
    Closer,
    /// Not better; only liveness was updated
    Existing,
}

/// Reporting state of a cached beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeaconState {
    Pending,
    Reported,
}

impl BeaconState {
    pub fn as_str(self) -> &'static str {
        match self {
            BeaconState::Pending => "pending",
            BeaconState::Reported => "reported",
        }
    }
}

// == Beacon ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beacon {
    pub identity: String,
    pub kind: BeaconKind,
    pub advertisement: Advertisement,
    pub rssi: i32,
    pub tx_power: Option<i32>,
    pub accuracy: Option<f64>,
    pub distance_meters: f64,
    pub proximity: Proximity,
    /// First sighting
    pub discovery_time: DateTime<Utc>,
    /// Most recent sighting
    pub last_seen_time: DateTime<Utc>,
    /// When the beacon was reported; never cleared once set
    pub sent_time: Option<DateTime<Utc>>,
    pub location: Option<Coordinate>,
    pub decoded: bool,
    /// Multi-frame assembly finished
    pub complete: bool,
}

impl Beacon {
    /// Builds a beacon from its first sighting. Returns `None` when the
    /// sighting carries no usable identity.
    pub fn from_sighting(sighting: RawSighting, calculator: &CurveFittedDistanceCalculator) -> Option<Self> {
        let identity = sighting.identity()?;
        let kind = sighting.advertisement.kind();

        let mut beacon = Self {
            identity,
            kind,
            decoded: kind != BeaconKind::Unknown,
            complete: sighting.advertisement.is_complete(),
            advertisement: sighting.advertisement,
            rssi: sighting.rssi,
            tx_power: sighting.tx_power,
            accuracy: sighting.accuracy,
            distance_meters: 0.0,
            proximity: Proximity::Unknown,
            discovery_time: sighting.timestamp,
            last_seen_time: sighting.timestamp,
            sent_time: None,
            location: None,
        };
        beacon.calculate_distance(calculator);
        Some(beacon)
    }

    // == Distance ==
    /// Recomputes distance and band from the current rssi. The beacon's own
    /// advertised power wins over the calculator's default.
    pub fn calculate_distance(&mut self, calculator: &CurveFittedDistanceCalculator) {
        let tx_power = self.tx_power.unwrap_or(calculator.tx_power);
        self.distance_meters = calculator.calculate_distance_with_power(tx_power, f64::from(self.rssi));
        self.proximity = Proximity::from_distance(self.distance_meters);
    }

    /// Strictly smaller distance, or the same distance at a stronger signal.
    pub fn is_closer_than(&self, other: &Beacon) -> bool {
        self.distance_meters < other.distance_meters
            || (self.distance_meters == other.distance_meters && self.rssi > other.rssi)
    }

    // == Combine ==
    /// Folds a newer reading of the same beacon into this one.
    ///
    /// A closer reading replaces the signal data; anything else only
    /// refreshes liveness so a single noisy far packet cannot degrade a good
    /// fix. Multi-frame assembly data is merged either way, and the discovery
    /// time never changes.
    pub fn combine_with(&mut self, newer: Beacon) -> MergeOutcome {
        let closer = newer.is_closer_than(self);

        if newer.last_seen_time > self.last_seen_time {
            self.last_seen_time = newer.last_seen_time;
        }
        self.complete |= newer.complete;
        self.decoded |= newer.decoded;
        self.merge_advertisement(newer.advertisement);

        if closer {
            self.rssi = newer.rssi;
            self.tx_power = newer.tx_power.or(self.tx_power);
            self.accuracy = newer.accuracy.or(self.accuracy);
            self.distance_meters = newer.distance_meters;
            self.proximity = newer.proximity;
            MergeOutcome::Closer
        } else {
            MergeOutcome::Existing
        }
    }

    fn merge_advertisement(&mut self, newer: Advertisement) {
        match (&mut self.advertisement, newer) {
            (
                Advertisement::Eddystone {
                    namespace,
                    instance,
                    url,
                    complete,
                },
                Advertisement::Eddystone {
                    namespace: new_namespace,
                    instance: new_instance,
                    url: new_url,
                    complete: new_complete,
                },
            ) => {
                if namespace.is_none() {
                    *namespace = new_namespace;
                }
                if instance.is_none() {
                    *instance = new_instance;
                }
                if new_url.is_some() {
                    *url = new_url;
                }
                *complete |= new_complete;
            }
            (
                Advertisement::Vendor { payload, .. },
                Advertisement::Vendor {
                    payload: new_payload,
                    ..
                },
            ) if !new_payload.is_empty() => {
                *payload = new_payload;
            }
            _ => {}
        }
    }

    // == State ==
    pub fn state(&self) -> BeaconState {
        if self.sent_time.is_some() {
            BeaconState::Reported
        } else {
            BeaconState::Pending
        }
    }

    /// The wait for a closer reading is over.
    pub fn timeout_waiting_to_send(&self, now: DateTime<Utc>, proximity_timeout: Duration) -> bool {
        elapsed(self.discovery_time, now) >= proximity_timeout
    }

    /// An incomplete multi-frame beacon has waited too long for its frames.
    pub fn assembly_timed_out(&self, now: DateTime<Utc>, eddystone_timeout: Duration) -> bool {
        !self.complete && elapsed(self.discovery_time, now) >= eddystone_timeout
    }

    // == Ready To Send ==
    /// Whether a pending beacon should be reported now.
    ///
    /// Incomplete beacons never are. Otherwise a close band reports at once
    /// when the location requirement is met (`location_ok`), and any band
    /// reports once the proximity timeout has elapsed.
    pub fn ready_to_send(&self, now: DateTime<Utc>, proximity_timeout: Duration, location_ok: bool) -> bool {
        if self.state() == BeaconState::Reported || !self.complete {
            return false;
        }
        (self.proximity.is_close() && location_ok) || self.timeout_waiting_to_send(now, proximity_timeout)
    }

    /// Marks the beacon reported at `now`. Returns `false` when it already was.
    pub fn mark_sent(&mut self, now: DateTime<Utc>, location: Option<Coordinate>) -> bool {
        if self.sent_time.is_some() {
            return false;
        }
        self.sent_time = Some(now);
        if location.is_some() {
            self.location = location;
        }
        true
    }

    /// When the pending beacon must next be looked at again, if ever.
    ///
    /// `None` for reported beacons and for deadlines past the end of
    /// representable time.
    pub fn next_deadline(&self, proximity_timeout: Duration, eddystone_timeout: Duration) -> Option<DateTime<Utc>> {
        let wait = match self.state() {
            BeaconState::Reported => return None,
            BeaconState::Pending if self.complete => proximity_timeout,
            BeaconState::Pending => eddystone_timeout,
        };
        self.discovery_time.checked_add_signed(to_chrono(wait))
    }
}

//! Raw sightings delivered by the scanning collaborator.
//!
//! A sighting is one advertisement packet (or one ranging callback) with the
//! signal strength it was received at. Identity derivation lives here because
//! a sighting that cannot be keyed never reaches the cache.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bluetooth service code used by Eddystone frames.
pub const SERVICE_EDDYSTONE: u16 = 0xFEAA;
/// Bluetooth service code used by Tile trackers.
pub const SERVICE_TILE: u16 = 0xFEED;
/// Bluetooth service code used by SecureCast beacons.
pub const SERVICE_SECURECAST: u16 = 0xFEEB;

// == Beacon Kind ==
/// Advertisement family a beacon belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BeaconKind {
    #[serde(rename = "iBeacon")]
    IBeacon,
    Eddystone,
    Tile,
    SecureCast,
    Unknown,
}

impl BeaconKind {
    /// Maps a vendor service code onto the families the SDK decodes.
    pub fn from_service(code: u16) -> Self {
        match code {
            SERVICE_EDDYSTONE => BeaconKind::Eddystone,
            SERVICE_TILE => BeaconKind::Tile,
            SERVICE_SECURECAST => BeaconKind::SecureCast,
            _ => BeaconKind::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BeaconKind::IBeacon => "iBeacon",
            BeaconKind::Eddystone => "Eddystone",
            BeaconKind::Tile => "Tile",
            BeaconKind::SecureCast => "SecureCast",
            BeaconKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for BeaconKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Advertisement ==
/// Decoded identifying content of an advertisement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Advertisement {
    /// Region UUID plus major/minor sub-identifiers.
    #[serde(rename = "ibeacon")]
    IBeacon {
        proximity_uuid: String,
        major: u16,
        minor: u16,
    },
    /// Multi-frame Eddystone data. The UID frame supplies namespace and
    /// instance; `complete` is set by the scanner once every expected frame
    /// has been received.
    Eddystone {
        #[serde(default)]
        namespace: Option<String>,
        #[serde(default)]
        instance: Option<String>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        complete: bool,
    },
    /// Any other vendor advertisement, keyed by the vendor's own identifier.
    Vendor {
        service: u16,
        #[serde(default)]
        identifier: Option<String>,
        #[serde(default)]
        payload: Vec<u8>,
    },
}

impl Advertisement {
    pub fn kind(&self) -> BeaconKind {
        match self {
            Advertisement::IBeacon { .. } => BeaconKind::IBeacon,
            Advertisement::Eddystone { .. } => BeaconKind::Eddystone,
            Advertisement::Vendor { service, .. } => BeaconKind::from_service(*service),
        }
    }

    /// Stable key for the physical beacon, `None` when the advertisement does
    /// not carry enough data to tell beacons apart.
    ///
    /// Eddystone frames only count through the [`Advertisement::Eddystone`]
    /// variant, which carries the frame assembly state; a vendor packet on the
    /// Eddystone service has none.
    pub fn identity(&self) -> Option<String> {
        match self {
            Advertisement::IBeacon {
                proximity_uuid,
                major,
                minor,
            } => {
                let uuid = proximity_uuid.trim();
                (!uuid.is_empty()).then(|| format!("{}-{}-{}", uuid.to_uppercase(), major, minor))
            }
            Advertisement::Eddystone {
                namespace,
                instance,
                ..
            } => {
                let namespace = non_blank(namespace.as_deref())?;
                let instance = non_blank(instance.as_deref())?;
                Some(format!("{}-{}", namespace.to_lowercase(), instance.to_lowercase()))
            }
            Advertisement::Vendor { service, .. } if *service == SERVICE_EDDYSTONE => None,
            Advertisement::Vendor {
                service,
                identifier,
                ..
            } => {
                let identifier = non_blank(identifier.as_deref())?;
                Some(format!("{:04X}-{}", service, identifier))
            }
        }
    }

    /// Whether all frames of the advertisement have been assembled.
    /// Single-packet formats are always complete.
    pub fn is_complete(&self) -> bool {
        match self {
            Advertisement::Eddystone { complete, .. } => *complete,
            _ => true,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// == Raw Sighting ==
/// One reading of one advertisement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSighting {
    pub advertisement: Advertisement,
    /// Received signal strength in dBm; zero means nothing was measured
    pub rssi: i32,
    /// Calibrated power at one meter advertised by the beacon, if any
    #[serde(default)]
    pub tx_power: Option<i32>,
    /// Platform-provided accuracy estimate, if any
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// When the packet was received
    pub timestamp: DateTime<Utc>,
}

impl RawSighting {
    /// Sighting of an iBeacon-style advertisement.
    pub fn ibeacon(
        proximity_uuid: impl Into<String>,
        major: u16,
        minor: u16,
        rssi: i32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            advertisement: Advertisement::IBeacon {
                proximity_uuid: proximity_uuid.into(),
                major,
                minor,
            },
            rssi,
            tx_power: None,
            accuracy: None,
            timestamp,
        }
    }

    /// Sighting of one Eddystone frame set.
    pub fn eddystone(
        namespace: impl Into<String>,
        instance: impl Into<String>,
        complete: bool,
        rssi: i32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            advertisement: Advertisement::Eddystone {
                namespace: Some(namespace.into()),
                instance: Some(instance.into()),
                url: None,
                complete,
            },
            rssi,
            tx_power: None,
            accuracy: None,
            timestamp,
        }
    }

    pub fn identity(&self) -> Option<String> {
        self.advertisement.identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ibeacon_identity() {
        let sighting = RawSighting::ibeacon("u1", 1, 1, -60, Utc::now());
        assert_eq!(sighting.identity().as_deref(), Some("U1-1-1"));
        assert_eq!(sighting.advertisement.kind(), BeaconKind::IBeacon);
    }

    #[test]
    fn test_blank_uuid_has_no_identity() {
        let sighting = RawSighting::ibeacon("  ", 1, 2, -60, Utc::now());
        assert_eq!(sighting.identity(), None);
    }

    #[test]
    fn test_eddystone_identity_requires_uid_frame() {
        let partial = Advertisement::Eddystone {
            namespace: Some("EDD1".to_string()),
            instance: None,
            url: Some("https://example.com".to_string()),
            complete: false,
        };
        assert_eq!(partial.identity(), None);
        assert!(!partial.is_complete());

        let sighting = RawSighting::eddystone("EDD1", "0A", true, -70, Utc::now());
        assert_eq!(sighting.identity().as_deref(), Some("edd1-0a"));
        assert!(sighting.advertisement.is_complete());
    }

    #[test]
    fn test_vendor_kinds() {
        let tile = Advertisement::Vendor {
            service: SERVICE_TILE,
            identifier: Some("abc".to_string()),
            payload: vec![1, 2, 3],
        };
        assert_eq!(tile.kind(), BeaconKind::Tile);
        assert_eq!(tile.identity().as_deref(), Some("FEED-abc"));

        let anonymous = Advertisement::Vendor {
            service: 0x180F,
            identifier: None,
            payload: Vec::new(),
        };
        assert_eq!(anonymous.kind(), BeaconKind::Unknown);
        assert_eq!(anonymous.identity(), None);
    }

    #[test]
    fn test_vendor_packet_on_eddystone_service_has_no_identity() {
        let disguised = Advertisement::Vendor {
            service: SERVICE_EDDYSTONE,
            identifier: Some("abc".to_string()),
            payload: vec![0x10],
        };
        assert_eq!(disguised.identity(), None);
    }

    #[test]
    fn test_sighting_deserialize() {
        let json = r#"{
            "advertisement": {"format": "ibeacon", "proximity_uuid": "U1", "major": 1, "minor": 1},
            "rssi": -60,
            "timestamp": "2024-01-01T00:00:00Z"
        }"#;
        let sighting: RawSighting = serde_json::from_str(json).unwrap();

        assert_eq!(sighting.identity().as_deref(), Some("U1-1-1"));
        assert_eq!(sighting.tx_power, None);
    }
}

//! Proximity bands derived from estimated distance.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound, exclusive, of the immediate band in meters.
pub const IMMEDIATE_RADIUS: f64 = 3.0;
/// Upper bound, exclusive, of the near band in meters.
pub const NEAR_RADIUS: f64 = 15.0;
/// Upper bound, exclusive, of the far band in meters.
pub const FAR_RADIUS: f64 = 100.0;
/// Distance standing in for "cannot tell".
pub const UNKNOWN_RADIUS: f64 = 99_999_999_999.0;

// == Proximity ==
/// Coarse distance category of a beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proximity {
    Immediate,
    Near,
    Far,
    Unknown,
}

impl Proximity {
    /// Classifies a distance in meters.
    pub fn from_distance(meters: f64) -> Self {
        if meters < IMMEDIATE_RADIUS {
            Proximity::Immediate
        } else if meters < NEAR_RADIUS {
            Proximity::Near
        } else if meters < FAR_RADIUS {
            Proximity::Far
        } else {
            // Also catches NaN
            Proximity::Unknown
        }
    }

    /// Close enough to report without waiting for the timeout.
    pub fn is_close(self) -> bool {
        matches!(self, Proximity::Immediate | Proximity::Near)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Proximity::Immediate => "immediate",
            Proximity::Near => "near",
            Proximity::Far => "far",
            Proximity::Unknown => "unknown",
        }
    }

    /// Numeric form shared with platform location APIs.
    pub fn as_integer(self) -> i32 {
        match self {
            Proximity::Unknown => 0,
            Proximity::Immediate => 1,
            Proximity::Near => 2,
            Proximity::Far => 3,
        }
    }

    /// Representative distance for the band, used when only the band is known.
    pub fn radius(self) -> f64 {
        match self {
            Proximity::Immediate => IMMEDIATE_RADIUS,
            Proximity::Near => NEAR_RADIUS,
            Proximity::Far => FAR_RADIUS,
            Proximity::Unknown => UNKNOWN_RADIUS,
        }
    }
}

impl fmt::Display for Proximity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

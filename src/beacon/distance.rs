//! Distance estimation from RSSI.
//!
//! Uses a curve-fitted power model:
//! `distance = c1 * (rssi / tx_power) ^ c2 + c3`
//!
//! where `tx_power` is the calibrated signal strength at one meter and the
//! coefficients are fitted offline per device class.

use serde::{Deserialize, Serialize};

use crate::beacon::proximity::UNKNOWN_RADIUS;

/// Distance reported when no signal was measured.
pub const UNKNOWN_DISTANCE: f64 = UNKNOWN_RADIUS;

/// Estimates the distance in meters for one reading.
///
/// A zero RSSI means nothing was measured and yields [`UNKNOWN_DISTANCE`];
/// so does a zero reference power, which has no meaningful ratio.
pub fn estimate_distance(
    rssi: f64,
    tx_power: i32,
    coefficient1: f64,
    coefficient2: f64,
    coefficient3: f64,
) -> f64 {
    if rssi == 0.0 || tx_power == 0 {
        return UNKNOWN_DISTANCE;
    }

    let ratio = rssi / f64::from(tx_power);
    let distance = coefficient1 * ratio.powf(coefficient2) + coefficient3;

    if distance.is_finite() {
        distance
    } else {
        UNKNOWN_DISTANCE
    }
}

// == Curve Fitted Calculator ==
/// Distance model with a configured reference power and fitted coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveFittedDistanceCalculator {
    pub coefficient1: f64,
    pub coefficient2: f64,
    pub coefficient3: f64,
    /// Expected RSSI at one meter, in dBm
    pub tx_power: i32,
}

impl CurveFittedDistanceCalculator {
    pub fn new(coefficient1: f64, coefficient2: f64, coefficient3: f64, tx_power: i32) -> Self {
        Self {
            coefficient1,
            coefficient2,
            coefficient3,
            tx_power,
        }
    }

    /// Distance for `rssi` using the configured reference power.
    pub fn calculate_distance(&self, rssi: f64) -> f64 {
        self.calculate_distance_with_power(self.tx_power, rssi)
    }

    /// Distance for `rssi` against an explicit reference power, typically the
    /// one advertised by the beacon itself.
    pub fn calculate_distance_with_power(&self, tx_power: i32, rssi: f64) -> f64 {
        estimate_distance(
            rssi,
            tx_power,
            self.coefficient1,
            self.coefficient2,
            self.coefficient3,
        )
    }
}

impl Default for CurveFittedDistanceCalculator {
    /// Coefficients fitted for a typical handset receiver.
    fn default() -> Self {
        Self::new(0.42093, 6.9476, 0.54992, -59)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_one_yields_first_coefficient() {
        assert_eq!(estimate_distance(-59.0, -59, 1.0, 1.0, 0.0), 1.0);
        assert_eq!(estimate_distance(-70.0, -70, 2.5, 3.0, 0.0), 2.5);
    }

    #[test]
    fn test_zero_rssi_is_unknown() {
        assert_eq!(estimate_distance(0.0, -59, 1.0, 1.0, 0.0), UNKNOWN_DISTANCE);
    }

    #[test]
    fn test_zero_tx_power_is_unknown() {
        assert_eq!(estimate_distance(-60.0, 0, 1.0, 1.0, 0.0), UNKNOWN_DISTANCE);
    }

    #[test]
    fn test_weaker_signal_is_farther() {
        let calculator = CurveFittedDistanceCalculator::default();

        let near = calculator.calculate_distance(-55.0);
        let far = calculator.calculate_distance(-85.0);

        assert!(near < far, "{near} should be less than {far}");
    }

    #[test]
    fn test_default_curve_at_reference_power() {
        let calculator = CurveFittedDistanceCalculator::default();
        let distance = calculator.calculate_distance(-59.0);

        assert!((distance - (0.42093 + 0.54992)).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_power_overrides_configured() {
        let calculator = CurveFittedDistanceCalculator::new(1.0, 1.0, 0.0, -59);

        assert_eq!(calculator.calculate_distance_with_power(-40, -80.0), 2.0);
        assert!((calculator.calculate_distance(-80.0) - 80.0 / 59.0).abs() < 1e-9);
    }
}

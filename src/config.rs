//! Configuration Module
//!
//! Handles loading the service configuration from environment variables and
//! validating the scan settings the aggregator runs with.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::beacon::CurveFittedDistanceCalculator;
use crate::cache::ExpiryPolicy;
use crate::error::{BeaconError, Result};

/// Longest duration any scan setting accepts.
pub const MAX_SETTING_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

// == Scan Settings ==
/// Host-settable parameters of the signal-stabilization pipeline.
///
/// Values are checked by [`validate`](Self::validate) whenever they are
/// assigned to an aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    /// TTL of every cached beacon
    pub cache_time: Duration,
    /// Reads refresh the TTL
    pub reset_on_every_access: bool,
    /// Every write, including merges of repeat sightings, refreshes the TTL
    pub reset_on_every_add: bool,
    /// Weakest signal accepted, in dBm
    pub min_rssi: i32,
    /// Strongest signal accepted, in dBm
    pub max_rssi: i32,
    /// Longest a pending beacon waits for a better reading
    pub proximity_timeout: Duration,
    /// Longest an incomplete multi-frame beacon waits for its remaining frames
    pub eddystone_timeout: Duration,
    /// Age after which a location fix is considered stale
    pub location_retain_time: Duration,
    /// Near readings only report once a current location fix exists
    pub require_location: bool,
    /// Distance model used when a sighting carries no calibrated power
    pub distance: CurveFittedDistanceCalculator,
}

impl ScanSettings {
    /// Checks the settings for internal consistency.
    pub fn validate(&self) -> Result<()> {
        check_duration("cache_time", self.cache_time, false)?;
        check_duration("proximity_timeout", self.proximity_timeout, false)?;
        check_duration("eddystone_timeout", self.eddystone_timeout, false)?;
        check_duration("location_retain_time", self.location_retain_time, true)?;
        if self.min_rssi > self.max_rssi {
            return Err(BeaconError::InvalidConfig(format!(
                "min_rssi ({}) exceeds max_rssi ({})",
                self.min_rssi, self.max_rssi
            )));
        }
        if self.distance.tx_power == 0 {
            return Err(BeaconError::InvalidConfig(
                "tx_power must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Expiry policy handed to the beacon cache.
    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy {
            cache_time: self.cache_time,
            reset_on_every_access: self.reset_on_every_access,
            reset_on_every_add: self.reset_on_every_add,
        }
    }

    /// Returns true when `rssi` lies inside the accepted signal band.
    ///
    /// A zero reading means no signal was measured; it is let through so it
    /// resolves to the unknown proximity band downstream.
    pub fn accepts_rssi(&self, rssi: i32) -> bool {
        rssi == 0 || (self.min_rssi..=self.max_rssi).contains(&rssi)
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            cache_time: Duration::from_secs(60),
            reset_on_every_access: false,
            reset_on_every_add: true,
            min_rssi: -100,
            max_rssi: -20,
            proximity_timeout: Duration::from_secs(10),
            eddystone_timeout: Duration::from_secs(30),
            location_retain_time: Duration::from_secs(300),
            require_location: false,
            distance: CurveFittedDistanceCalculator::default(),
        }
    }
}

// == Config ==
/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible
/// defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port of the debug API
    pub server_port: u16,
    /// Background sweep interval in seconds
    pub cleanup_interval: u64,
    /// Pipeline settings
    pub scan: ScanSettings,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 1)
    /// - `CACHE_TIME` - Beacon TTL in seconds (default: 60)
    /// - `RESET_ON_EVERY_ACCESS` - Reads refresh TTL (default: false)
    /// - `RESET_ON_EVERY_ADD` - Writes refresh TTL (default: true)
    /// - `MIN_RSSI` / `MAX_RSSI` - Accepted signal band (default: -100 / -20)
    /// - `PROXIMITY_TIMEOUT_MS` - Wait for a closer reading (default: 10000)
    /// - `EDDYSTONE_TIMEOUT_MS` - Wait for multi-frame assembly (default: 30000)
    /// - `LOCATION_RETAIN_TIME` - Location fix staleness in seconds (default: 300)
    /// - `REQUIRE_LOCATION` - Near readings wait for a fix (default: false)
    /// - `TX_POWER` - Reference power at one meter in dBm (default: -59)
    pub fn from_env() -> Self {
        let defaults = ScanSettings::default();
        let mut distance = defaults.distance.clone();
        distance.tx_power = env_var("TX_POWER").unwrap_or(distance.tx_power);

        Self {
            server_port: env_var("SERVER_PORT").unwrap_or(3000),
            cleanup_interval: env_var("CLEANUP_INTERVAL").unwrap_or(1),
            scan: ScanSettings {
                cache_time: env_var("CACHE_TIME")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache_time),
                reset_on_every_access: env_var("RESET_ON_EVERY_ACCESS")
                    .unwrap_or(defaults.reset_on_every_access),
                reset_on_every_add: env_var("RESET_ON_EVERY_ADD")
                    .unwrap_or(defaults.reset_on_every_add),
                min_rssi: env_var("MIN_RSSI").unwrap_or(defaults.min_rssi),
                max_rssi: env_var("MAX_RSSI").unwrap_or(defaults.max_rssi),
                proximity_timeout: env_var("PROXIMITY_TIMEOUT_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.proximity_timeout),
                eddystone_timeout: env_var("EDDYSTONE_TIMEOUT_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.eddystone_timeout),
                location_retain_time: env_var("LOCATION_RETAIN_TIME")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.location_retain_time),
                require_location: env_var("REQUIRE_LOCATION")
                    .unwrap_or(defaults.require_location),
                distance,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cleanup_interval: 1,
            scan: ScanSettings::default(),
        }
    }
}

fn check_duration(name: &str, value: Duration, allow_zero: bool) -> Result<()> {
    if value.is_zero() && !allow_zero {
        return Err(BeaconError::InvalidConfig(format!(
            "{} must be greater than zero",
            name
        )));
    }
    if value > MAX_SETTING_DURATION {
        return Err(BeaconError::InvalidConfig(format!(
            "{} must not exceed {} seconds",
            name,
            MAX_SETTING_DURATION.as_secs()
        )));
    }
    Ok(())
}

/// Parses an environment variable, `None` when unset or malformed.
fn env_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.cleanup_interval, 1);
        assert_eq!(config.scan, ScanSettings::default());
        assert!(config.scan.validate().is_ok());
    }

    #[test]
    fn test_config_from_env_defaults() {
        for name in [
            "SERVER_PORT",
            "CLEANUP_INTERVAL",
            "CACHE_TIME",
            "MIN_RSSI",
            "MAX_RSSI",
            "PROXIMITY_TIMEOUT_MS",
            "TX_POWER",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.scan.cache_time, Duration::from_secs(60));
        assert_eq!(config.scan.min_rssi, -100);
        assert_eq!(config.scan.distance.tx_power, -59);
    }

    #[test]
    fn test_validate_rejects_inverted_rssi_band() {
        let settings = ScanSettings {
            min_rssi: -30,
            max_rssi: -90,
            ..ScanSettings::default()
        };

        assert!(matches!(settings.validate(), Err(BeaconError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_durations() {
        let zero_ttl = ScanSettings {
            cache_time: Duration::ZERO,
            ..ScanSettings::default()
        };
        let zero_timeout = ScanSettings {
            proximity_timeout: Duration::ZERO,
            ..ScanSettings::default()
        };

        assert!(zero_ttl.validate().is_err());
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_durations() {
        let huge = Duration::from_millis(u64::MAX);
        for settings in [
            ScanSettings {
                cache_time: huge,
                ..ScanSettings::default()
            },
            ScanSettings {
                proximity_timeout: huge,
                ..ScanSettings::default()
            },
            ScanSettings {
                eddystone_timeout: huge,
                ..ScanSettings::default()
            },
            ScanSettings {
                location_retain_time: MAX_SETTING_DURATION + Duration::from_secs(1),
                ..ScanSettings::default()
            },
        ] {
            assert!(matches!(settings.validate(), Err(BeaconError::InvalidConfig(_))));
        }

        let longest = ScanSettings {
            eddystone_timeout: MAX_SETTING_DURATION,
            ..ScanSettings::default()
        };
        assert!(longest.validate().is_ok());
    }

    #[test]
    fn test_accepts_rssi_band() {
        let settings = ScanSettings::default();

        assert!(settings.accepts_rssi(-60));
        assert!(settings.accepts_rssi(-100));
        assert!(!settings.accepts_rssi(-101));
        assert!(!settings.accepts_rssi(-10));
        // Unmeasured signal passes through
        assert!(settings.accepts_rssi(0));
    }

    #[test]
    fn test_expiry_policy_mirrors_settings() {
        let settings = ScanSettings::default();
        let policy = settings.expiry_policy();

        assert_eq!(policy.cache_time, settings.cache_time);
        assert!(!policy.reset_on_every_access);
        assert!(policy.reset_on_every_add);
    }
}

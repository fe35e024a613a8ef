//! Sweep Task
//!
//! Background task that periodically purges expired beacons and re-evaluates
//! pending ones, so lost notifications fire even when no sightings arrive.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::beacon::BeaconAggregator;

/// Spawns a background task that sweeps the aggregator every
/// `interval_secs` seconds.
///
/// The returned handle is aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_sweep_task(aggregator.clone(), 1);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_sweep_task(aggregator: BeaconAggregator, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!("Starting sweep task with interval of {} seconds", interval.as_secs());

        loop {
            tokio::time::sleep(interval).await;

            let expired = aggregator.sweep();
            if expired > 0 {
                info!("Sweep: {} beacons expired", expired);
            } else {
                debug!("Sweep: no expired beacons");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;

    use crate::beacon::{EventLog, RawSighting};
    use crate::config::ScanSettings;

    fn aggregator(log: Arc<EventLog>) -> BeaconAggregator {
        let settings = ScanSettings {
            cache_time: Duration::from_secs(1),
            ..ScanSettings::default()
        };
        BeaconAggregator::new(settings, log).unwrap()
    }

    #[tokio::test]
    async fn test_sweep_task_reports_lost_beacons() {
        let log = Arc::new(EventLog::default());
        let aggregator = aggregator(log.clone());
        aggregator.process_sighting(RawSighting::ibeacon("U1", 1, 1, -60, Utc::now()));
        assert_eq!(log.found_count(), 1);

        let handle = spawn_sweep_task(aggregator.clone(), 1);

        // Entry expires after 1s; the sweep after 2s at the latest sees it
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(log.lost_count(), 1);
        assert!(aggregator.beacons().is_empty());

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_preserves_live_beacons() {
        let log = Arc::new(EventLog::default());
        let settings = ScanSettings {
            cache_time: Duration::from_secs(3600),
            ..ScanSettings::default()
        };
        let aggregator = BeaconAggregator::new(settings, log.clone()).unwrap();
        aggregator.process_sighting(RawSighting::ibeacon("U1", 1, 1, -60, Utc::now()));

        let handle = spawn_sweep_task(aggregator.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(aggregator.beacons().len(), 1);
        assert_eq!(log.lost_count(), 0);

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_aborted() {
        let aggregator = aggregator(Arc::new(EventLog::default()));

        let handle = spawn_sweep_task(aggregator, 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}

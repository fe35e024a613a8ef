//! Aggregator counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cache::CacheStats;

/// Snapshot of pipeline activity since the aggregator was created.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatorStats {
    /// Sightings handed to the aggregator
    pub sightings: u64,
    /// Sightings rejected by the signal band filter
    pub dropped_out_of_range: u64,
    /// Sightings without a usable identity
    pub dropped_unidentified: u64,
    /// Multi-frame beacons dropped after their assembly timed out
    pub dropped_incomplete: u64,
    pub found: u64,
    pub lost: u64,
    /// Beacons currently cached
    pub tracked: usize,
    /// Pending beacons with a scheduled re-evaluation
    pub scheduled_timers: usize,
    pub cache: CacheStats,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub sightings: AtomicU64,
    pub dropped_out_of_range: AtomicU64,
    pub dropped_unidentified: AtomicU64,
    pub dropped_incomplete: AtomicU64,
    pub found: AtomicU64,
    pub lost: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, tracked: usize, scheduled_timers: usize, cache: CacheStats) -> AggregatorStats {
        AggregatorStats {
            sightings: self.sightings.load(Ordering::Relaxed),
            dropped_out_of_range: self.dropped_out_of_range.load(Ordering::Relaxed),
            dropped_unidentified: self.dropped_unidentified.load(Ordering::Relaxed),
            dropped_incomplete: self.dropped_incomplete.load(Ordering::Relaxed),
            found: self.found.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
            tracked,
            scheduled_timers,
            cache,
        }
    }
}

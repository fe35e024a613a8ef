//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with tag metadata and
//! the timestamps expiration is computed from.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::Tags;
use crate::clock::elapsed;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Named tag values attached to the entry
    pub tags: Tags,
    /// When the entry was inserted, or last reset by a write
    pub inserted_at: DateTime<Utc>,
    /// When the entry was last reset by an access or a write
    pub last_access_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry whose clock starts at `now`.
    pub fn new(value: V, now: DateTime<Utc>) -> Self {
        Self {
            value,
            tags: HashMap::new(),
            inserted_at: now,
            last_access_at: now,
        }
    }

    // == Reference Time ==
    /// Timestamp the TTL is measured from.
    ///
    /// Access-reset caches measure from the last qualifying access, all
    /// others from the insertion time.
    pub fn reference_time(&self, reset_on_access: bool) -> DateTime<Utc> {
        if reset_on_access {
            self.last_access_at
        } else {
            self.inserted_at
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired once the full `cache_time` has
    /// elapsed since its reference time, so a read exactly at the deadline
    /// misses.
    pub fn is_expired(&self, now: DateTime<Utc>, cache_time: Duration, reset_on_access: bool) -> bool {
        elapsed(self.reference_time(reset_on_access), now) >= cache_time
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, `Duration::ZERO` once expired.
    pub fn ttl_remaining(
        &self,
        now: DateTime<Utc>,
        cache_time: Duration,
        reset_on_access: bool,
    ) -> Duration {
        cache_time.saturating_sub(elapsed(self.reference_time(reset_on_access), now))
    }

    // == Reset ==
    /// Restarts the expiration clock at `now`.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.inserted_at = now;
        self.last_access_at = now;
    }

    /// Records an access that refreshes access-reset entries.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_access_at = now;
    }

    // == Tag Matching ==
    /// Returns true when every criterion is present on the entry with an equal
    /// value. Extra tags on the entry are ignored.
    pub fn matches(&self, criteria: &Tags) -> bool {
        criteria
            .iter()
            .all(|(name, expected)| self.tags.get(name) == Some(expected))
    }
}

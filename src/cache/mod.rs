//! Cache Module
//!
//! Provides a generic in-memory store with TTL expiration, per-entry tags and
//! lifecycle notifications.

mod entry;
mod listener;
mod stats;
mod store;


use std::collections::HashMap;
use std::time::Duration;

// Re-export public types
pub use entry::CacheEntry;
pub use listener::{CacheListener, RemovalCause};
pub use stats::CacheStats;
pub use store::{TtlCache, Upsert};

/// Named tag values attached to a cache entry.
pub type Tags = HashMap<String, serde_json::Value>;

// == Expiry Policy ==
/// How long entries live and which operations restart their clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// Lifetime of an entry measured from its reference time
    pub cache_time: Duration,
    /// Every successful `get` restarts the clock
    pub reset_on_every_access: bool,
    /// Every `set`, including replaces, restarts the clock
    pub reset_on_every_add: bool,
}

//! Cache Store Module
//!
//! Main cache engine: a keyed map with lazy TTL expiration, tag metadata and
//! lifecycle notifications, serialized behind a single mutex.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::cache::{CacheEntry, CacheListener, CacheStats, ExpiryPolicy, RemovalCause, Tags};
use crate::clock::{Clock, SystemClock};

// == Upsert Outcome ==
/// Result of [`TtlCache::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert<R> {
    /// No live entry existed; the value was inserted.
    Inserted,
    /// A live entry absorbed the value through the merge closure.
    Merged {
        /// What the merge closure returned
        outcome: R,
        /// Whether the entry's expiration clock was restarted
        refreshed: bool,
    },
}

// == Notifications ==
enum Notification<K, V> {
    Added(K, V),
    Removing(K, V, RemovalCause),
    Accessing(K, V),
}

/// Notifications gathered while the lock is held and fired once it is
/// released. Collection is skipped entirely when nobody listens.
struct Pending<K, V> {
    enabled: bool,
    queue: Vec<Notification<K, V>>,
}

impl<K: Clone, V: Clone> Pending<K, V> {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            queue: Vec::new(),
        }
    }

    fn added(&mut self, key: &K, value: &V) {
        if self.enabled {
            self.queue.push(Notification::Added(key.clone(), value.clone()));
        }
    }

    fn removing(&mut self, key: K, value: V, cause: RemovalCause) {
        if self.enabled {
            self.queue.push(Notification::Removing(key, value, cause));
        }
    }

    fn accessing(&mut self, key: &K, value: &V) {
        if self.enabled {
            self.queue
                .push(Notification::Accessing(key.clone(), value.clone()));
        }
    }

    fn dispatch(self, listener: Option<&Arc<dyn CacheListener<K, V>>>) {
        let Some(listener) = listener else { return };
        for notification in self.queue {
            match notification {
                Notification::Added(key, value) => listener.did_add(&key, &value),
                Notification::Removing(key, value, cause) => {
                    listener.will_remove(&key, &value, cause)
                }
                Notification::Accessing(key, value) => listener.will_access(&key, &value),
            }
        }
    }
}

// == Store State ==
struct Inner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    policy: ExpiryPolicy,
    stats: CacheStats,
}

impl<K: Eq + Hash + Clone, V: Clone> Inner<K, V> {
    fn is_expired(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        entry.is_expired(now, self.policy.cache_time, self.policy.reset_on_every_access)
    }

    /// Drops `key` if its TTL has lapsed, queueing the removal notification.
    fn expire_key(&mut self, key: &K, now: DateTime<Utc>, pending: &mut Pending<K, V>) {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| self.is_expired(entry, now));

        if expired {
            if let Some((key, entry)) = self.entries.remove_entry(key) {
                self.stats.record_expiration();
                pending.removing(key, entry.value, RemovalCause::Expired);
            }
        }
    }

    /// Drops every expired entry and returns how many were removed.
    fn expire_all(&mut self, now: DateTime<Utc>, pending: &mut Pending<K, V>) -> usize {
        let expired_keys: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();
        for key in expired_keys {
            self.expire_key(&key, now, pending);
        }
        count
    }

    /// Stores `value`, replacing the entry's tags when `tags` is given.
    fn insert_or_replace(
        &mut self,
        key: K,
        value: V,
        tags: Option<Tags>,
        now: DateTime<Utc>,
        pending: &mut Pending<K, V>,
    ) -> bool {
        self.expire_key(&key, now, pending);

        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.value = value;
                if let Some(tags) = tags {
                    entry.tags = tags;
                }
                if self.policy.reset_on_every_add {
                    entry.reset(now);
                }
                false
            }
            None => {
                pending.added(&key, &value);
                let mut entry = CacheEntry::new(value, now);
                entry.tags = tags.unwrap_or_default();
                self.entries.insert(key, entry);
                self.stats.record_insertion();
                true
            }
        }
    }

    fn live_entry_mut(
        &mut self,
        key: &K,
        now: DateTime<Utc>,
        pending: &mut Pending<K, V>,
    ) -> Option<&mut CacheEntry<V>> {
        self.expire_key(key, now, pending);
        self.entries.get_mut(key)
    }

    fn sync_total(&mut self) {
        let total = self.entries.len();
        self.stats.set_total_entries(total);
    }
}

// == TTL Cache ==
/// Generic, thread-safe key/value store whose entries expire after
/// `cache_time` regardless of memory pressure.
///
/// Expiration is lazy: every operation that touches an entry checks it first
/// and purges it when dead, and [`purge_expired`](Self::purge_expired) sweeps
/// the whole store. An expired entry is never returned.
pub struct TtlCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    listener: RwLock<Option<Arc<dyn CacheListener<K, V>>>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates an empty cache using the wall clock.
    pub fn new(policy: ExpiryPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// Creates an empty cache reading time from `clock`.
    pub fn with_clock(policy: ExpiryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                policy,
                stats: CacheStats::new(),
            }),
            listener: RwLock::new(None),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_listener(&self) -> Option<Arc<dyn CacheListener<K, V>>> {
        self.listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs `op` under the lock, then fires whatever it queued.
    fn with_inner<R>(&self, op: impl FnOnce(&mut Inner<K, V>, DateTime<Utc>, &mut Pending<K, V>) -> R) -> R {
        let listener = self.current_listener();
        let mut pending = Pending::new(listener.is_some());
        let now = self.clock.now();

        let result = {
            let mut inner = self.lock();
            let result = op(&mut *inner, now, &mut pending);
            inner.sync_total();
            result
        };

        pending.dispatch(listener.as_ref());
        result
    }

    // == Listener ==
    /// Registers the listener that receives lifecycle notifications,
    /// replacing any previous one.
    pub fn set_listener(&self, listener: Arc<dyn CacheListener<K, V>>) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    // == Policy ==
    /// Returns the expiration policy currently in force.
    pub fn policy(&self) -> ExpiryPolicy {
        self.lock().policy
    }

    /// Replaces the expiration policy. Existing entries are judged by the new
    /// policy from the next operation on.
    pub fn set_policy(&self, policy: ExpiryPolicy) {
        self.lock().policy = policy;
    }

    pub fn set_cache_time(&self, cache_time: Duration) {
        self.lock().policy.cache_time = cache_time;
    }

    pub fn set_reset_on_every_access(&self, enabled: bool) {
        self.lock().policy.reset_on_every_access = enabled;
    }

    pub fn set_reset_on_every_add(&self, enabled: bool) {
        self.lock().policy.reset_on_every_add = enabled;
    }

    // == Get ==
    /// Returns a copy of the value if present and not expired.
    ///
    /// With `reset_on_every_access` the read also restarts the entry's
    /// expiration clock.
    pub fn get(&self, key: &K) -> Option<V> {
        self.with_inner(|inner, now, pending| {
            let reset = inner.policy.reset_on_every_access;
            match inner.live_entry_mut(key, now, pending) {
                Some(entry) => {
                    if reset {
                        entry.touch(now);
                    }
                    let value = entry.value.clone();
                    pending.accessing(key, &value);
                    inner.stats.record_hit();
                    Some(value)
                }
                None => {
                    inner.stats.record_miss();
                    None
                }
            }
        })
    }

    // == Peek ==
    /// Returns a copy of a live value without counting it as an access.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.with_inner(|inner, now, pending| {
            inner
                .live_entry_mut(key, now, pending)
                .map(|entry| entry.value.clone())
        })
    }

    /// Returns true when `key` has a live entry.
    pub fn contains(&self, key: &K) -> bool {
        self.with_inner(|inner, now, pending| inner.live_entry_mut(key, now, pending).is_some())
    }

    // == Set ==
    /// Inserts or replaces the value stored under `key`.
    ///
    /// Returns `true` only for a fresh insert. A replace keeps the entry's
    /// tags and only restarts its clock when `reset_on_every_add` is set.
    pub fn set(&self, key: K, value: V) -> bool {
        self.with_inner(|inner, now, pending| inner.insert_or_replace(key, value, None, now, pending))
    }

    // == Upsert ==
    /// Atomically merges `value` into a live entry or inserts it.
    ///
    /// An insert carries `tags` into the new entry under the same lock; a
    /// merge leaves the existing tags alone. `merge` receives the stored value
    /// and the incoming one; `refresh` decides from the merge outcome whether
    /// the entry's clock restarts. `reset_on_every_add` forces a restart
    /// regardless.
    pub fn upsert<R>(
        &self,
        key: K,
        value: V,
        tags: Tags,
        merge: impl FnOnce(&mut V, V) -> R,
        refresh: impl FnOnce(&R) -> bool,
    ) -> Upsert<R> {
        self.with_inner(|inner, now, pending| {
            let reset_on_add = inner.policy.reset_on_every_add;
            match inner.live_entry_mut(&key, now, pending) {
                Some(entry) => {
                    let outcome = merge(&mut entry.value, value);
                    let refreshed = reset_on_add || refresh(&outcome);
                    if refreshed {
                        entry.reset(now);
                    }
                    Upsert::Merged { outcome, refreshed }
                }
                None => {
                    inner.insert_or_replace(key, value, Some(tags), now, pending);
                    Upsert::Inserted
                }
            }
        })
    }

    // == Update ==
    /// Mutates a live value in place and returns the closure's result, or
    /// `None` when the key is absent.
    pub fn update<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.with_inner(|inner, now, pending| {
            inner
                .live_entry_mut(key, now, pending)
                .map(|entry| f(&mut entry.value))
        })
    }

    /// Like [`update`](Self::update), with the entry's tags handed to the
    /// closure as well so value and tags change together.
    pub fn update_tagged<R>(&self, key: &K, f: impl FnOnce(&mut V, &mut Tags) -> R) -> Option<R> {
        self.with_inner(|inner, now, pending| {
            inner.live_entry_mut(key, now, pending).map(|entry| {
                let CacheEntry { value, tags, .. } = entry;
                f(value, tags)
            })
        })
    }

    // == Refresh ==
    /// Restarts the expiration clock of a live entry.
    pub fn refresh(&self, key: &K) -> bool {
        self.with_inner(|inner, now, pending| match inner.live_entry_mut(key, now, pending) {
            Some(entry) => {
                entry.reset(now);
                true
            }
            None => false,
        })
    }

    /// Remaining lifetime of a live entry.
    pub fn ttl_remaining(&self, key: &K) -> Option<Duration> {
        self.with_inner(|inner, now, pending| {
            let policy = inner.policy;
            inner
                .live_entry_mut(key, now, pending)
                .map(|entry| entry.ttl_remaining(now, policy.cache_time, policy.reset_on_every_access))
        })
    }

    // == Remove ==
    /// Removes the entry stored under `key`. Absent keys are ignored.
    pub fn remove(&self, key: &K) {
        self.with_inner(|inner, now, pending| {
            inner.expire_key(key, now, pending);
            if let Some((key, entry)) = inner.entries.remove_entry(key) {
                inner.stats.record_removal();
                pending.removing(key, entry.value, RemovalCause::Explicit);
            }
        })
    }

    /// Removes every entry, notifying the listener for each.
    pub fn clear(&self) {
        self.with_inner(|inner, _now, pending| {
            for (key, entry) in inner.entries.drain() {
                inner.stats.record_removal();
                pending.removing(key, entry.value, RemovalCause::Explicit);
            }
        })
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.with_inner(|inner, now, pending| inner.expire_all(now, pending))
    }

    // == Tags ==
    /// Sets one named tag on a live entry. Returns `false` when the key does
    /// not exist; no entry is created.
    pub fn set_tag(&self, key: &K, name: impl Into<String>, value: impl Into<Value>) -> bool {
        self.with_inner(|inner, now, pending| match inner.live_entry_mut(key, now, pending) {
            Some(entry) => {
                entry.tags.insert(name.into(), value.into());
                true
            }
            None => false,
        })
    }

    /// Returns one tag value, `None` if the key or the tag is missing.
    pub fn get_tag(&self, key: &K, name: &str) -> Option<Value> {
        self.with_inner(|inner, now, pending| {
            inner
                .live_entry_mut(key, now, pending)
                .and_then(|entry| entry.tags.get(name).cloned())
        })
    }

    /// Replaces the whole tag set of a live entry. Previous tags are
    /// discarded, not merged.
    pub fn set_tags(&self, key: &K, tags: Tags) -> bool {
        self.with_inner(|inner, now, pending| match inner.live_entry_mut(key, now, pending) {
            Some(entry) => {
                entry.tags = tags;
                true
            }
            None => false,
        })
    }

    /// Returns all tags of an entry, empty when the key is absent.
    pub fn all_tags(&self, key: &K) -> Tags {
        self.with_inner(|inner, now, pending| {
            inner
                .live_entry_mut(key, now, pending)
                .map(|entry| entry.tags.clone())
                .unwrap_or_default()
        })
    }

    // == Export / Import ==
    /// Snapshot of every live entry.
    pub fn export(&self) -> HashMap<K, V> {
        self.export_matching(&Tags::new())
    }

    /// Snapshot of the live entries whose tags contain every `criteria` pair.
    pub fn export_matching(&self, criteria: &Tags) -> HashMap<K, V> {
        self.with_inner(|inner, now, pending| {
            inner.expire_all(now, pending);
            inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.matches(criteria))
                .map(|(key, entry)| (key.clone(), entry.value.clone()))
                .collect()
        })
    }

    /// Bulk-loads entries; each one behaves exactly like [`set`](Self::set).
    pub fn import(&self, entries: impl IntoIterator<Item = (K, V)>) {
        self.with_inner(|inner, now, pending| {
            for (key, value) in entries {
                inner.insert_or_replace(key, value, None, now, pending);
            }
        })
    }

    /// Bulk-loads entries together with their tags. A replaced entry takes the
    /// given tags in the same step as its value.
    pub fn import_tagged(&self, entries: impl IntoIterator<Item = (K, V, Tags)>) {
        self.with_inner(|inner, now, pending| {
            for (key, value, tags) in entries {
                inner.insert_or_replace(key, value, Some(tags), now, pending);
            }
        })
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats.clone()
    }

    // == Length ==
    /// Number of live entries. Expired entries awaiting a purge are not
    /// counted.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        let inner = self.lock();
        inner
            .entries
            .values()
            .filter(|entry| !inner.is_expired(entry, now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("TtlCache")
            .field("entries", &inner.entries.len())
            .field("policy", &inner.policy)
            .field("stats", &inner.stats)
            .finish()
    }
}

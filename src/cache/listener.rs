//! Cache Listener Module
//!
//! Lifecycle hooks fired by [`TtlCache`](crate::cache::TtlCache). Every hook
//! has a no-op default so listeners implement only what they need.

// == Removal Cause ==
/// Why an entry is leaving the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// The entry outlived its TTL.
    Expired,
    /// The entry was removed through `remove` or `clear`.
    Explicit,
}

// == Cache Listener ==
/// Receives notifications about entries being added, accessed or removed.
///
/// Hooks run synchronously on the thread that performed the operation, after
/// the cache has released its internal lock. They must stay lightweight and
/// must not mutate the cache.
pub trait CacheListener<K, V>: Send + Sync {
    /// An entry was freshly inserted.
    fn did_add(&self, _key: &K, _value: &V) {}

    /// An entry is leaving the cache.
    fn will_remove(&self, _key: &K, _value: &V, _cause: RemovalCause) {}

    /// An entry is about to be handed out by `get`.
    fn will_access(&self, _key: &K, _value: &V) {}
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct AddCounter {
        adds: AtomicUsize,
    }

    impl CacheListener<String, u32> for AddCounter {
        fn did_add(&self, _key: &String, _value: &u32) {
            self.adds.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_default_hooks_are_noops() {
        let listener = AddCounter::default();
        let key = "k".to_string();

        listener.will_access(&key, &1);
        listener.will_remove(&key, &1, RemovalCause::Expired);
        listener.did_add(&key, &1);

        assert_eq!(listener.adds.load(Ordering::SeqCst), 1);
    }
}

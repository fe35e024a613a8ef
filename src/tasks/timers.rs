//! Per-Beacon Timers
//!
//! Keeps at most one scheduled re-evaluation task per beacon identity so a
//! state transition can cancel it before it fires.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::task::{AbortHandle, JoinHandle};

struct Scheduled {
    generation: u64,
    deadline: DateTime<Utc>,
    handle: AbortHandle,
}

#[derive(Default)]
struct Registry {
    next_generation: u64,
    scheduled: HashMap<String, Scheduled>,
}

/// Identity-keyed registry of cancellable timer tasks.
#[derive(Default)]
pub struct TimerRegistry {
    inner: Mutex<Registry>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns a timer for `identity` firing at `deadline`, unless one is
    /// already registered for the same deadline or an earlier one.
    ///
    /// A timer registered for a later deadline is aborted and replaced.
    /// `spawn` receives the generation the task must pass to
    /// [`complete`](Self::complete) when it fires. It runs while the registry
    /// is locked, so the task cannot complete before it is registered.
    /// Returns whether a task was spawned.
    pub fn schedule(
        &self,
        identity: &str,
        deadline: DateTime<Utc>,
        spawn: impl FnOnce(u64) -> JoinHandle<()>,
    ) -> bool {
        let mut registry = self.lock();
        if registry
            .scheduled
            .get(identity)
            .is_some_and(|scheduled| scheduled.deadline <= deadline)
        {
            return false;
        }

        registry.next_generation += 1;
        let generation = registry.next_generation;

        let handle = spawn(generation).abort_handle();
        if let Some(previous) = registry.scheduled.insert(
            identity.to_string(),
            Scheduled {
                generation,
                deadline,
                handle,
            },
        ) {
            previous.handle.abort();
        }
        true
    }

    /// Deregisters a timer that has fired. Returns `false` when the timer was
    /// cancelled or superseded in the meantime, in which case the firing must
    /// be ignored.
    pub fn complete(&self, identity: &str, generation: u64) -> bool {
        let mut registry = self.lock();
        match registry.scheduled.get(identity) {
            Some(scheduled) if scheduled.generation == generation => {
                registry.scheduled.remove(identity);
                true
            }
            _ => false,
        }
    }

    /// Aborts the timer registered for `identity`, if any.
    pub fn cancel(&self, identity: &str) {
        if let Some(scheduled) = self.lock().scheduled.remove(identity) {
            scheduled.handle.abort();
        }
    }

    /// Aborts every registered timer.
    pub fn cancel_all(&self) {
        for (_, scheduled) in self.lock().scheduled.drain() {
            scheduled.handle.abort();
        }
    }

    pub fn is_scheduled(&self, identity: &str) -> bool {
        self.lock().scheduled.contains_key(identity)
    }

    /// Deadline of the timer registered for `identity`.
    pub fn deadline(&self, identity: &str) -> Option<DateTime<Utc>> {
        self.lock().scheduled.get(identity).map(|scheduled| scheduled.deadline)
    }

    pub fn len(&self) -> usize {
        self.lock().scheduled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

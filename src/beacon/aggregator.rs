//! Beacon Aggregator Module
//!
//! Signal-stabilization pipeline between the scanner and the host. Raw
//! sightings are filtered, keyed by identity and merged into a TTL cache of
//! [`Beacon`]s. A beacon is reported to the delegate exactly once, as soon as
//! it is close enough or has waited out the proximity timeout, and a lost
//! notification follows when a reported beacon expires.
//!
//! Each pending beacon owns at most one timer task that re-evaluates it at
//! its next deadline. Timers need a tokio runtime; without one the host
//! drives deadlines through [`BeaconAggregator::sweep`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::beacon::delegate::BeaconDelegate;
use crate::beacon::location::{LocationFix, LocationTracker};
use crate::beacon::model::{Beacon, BeaconState, MergeOutcome};
use crate::beacon::sighting::RawSighting;
use crate::beacon::stats::{AggregatorStats, Counters};
use crate::cache::{CacheListener, RemovalCause, Tags, TtlCache, Upsert};
use crate::clock::{Clock, SystemClock};
use crate::config::ScanSettings;
use crate::error::Result;
use crate::tasks::TimerRegistry;

/// Cache tag holding the beacon kind.
pub const TAG_TYPE: &str = "type";
/// Cache tag holding `pending` or `reported`.
pub const TAG_STATE: &str = "state";

/// What a re-evaluation decided for one beacon.
enum Verdict {
    Report(Beacon),
    Drop,
    Wait(DateTime<Utc>),
    Idle,
}

struct Shared {
    cache: TtlCache<String, Beacon>,
    settings: RwLock<ScanSettings>,
    location: LocationTracker,
    delegate: Arc<dyn BeaconDelegate>,
    timers: Arc<TimerRegistry>,
    counters: Arc<Counters>,
    clock: Arc<dyn Clock>,
}

// == Loss Listener ==
/// Turns cache removals into lost notifications and timer cancellations.
struct LossListener {
    delegate: Arc<dyn BeaconDelegate>,
    timers: Arc<TimerRegistry>,
    counters: Arc<Counters>,
}

impl CacheListener<String, Beacon> for LossListener {
    fn will_remove(&self, identity: &String, beacon: &Beacon, cause: RemovalCause) {
        self.timers.cancel(identity);

        if cause == RemovalCause::Expired && beacon.state() == BeaconState::Reported {
            Counters::bump(&self.counters.lost);
            info!(identity = %identity, kind = %beacon.kind, "beacon lost");
            self.delegate.lost_beacon(beacon.kind, identity);
        } else {
            debug!(identity = %identity, ?cause, state = beacon.state().as_str(), "beacon removed");
        }
    }
}

// == Beacon Aggregator ==
/// Cheap to clone; clones share the same cache, timers and delegate.
#[derive(Clone)]
pub struct BeaconAggregator {
    inner: Arc<Shared>,
}

impl BeaconAggregator {
    /// Creates an aggregator on the wall clock.
    pub fn new(settings: ScanSettings, delegate: Arc<dyn BeaconDelegate>) -> Result<Self> {
        Self::with_clock(settings, delegate, Arc::new(SystemClock))
    }

    /// Creates an aggregator reading time from `clock`.
    pub fn with_clock(
        settings: ScanSettings,
        delegate: Arc<dyn BeaconDelegate>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        settings.validate()?;

        let timers = Arc::new(TimerRegistry::new());
        let counters = Arc::new(Counters::default());
        let cache = TtlCache::with_clock(settings.expiry_policy(), clock.clone());
        cache.set_listener(Arc::new(LossListener {
            delegate: delegate.clone(),
            timers: timers.clone(),
            counters: counters.clone(),
        }));

        Ok(Self {
            inner: Arc::new(Shared {
                cache,
                location: LocationTracker::new(settings.location_retain_time),
                settings: RwLock::new(settings),
                delegate,
                timers,
                counters,
                clock,
            }),
        })
    }

    // == Process Sighting ==
    /// Feeds one raw sighting through the pipeline.
    ///
    /// Returns how the sighting merged into the cache, or `None` when it was
    /// dropped by the signal band filter or carried no usable identity.
    pub fn process_sighting(&self, sighting: RawSighting) -> Option<MergeOutcome> {
        let shared = &self.inner;
        Counters::bump(&shared.counters.sightings);
        let settings = self.settings();

        if !settings.accepts_rssi(sighting.rssi) {
            Counters::bump(&shared.counters.dropped_out_of_range);
            debug!(rssi = sighting.rssi, "sighting outside rssi band dropped");
            return None;
        }

        let Some(beacon) = Beacon::from_sighting(sighting, &settings.distance) else {
            Counters::bump(&shared.counters.dropped_unidentified);
            debug!("sighting without identity dropped");
            return None;
        };

        let identity = beacon.identity.clone();
        let kind = beacon.kind;
        let outcome = match shared.cache.upsert(
            identity.clone(),
            beacon,
            state_tags(kind.as_str(), BeaconState::Pending),
            |cached, newer| cached.combine_with(newer),
            |outcome| *outcome == MergeOutcome::Closer,
        ) {
            Upsert::Inserted => {
                debug!(identity = %identity, %kind, "new beacon");
                MergeOutcome::New
            }
            Upsert::Merged { outcome, .. } => outcome,
        };

        self.evaluate(&identity);
        Some(outcome)
    }

    // == Evaluate ==
    /// Reports, drops or reschedules one beacon according to its state now.
    fn evaluate(&self, identity: &str) {
        let shared = &self.inner;
        let settings = self.settings();
        let now = shared.clock.now();
        let location = shared.location.current(now);
        let location_ok = !settings.require_location || location.is_some();

        let verdict = shared.cache.update_tagged(&identity.to_string(), |beacon, tags| {
            if beacon.assembly_timed_out(now, settings.eddystone_timeout) {
                Verdict::Drop
            } else if beacon.ready_to_send(now, settings.proximity_timeout, location_ok) {
                beacon.mark_sent(now, location);
                tags.insert(TAG_STATE.to_string(), BeaconState::Reported.as_str().into());
                Verdict::Report(beacon.clone())
            } else {
                beacon
                    .next_deadline(settings.proximity_timeout, settings.eddystone_timeout)
                    .map_or(Verdict::Idle, Verdict::Wait)
            }
        });

        match verdict {
            Some(Verdict::Report(beacon)) => self.report(identity, beacon),
            Some(Verdict::Drop) => {
                Counters::bump(&shared.counters.dropped_incomplete);
                debug!(identity, "incomplete beacon dropped after assembly timeout");
                shared.cache.remove(&identity.to_string());
            }
            Some(Verdict::Wait(deadline)) => self.schedule(identity, deadline),
            Some(Verdict::Idle) | None => {}
        }
    }

    fn report(&self, identity: &str, beacon: Beacon) {
        let shared = &self.inner;
        shared.timers.cancel(identity);
        Counters::bump(&shared.counters.found);

        info!(
            identity,
            kind = %beacon.kind,
            proximity = %beacon.proximity,
            distance = beacon.distance_meters,
            "beacon reported"
        );
        shared.delegate.found_beacon(beacon.kind, identity, &beacon);
    }

    // == Timers ==
    /// Makes sure a timer fires for `identity` no later than `deadline`.
    fn schedule(&self, identity: &str, deadline: DateTime<Utc>) {
        let Ok(runtime) = Handle::try_current() else {
            debug!(identity, "no runtime; deadline left to sweep");
            return;
        };

        let delay = (deadline - self.inner.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let weak: Weak<Shared> = Arc::downgrade(&self.inner);
        let key = identity.to_string();

        let spawned = self.inner.timers.schedule(identity, deadline, |generation| {
            runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.timers.complete(&key, generation) {
                    BeaconAggregator { inner }.evaluate(&key);
                }
            })
        });
        if spawned {
            debug!(identity, %deadline, "timer scheduled");
        }
    }

    // == Sweep ==
    /// Purges expired beacons and re-evaluates every pending one.
    ///
    /// Returns the number of beacons that expired.
    pub fn sweep(&self) -> usize {
        let purged = self.inner.cache.purge_expired();
        let pending = self
            .inner
            .cache
            .export_matching(&state_filter(BeaconState::Pending));
        for identity in pending.keys() {
            self.evaluate(identity);
        }
        purged
    }

    // == Eviction ==
    /// Removes a beacon without a lost notification. Returns whether it was
    /// cached.
    pub fn evict(&self, identity: &str) -> bool {
        let key = identity.to_string();
        let present = self.inner.cache.contains(&key);
        self.inner.cache.remove(&key);
        present
    }

    /// Removes every beacon without lost notifications.
    pub fn clear(&self) {
        self.inner.cache.clear();
    }

    // == Queries ==
    /// Current cached beacon for `identity`.
    pub fn beacon(&self, identity: &str) -> Option<Beacon> {
        self.inner.cache.peek(&identity.to_string())
    }

    /// Every cached beacon, keyed by identity.
    pub fn beacons(&self) -> HashMap<String, Beacon> {
        self.inner.cache.export()
    }

    /// Cached beacons that have already been reported.
    pub fn reported(&self) -> HashMap<String, Beacon> {
        self.inner
            .cache
            .export_matching(&state_filter(BeaconState::Reported))
    }

    /// Cached beacons still waiting to be reported.
    pub fn pending(&self) -> HashMap<String, Beacon> {
        self.inner
            .cache
            .export_matching(&state_filter(BeaconState::Pending))
    }

    // == Export / Import ==
    pub fn export(&self) -> HashMap<String, Beacon> {
        self.beacons()
    }

    /// Restores previously exported beacons. Reported beacons stay reported;
    /// pending ones resume stabilization.
    ///
    /// Each beacon is stored under its own identity whatever map key it came
    /// with; beacons with a blank identity are skipped. Returns how many were
    /// imported.
    pub fn import(&self, beacons: HashMap<String, Beacon>) -> usize {
        let entries: Vec<(String, Beacon, Tags)> = beacons
            .into_values()
            .filter(|beacon| !beacon.identity.trim().is_empty())
            .map(|beacon| {
                let tags = state_tags(beacon.kind.as_str(), beacon.state());
                (beacon.identity.clone(), beacon, tags)
            })
            .collect();
        let states: Vec<(String, BeaconState)> = entries
            .iter()
            .map(|(identity, beacon, _)| (identity.clone(), beacon.state()))
            .collect();

        self.inner.cache.import_tagged(entries);
        for (identity, state) in &states {
            self.inner.timers.cancel(identity);
            if *state == BeaconState::Pending {
                self.evaluate(identity);
            }
        }
        states.len()
    }

    // == Location ==
    /// Supplies a new location fix and re-evaluates beacons that were
    /// waiting for one.
    pub fn update_location(&self, fix: LocationFix) {
        self.inner.location.update(fix);
        if self.settings().require_location {
            for identity in self.pending().keys() {
                self.evaluate(identity);
            }
        }
    }

    pub fn has_current_location(&self) -> bool {
        self.inner.location.is_current(self.inner.clock.now())
    }

    // == Settings ==
    pub fn settings(&self) -> ScanSettings {
        self.inner
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the pipeline settings after validating them. Invalid settings
    /// are rejected and the previous ones stay in effect.
    pub fn update_settings(&self, settings: ScanSettings) -> Result<()> {
        if let Err(e) = settings.validate() {
            warn!(error = %e, "rejected scan settings");
            return Err(e);
        }

        self.inner.cache.set_policy(settings.expiry_policy());
        self.inner.location.set_retain_time(settings.location_retain_time);
        *self
            .inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = settings;
        info!("scan settings updated");
        Ok(())
    }

    // == Stats ==
    pub fn stats(&self) -> AggregatorStats {
        let shared = &self.inner;
        shared
            .counters
            .snapshot(shared.cache.len(), shared.timers.len(), shared.cache.stats())
    }

    /// Cancels every pending timer. Cached beacons are kept.
    pub fn shutdown(&self) {
        self.inner.timers.cancel_all();
        info!("beacon aggregator timers cancelled");
    }
}

impl fmt::Debug for BeaconAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeaconAggregator")
            .field("cache", &self.inner.cache)
            .field("timers", &self.inner.timers.len())
            .finish()
    }
}

fn state_tags(kind: &str, state: BeaconState) -> Tags {
    Tags::from([
        (TAG_TYPE.to_string(), kind.into()),
        (TAG_STATE.to_string(), state.as_str().into()),
    ])
}

fn state_filter(state: BeaconState) -> Tags {
    Tags::from([(TAG_STATE.to_string(), state.as_str().into())])
}

//! Lazily populated hazard curve cache.
//!
//! [`LazyData`] maps encoded keys (`imt:location:selector`) to curves. It is
//! never written to directly: a lookup that misses triggers one store query
//! covering every intensity measure for the key's location and selector
//! family, and every curve in the response is cached in one pass.
//!
//! ## Thread Safety
//!
//! The cache can be shared across threads:
//! - Cached curves are served under a read lock without blocking each other
//! - Only one query per (location, selector family) group is in flight; other
//!   threads asking for keys in that group wait for it and reuse the result
//! - Different groups are fetched concurrently

use crate::curve::CurveValue;
use crate::key::{decode, GroupKey, Key, Selector, SelectorKind};
use crate::store::{HazardStore, ImtValues};
use crate::{HazardError, Result};
use hazlab_metrics::{metric_defs, model_labels, QueryLabels};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Status of a group fetch in flight.
#[derive(Debug, Clone)]
enum FetchStatus {
    /// The leader is still waiting on the store.
    InProgress,
    /// All curves of the group have been inserted.
    Complete,
    /// The store query failed with this message.
    Failed(String),
}

/// A group fetch and the number of threads waiting on it.
#[derive(Debug)]
struct InFlight {
    status: FetchStatus,
    waiters: usize,
}

/// Tracks in-flight group fetches to prevent duplicate queries.
#[derive(Debug, Default)]
struct FetchTracker {
    /// Only holds groups that are being fetched or still have waiters.
    in_flight: HashMap<GroupKey, InFlight>,
}

/// Settles a leader's flight when dropped, including during unwinding.
struct FlightGuard<'a> {
    cache: &'a LazyData,
    group: &'a GroupKey,
    outcome: Option<FetchStatus>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let status = self
            .outcome
            .take()
            .unwrap_or_else(|| FetchStatus::Failed("store query panicked".to_string()));
        if matches!(status, FetchStatus::Failed(_)) && std::thread::panicking() {
            warn!(location = %self.group.location, kind = %self.group.kind, "group fetch panicked");
        }
        self.cache.settle_flight(self.group, status);
    }
}

/// Key-addressed hazard curve cache over a [`HazardStore`].
pub struct LazyData {
    /// Hazard model the curves belong to.
    hazard_id: String,
    /// Optional VS30 filter passed to every query.
    vs30: Option<u32>,
    /// Remote store queried on misses.
    store: Arc<dyn HazardStore>,
    /// Cached curves by encoded key. Entries are written once per fetch.
    entries: RwLock<HashMap<String, Arc<CurveValue>>>,
    /// Groups currently being fetched.
    fetch_tracker: Mutex<FetchTracker>,
    /// Signalled whenever a group fetch finishes.
    fetch_complete: Condvar,
    /// Number of store queries issued.
    queries: AtomicUsize,
}

impl std::fmt::Debug for LazyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyData")
            .field("hazard_id", &self.hazard_id)
            .field("vs30", &self.vs30)
            .field("entries", &self.len())
            .finish()
    }
}

impl LazyData {
    /// Create an empty cache for `hazard_id` backed by `store`.
    pub fn new(hazard_id: impl Into<String>, store: Arc<dyn HazardStore>) -> Self {
        Self {
            hazard_id: hazard_id.into(),
            vs30: None,
            store,
            entries: RwLock::new(HashMap::new()),
            fetch_tracker: Mutex::new(FetchTracker::default()),
            fetch_complete: Condvar::new(),
            queries: AtomicUsize::new(0),
        }
    }

    /// Restrict store queries to one VS30.
    pub fn with_vs30(mut self, vs30: Option<u32>) -> Self {
        self.vs30 = vs30;
        self
    }

    /// Hazard model identifier.
    pub fn hazard_id(&self) -> &str {
        &self.hazard_id
    }

    /// VS30 filter, if any.
    pub fn vs30(&self) -> Option<u32> {
        self.vs30
    }

    /// Look up a curve by encoded key, fetching its group on a miss.
    ///
    /// Fails with [`HazardError::MalformedKey`] for keys that do not decode,
    /// [`HazardError::KeyNotFound`] if the store did not return the key's
    /// intensity measure or selector, and with the store's own error if the
    /// query failed (the cache is then unchanged).
    pub fn get(&self, key: &str) -> Result<Arc<CurveValue>> {
        if let Some(curve) = self.lookup(key) {
            self.record_hit();
            return Ok(curve);
        }

        let decoded = decode(key)?;
        let canonical = decoded.to_string();
        if canonical != key {
            if let Some(curve) = self.lookup(&canonical) {
                self.record_hit();
                return Ok(curve);
            }
        }

        self.ensure_group_loaded(&decoded, &canonical)?;

        self.lookup(&canonical)
            .ok_or_else(|| HazardError::KeyNotFound { key: key.to_string() })
    }

    /// Look up a curve by decoded key.
    pub fn get_key(&self, key: &Key) -> Result<Arc<CurveValue>> {
        self.get(&key.to_string())
    }

    /// Direct insertion is not supported; the cache fills itself on reads.
    pub fn insert(&self, key: &str, _value: CurveValue) -> Result<()> {
        debug!(key, "rejected direct write to lazy cache");
        Err(HazardError::UnsupportedOperation(
            "LazyData is populated only by lookups",
        ))
    }

    /// Returns true if the key is cached. Never queries the store.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Number of cached curves.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Cached keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of curve queries issued to the store so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    fn lookup(&self, key: &str) -> Option<Arc<CurveValue>> {
        self.entries.read().get(key).cloned()
    }

    fn record_hit(&self) {
        let labels = model_labels(&self.hazard_id);
        metrics::counter!(metric_defs::CACHE_HITS.name, &labels).increment(1);
    }

    /// Make sure the group containing `key` has been fetched.
    ///
    /// If another thread is already fetching the group, wait for it instead
    /// of issuing a second query.
    fn ensure_group_loaded(&self, key: &Key, canonical: &str) -> Result<()> {
        let group = key.group();

        let mut tracker = self.fetch_tracker.lock();
        let stale_waiters = match tracker.in_flight.get_mut(&group) {
            Some(flight) => match flight.status {
                FetchStatus::InProgress => {
                    flight.waiters += 1;
                    None
                }
                // Finished while earlier waiters drain; the entries are in.
                FetchStatus::Complete => return Ok(()),
                // Failed before this request arrived: fetch again.
                FetchStatus::Failed(_) => Some(flight.waiters),
            },
            None => Some(0),
        };

        if let Some(waiters) = stale_waiters {
            // A fetch may have finished between the caller's lookup and here.
            if self.contains(canonical) {
                return Ok(());
            }
            // Waiters still draining a failed flight follow the new one.
            tracker.in_flight.insert(
                group.clone(),
                InFlight {
                    status: FetchStatus::InProgress,
                    waiters,
                },
            );
            drop(tracker);
            return self.lead_fetch(key, &group);
        }

        trace!(location = %group.location, kind = %group.kind, "waiting on in-flight fetch");
        loop {
            let status = tracker.in_flight.get(&group).map(|f| f.status.clone());
            match status {
                Some(FetchStatus::InProgress) => self.fetch_complete.wait(&mut tracker),
                Some(done) => {
                    let last_out = tracker.in_flight.get_mut(&group).is_some_and(|f| {
                        f.waiters -= 1;
                        f.waiters == 0
                    });
                    if last_out {
                        tracker.in_flight.remove(&group);
                    }
                    return match done {
                        FetchStatus::Failed(reason) => Err(HazardError::FetchFailed {
                            location: group.location,
                            kind: group.kind.as_str(),
                            reason,
                        }),
                        _ => Ok(()),
                    };
                }
                // Entries are only removed once every waiter has left.
                None => return Ok(()),
            }
        }
    }

    /// Fetch a group as its leader and wake anyone waiting on it.
    ///
    /// The flight is settled even if the store panics, so waiters and later
    /// lookups are never left blocked on it.
    fn lead_fetch(&self, key: &Key, group: &GroupKey) -> Result<()> {
        let mut flight = FlightGuard {
            cache: self,
            group,
            outcome: None,
        };
        let result = self.fetch_group(key);
        flight.outcome = Some(match &result {
            Ok(()) => FetchStatus::Complete,
            Err(e) => FetchStatus::Failed(e.to_string()),
        });
        drop(flight);
        result
    }

    /// Record a leader's outcome and wake the group's waiters.
    fn settle_flight(&self, group: &GroupKey, status: FetchStatus) {
        {
            let mut tracker = self.fetch_tracker.lock();
            let remove = match tracker.in_flight.get_mut(group) {
                Some(flight) => {
                    flight.status = status;
                    flight.waiters == 0
                }
                None => false,
            };
            if remove {
                tracker.in_flight.remove(group);
            }
        }
        self.fetch_complete.notify_all();
    }

    /// Query the store for every curve in the key's group and cache them.
    ///
    /// The response is fully converted before anything is inserted, so a
    /// failure leaves the cache untouched.
    fn fetch_group(&self, key: &Key) -> Result<()> {
        let kind = key.selector.kind();
        let locations = [key.location.clone()];
        let labels = QueryLabels::new(&self.hazard_id, kind.as_str()).to_labels();

        debug!(
            hazard_id = %self.hazard_id,
            location = %key.location,
            kind = %kind,
            "querying hazard store"
        );
        let model = model_labels(&self.hazard_id);
        metrics::counter!(metric_defs::CACHE_MISSES.name, &model).increment(1);
        metrics::counter!(metric_defs::STORE_QUERIES.name, &labels).increment(1);
        self.queries.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        let response = match kind {
            SelectorKind::Realization => self
                .store
                .realization_curves(&self.hazard_id, self.vs30, &locations, None)
                .map(|records| {
                    records
                        .into_iter()
                        .map(|r| (Selector::from(r.rlz), r.values))
                        .collect::<Vec<_>>()
                }),
            SelectorKind::Aggregate => self
                .store
                .aggregate_curves(&self.hazard_id, self.vs30, &locations, None)
                .map(|records| {
                    records
                        .into_iter()
                        .map(|r| (Selector::Aggregate(r.agg), r.values))
                        .collect()
                }),
        };
        metrics::histogram!(metric_defs::STORE_QUERY_DURATION.name, &labels)
            .record(start.elapsed().as_secs_f64());

        let batch = collect_batch(&key.location, response?)?;
        let inserted = batch.len();

        let total = {
            let mut entries = self.entries.write();
            entries.extend(batch);
            entries.len()
        };

        debug!(
            hazard_id = %self.hazard_id,
            location = %key.location,
            kind = %kind,
            inserted,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "cached hazard curves"
        );
        let model = model_labels(&self.hazard_id);
        metrics::counter!(metric_defs::CACHE_ENTRIES_INSERTED.name, &model)
            .increment(inserted as u64);
        metrics::gauge!(metric_defs::CACHE_ENTRIES.name, &model).set(total as f64);

        Ok(())
    }
}

/// Turn `(selector, curves)` records into cache entries keyed under `location`.
fn collect_batch(
    location: &str,
    records: Vec<(Selector, Vec<ImtValues>)>,
) -> Result<Vec<(String, Arc<CurveValue>)>> {
    let mut batch = Vec::new();
    for (selector, values) in records {
        for v in values {
            let curve = CurveValue::new(v.lvls, v.vals)?;
            let key = Key::new(v.imt, location, selector.clone());
            batch.push((key.to_string(), Arc::new(curve)));
        }
    }
    Ok(batch)
}

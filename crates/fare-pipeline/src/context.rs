//! Per-run state shared by every stage.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use wingo_client::models::{Route, Service};

use crate::config::PipelineConfig;
use crate::snapshot::{FlightKey, Snapshot};
use crate::source::FareSource;
use crate::store::SnapshotStore;
use crate::window::DateWindow;

/// Fee quotes memoized per route for the duration of one run.
#[derive(Debug, Default)]
pub struct FeeCache {
    quotes: Mutex<HashMap<Route, Vec<Service>>>,
}

impl FeeCache {
    pub fn get(&self, route: &Route) -> Option<Vec<Service>> {
        self.quotes.lock().get(route).cloned()
    }

    pub fn insert(&self, route: Route, services: Vec<Service>) {
        self.quotes.lock().insert(route, services);
    }

    pub fn len(&self) -> usize {
        self.quotes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.lock().is_empty()
    }
}

/// Counters updated concurrently by the stage workers.
#[derive(Debug, Default)]
pub struct RunStats {
    pub windows: AtomicUsize,
    pub windows_failed: AtomicUsize,
    pub flights_resolved: AtomicUsize,
    pub flights_failed: AtomicUsize,
    pub archive_failures: AtomicUsize,
}

impl RunStats {
    pub(crate) fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn load(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}

/// Which parts of the run were fetched completely.
///
/// A previous flight may only be reported unavailable when its route window
/// resolved and its own fee quote did not fail.
#[derive(Debug, Default)]
pub struct Coverage {
    windows: Mutex<HashMap<Route, Vec<DateWindow>>>,
    failed_flights: Mutex<HashSet<FlightKey>>,
}

impl Coverage {
    pub(crate) fn window_resolved(&self, route: Route, window: DateWindow) {
        self.windows.lock().entry(route).or_default().push(window);
    }

    pub(crate) fn flight_failed(&self, key: FlightKey) {
        self.failed_flights.lock().insert(key);
    }

    pub fn covers(&self, key: &FlightKey) -> bool {
        let route = Route::new(&key.origin, &key.destination);
        let resolved = self
            .windows
            .lock()
            .get(&route)
            .is_some_and(|windows| windows.iter().any(|w| w.contains(key.date)));
        resolved && !self.failed_flights.lock().contains(key)
    }

    /// The part of `previous` this run actually re-checked.
    pub fn scope(&self, previous: &Snapshot) -> Snapshot {
        previous
            .iter()
            .filter(|(key, _)| self.covers(key))
            .map(|(_, flight)| flight.clone())
            .collect()
    }
}

/// Outcome counts of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub routes: usize,
    pub windows: usize,
    pub windows_failed: usize,
    pub flights_resolved: usize,
    pub flights_failed: usize,
    pub archive_failures: usize,
    pub events: usize,
    pub requests: u64,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}

/// Everything a stage worker needs: the upstream, the store, the switches,
/// the run's cancellation token and its counters.
#[derive(Clone)]
pub struct RunContext {
    pub source: Arc<dyn FareSource>,
    pub store: Arc<dyn SnapshotStore>,
    pub config: PipelineConfig,
    pub token: CancellationToken,
    pub stats: Arc<RunStats>,
    pub coverage: Arc<Coverage>,
    fee_cache: Option<Arc<FeeCache>>,
}

impl RunContext {
    pub fn new(
        source: Arc<dyn FareSource>,
        store: Arc<dyn SnapshotStore>,
        config: PipelineConfig,
        token: CancellationToken,
    ) -> Self {
        let fee_cache = config.fee_cache.then(|| Arc::new(FeeCache::default()));
        Self {
            source,
            store,
            config,
            token,
            stats: Arc::new(RunStats::default()),
            coverage: Arc::new(Coverage::default()),
            fee_cache,
        }
    }

    pub fn fee_cache(&self) -> Option<&FeeCache> {
        self.fee_cache.as_deref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn summary(&self, routes: usize, events: usize, elapsed: Duration) -> RunSummary {
        let stats = &self.stats;
        RunSummary {
            routes,
            windows: RunStats::load(&stats.windows),
            windows_failed: RunStats::load(&stats.windows_failed),
            flights_resolved: RunStats::load(&stats.flights_resolved),
            flights_failed: RunStats::load(&stats.flights_failed),
            archive_failures: RunStats::load(&stats.archive_failures),
            events,
            requests: self.source.request_count(),
            elapsed,
        }
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("fee_cache", &self.fee_cache.is_some())
            .finish_non_exhaustive()
    }
}

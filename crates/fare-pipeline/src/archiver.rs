//! Archiver: the actual snapshot plus best-effort persistence.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::context::{RunContext, RunStats};
use crate::snapshot::{ResolvedFlight, Snapshot};
use crate::store::archive_flight;

/// The snapshot being built by a run, shared by the archive workers.
#[derive(Debug, Clone, Default)]
pub struct SharedSnapshot {
    inner: Arc<Mutex<Snapshot>>,
}

impl SharedSnapshot {
    pub fn insert(&self, flight: ResolvedFlight) -> Option<ResolvedFlight> {
        self.inner.lock().insert(flight)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Take the finished snapshot out, leaving an empty one behind.
    pub fn take(&self) -> Snapshot {
        std::mem::take(&mut *self.inner.lock())
    }
}

/// Record one resolved flight in memory, then in the store.
///
/// A failed write is counted and logged; the in-memory entry stays, since
/// the diff only looks at the in-memory snapshot.
pub async fn archive(ctx: &RunContext, actual: &SharedSnapshot, flight: ResolvedFlight) {
    let key = flight.key();
    let write = archive_flight(ctx.store.as_ref(), &flight).await;

    if let Some(replaced) = actual.insert(flight) {
        debug!(key = %key, previous_price = replaced.price(), "Duplicate flight replaced");
    }

    if let Err(e) = write {
        RunStats::incr(&ctx.stats.archive_failures);
        warn!(key = %key, error = %e, "Failed to archive flight");
    }
}

//! Session state: the mission store plus the current cargo capacity.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::info;

use crate::{
    capacity::{module_snapshot_from_loadout, CapacityTracker, ModuleSnapshot},
    ingest::{self, Ingested, ReplayStats},
    mission::MissionStore,
    summary::{self, Advertisement, HaulSummary},
};

/// Journal event carrying the ship's module list.
const LOADOUT_EVENT: &str = "Loadout";

/// Owns everything reconstructed from one commander's journal.
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    store: MissionStore,
    capacity: CapacityTracker,
}

impl Tracker {
    /// Empty tracker with unknown capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// The mission store.
    pub fn store(&self) -> &MissionStore {
        &self.store
    }

    /// Current cargo capacity.
    pub fn capacity(&self) -> u64 {
        self.capacity.capacity()
    }

    /// Run a record through the ingestion pipeline.
    pub fn ingest(&mut self, record: &Value) -> Ingested {
        ingest::ingest(&mut self.store, record)
    }

    /// Decode and ingest one journal line.
    pub fn ingest_line(&mut self, line: &str) -> Ingested {
        ingest::ingest_line(&mut self.store, line)
    }

    /// Handle a journal record the way the host delivers them: `Loadout`
    /// records refresh the capacity, everything else is ingested.
    pub fn observe(&mut self, record: &Value) -> Ingested {
        if record.get("event").and_then(Value::as_str) == Some(LOADOUT_EVENT) {
            if let Some(modules) = module_snapshot_from_loadout(record) {
                let capacity = self.refresh_capacity(&modules);
                info!(capacity, "cargo capacity refreshed from loadout");
            }
            return Ingested::Ignored;
        }
        self.ingest(record)
    }

    /// Observe a batch of records in order.
    pub fn replay<'a>(&mut self, records: impl IntoIterator<Item = &'a Value>) -> ReplayStats {
        let mut stats = ReplayStats::default();
        for record in records {
            stats.record(&self.observe(record));
        }
        stats
    }

    /// Replace the capacity from a module snapshot.
    pub fn refresh_capacity(&mut self, modules: &ModuleSnapshot) -> u64 {
        self.capacity.refresh(modules)
    }

    /// Replace the capacity from a host state object.
    pub fn refresh_capacity_from_state(&mut self, state: &Value) -> u64 {
        self.capacity.refresh_from_state(state)
    }

    /// Hauling summary for the open missions.
    pub fn haul_summary(&self) -> HaulSummary {
        summary::haul_summary(self.store.open_missions(), self.capacity())
    }

    /// Stack advertisement for the open missions.
    pub fn advertisement(&self) -> Advertisement {
        summary::advertise(self.store.open_missions())
    }
}

/// A [`Tracker`] shared between the live journal tail and catch-up replays.
///
/// Writers hold the lock for a whole batch, so readers observe either the
/// state before a batch or after it.
#[derive(Debug, Clone, Default)]
pub struct SharedTracker {
    inner: Arc<RwLock<Tracker>>,
}

impl SharedTracker {
    /// Wrap an existing tracker.
    pub fn new(tracker: Tracker) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tracker)),
        }
    }

    /// Observe a batch of records under a single write lock.
    pub fn replay<'a>(&self, records: impl IntoIterator<Item = &'a Value>) -> ReplayStats {
        self.inner.write().replay(records)
    }

    /// Replace the capacity from a module snapshot.
    pub fn refresh_capacity(&self, modules: &ModuleSnapshot) -> u64 {
        self.inner.write().refresh_capacity(modules)
    }

    /// Swap in a freshly rebuilt tracker.
    pub fn reset(&self, tracker: Tracker) {
        *self.inner.write() = tracker;
    }

    /// Current cargo capacity.
    pub fn capacity(&self) -> u64 {
        self.inner.read().capacity()
    }

    /// Number of open missions.
    pub fn open_count(&self) -> usize {
        self.inner.read().store().open_missions().count()
    }

    /// Hauling summary computed under the read lock.
    pub fn haul_summary(&self) -> HaulSummary {
        self.inner.read().haul_summary()
    }

    /// Advertisement computed under the read lock.
    pub fn advertisement(&self) -> Advertisement {
        self.inner.read().advertisement()
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> Tracker {
        self.inner.read().clone()
    }
}

//! Mission entities and the store that applies lifecycle events to them.

use chrono::{DateTime, Utc};
use indexmap::{map::Entry, IndexMap};
use serde::Serialize;
use tracing::trace;

use crate::event::{
    CargoDeliveryUpdate, Event, MissionAbandoned, MissionAccepted, MissionCompleted, MissionId,
    FIVE_STAR_REPUTATION,
};

/// Most recent lifecycle update recorded against a mission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Progress {
    /// Partial delivery reported by a cargo depot.
    Delivery(CargoDeliveryUpdate),
    /// Terminal: the mission was handed in.
    Completed(MissionCompleted),
    /// Terminal: the mission was dropped.
    Abandoned(MissionAbandoned),
}

impl Progress {
    /// Timestamp of the underlying journal record.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Progress::Delivery(update) => update.timestamp,
            Progress::Completed(event) => event.timestamp,
            Progress::Abandoned(event) => event.timestamp,
        }
    }

    /// Whether this update closed the mission.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Progress::Delivery(_))
    }
}

/// A tracked wing hauling mission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mission {
    /// Unique mission identifier.
    pub id: MissionId,
    /// Internal commodity symbol.
    pub commodity: String,
    /// Commodity name as shown in game.
    pub commodity_localised: String,
    /// Units requested at acceptance.
    pub count: u64,
    /// System the cargo must be delivered to.
    pub destination_system: String,
    /// Station the cargo must be delivered to.
    pub destination_station: String,
    /// Credit reward, when the board advertised one.
    pub reward: Option<u64>,
    /// Reputation tier, e.g. `+++++`.
    pub reputation: Option<String>,
    /// Influence tier.
    pub influence: Option<String>,
    /// Deadline for delivery.
    pub expiry: DateTime<Utc>,
    /// When the mission was accepted.
    pub accepted_at: DateTime<Utc>,
    open: bool,
    latest_progress: Option<Progress>,
}

impl Mission {
    fn from_accepted(event: MissionAccepted) -> Self {
        Self {
            id: event.mission_id,
            commodity: event.commodity,
            commodity_localised: event.commodity_localised,
            count: event.count,
            destination_system: event.destination_system,
            destination_station: event.destination_station,
            reward: event.reward,
            reputation: event.reputation,
            influence: event.influence,
            expiry: event.expiry,
            accepted_at: event.timestamp,
            open: true,
            latest_progress: None,
        }
    }

    /// `false` once the mission has been completed or abandoned.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The latest applied delivery update or terminal marker.
    pub fn latest_progress(&self) -> Option<&Progress> {
        self.latest_progress.as_ref()
    }

    /// Units still to be hauled; zero once the mission is closed.
    pub fn remaining_haul(&self) -> u64 {
        if !self.open {
            return 0;
        }
        match &self.latest_progress {
            Some(Progress::Delivery(update)) => update.outstanding(),
            _ => self.count,
        }
    }

    /// Whether the mission pays the maximum reputation tier.
    pub fn is_five_star(&self) -> bool {
        self.reputation.as_deref() == Some(FIVE_STAR_REPUTATION)
    }

    // Only ever moves forward in time; closed missions are frozen.
    fn advance(&mut self, update: CargoDeliveryUpdate) -> bool {
        if !self.open {
            return false;
        }
        let newer = match &self.latest_progress {
            None => true,
            Some(current) => update.timestamp > current.timestamp(),
        };
        if newer {
            self.latest_progress = Some(Progress::Delivery(update));
        }
        newer
    }

    fn close(&mut self, terminal: Progress) {
        self.latest_progress = Some(terminal);
        self.open = false;
    }
}

/// Effect an event had on the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A new mission is now tracked.
    Inserted,
    /// The mission id was already tracked; nothing changed.
    Duplicate,
    /// Delivery progress advanced.
    Progressed,
    /// The update was older than recorded progress or the mission is closed.
    Stale,
    /// The mission is now closed.
    Closed,
    /// No tracked mission carries this id.
    Unmatched,
}

/// Missions accepted during the session, keyed by id in acceptance order.
///
/// The store performs no locking of its own; see
/// [`SharedTracker`](crate::SharedTracker) for concurrent producers.
#[derive(Debug, Clone, Default)]
pub struct MissionStore {
    missions: IndexMap<MissionId, Mission>,
}

impl MissionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a lifecycle event.
    ///
    /// Re-accepting a tracked id, replaying an older delivery update or
    /// closing an already closed mission are all safe, so overlapping
    /// windows of journal files can be replayed freely.
    pub fn apply(&mut self, event: Event) -> Applied {
        let mission_id = event.mission_id();
        let applied = match event {
            Event::MissionAccepted(accepted) => match self.missions.entry(accepted.mission_id) {
                Entry::Occupied(_) => Applied::Duplicate,
                Entry::Vacant(slot) => {
                    slot.insert(Mission::from_accepted(accepted));
                    Applied::Inserted
                }
            },
            Event::CargoDelivery(update) => match self.missions.get_mut(&update.mission_id) {
                Some(mission) => {
                    if mission.advance(update) {
                        Applied::Progressed
                    } else {
                        Applied::Stale
                    }
                }
                None => Applied::Unmatched,
            },
            Event::MissionCompleted(completed) => {
                self.close(completed.mission_id, Progress::Completed(completed))
            }
            Event::MissionAbandoned(abandoned) => {
                self.close(abandoned.mission_id, Progress::Abandoned(abandoned))
            }
        };
        trace!(mission_id, ?applied, "applied mission event");
        applied
    }

    fn close(&mut self, mission_id: MissionId, terminal: Progress) -> Applied {
        match self.missions.get_mut(&mission_id) {
            Some(mission) => {
                mission.close(terminal);
                Applied::Closed
            }
            None => Applied::Unmatched,
        }
    }

    /// Open missions in acceptance order.
    pub fn open_missions(&self) -> impl Iterator<Item = &Mission> + '_ {
        self.missions.values().filter(|mission| mission.is_open())
    }

    /// Every tracked mission, closed ones included, in acceptance order.
    pub fn missions(&self) -> impl Iterator<Item = &Mission> + '_ {
        self.missions.values()
    }

    /// Look up a mission by id.
    pub fn get(&self, mission_id: MissionId) -> Option<&Mission> {
        self.missions.get(&mission_id)
    }

    /// Number of tracked missions, closed ones included.
    pub fn len(&self) -> usize {
        self.missions.len()
    }

    /// `true` when no mission has been accepted.
    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }
}

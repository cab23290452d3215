#![warn(clippy::all, missing_docs)]

//! Core domain logic for the wing mission stack tracker.
//!
//! This crate reconstructs the state of open wing hauling missions from
//! the game's journal stream and derives the hauling summary and stack
//! advertisement shown by the terminal UI.

pub mod capacity;
pub mod config;
pub mod error;
pub mod event;
pub mod ingest;
pub mod journal;
pub mod mission;
pub mod summary;
pub mod tracker;

pub use capacity::{CapacityTracker, ModuleSnapshot};
pub use config::AppConfig;
pub use error::EventError;
pub use event::{
    CargoDeliveryUpdate, Event, EventKind, MissionAbandoned, MissionAccepted, MissionCompleted,
    MissionId,
};
pub use ingest::{ingest, Ingested, ReplayStats};
pub use journal::{JournalDirectory, JournalTail, WindowReplay};
pub use mission::{Applied, Mission, MissionStore, Progress};
pub use summary::{Advertisement, CommodityHaul, HaulSummary, SystemStack, Trips};
pub use tracker::{SharedTracker, Tracker};

//! Errors raised while turning journal records into typed events.

use thiserror::Error;

use crate::event::{EventKind, MissionId};

/// Reasons a recognised journal record could not become an [`Event`](crate::Event).
///
/// None of these are fatal: the ingestion pipeline discards the record and
/// carries on with the rest of the stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The record lacks one or more fields its kind requires.
    #[error("{kind} record is missing required fields: {}", .missing.join(", "))]
    MissingField {
        /// Kind declared by the record's `event` field.
        kind: EventKind,
        /// Every required field that was absent.
        missing: Vec<&'static str>,
    },
    /// A mission acceptance that is not flagged as a wing mission.
    #[error("mission {mission_id} is not a wing mission")]
    InvalidMission {
        /// Identifier of the rejected mission.
        mission_id: MissionId,
    },
    /// A required field is present but carries an unusable value.
    #[error("{kind} record is malformed: {reason}")]
    Malformed {
        /// Kind declared by the record's `event` field.
        kind: EventKind,
        /// Decoder message describing the offending value.
        reason: String,
    },
}

//! Routes decoded journal records into the mission store.

use serde_json::Value;
use tracing::debug;

use crate::{
    error::EventError,
    event::{Event, EventKind},
    mission::{Applied, MissionStore},
};

/// What happened to a single journal record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    /// The record became an event and was applied.
    Applied {
        /// Kind of the applied event.
        kind: EventKind,
        /// Effect on the store.
        outcome: Applied,
    },
    /// The record's kind is not relevant to mission tracking.
    Ignored,
    /// The record was relevant but invalid and has been discarded.
    Rejected(EventError),
    /// The line was not valid JSON.
    Undecodable,
}

/// Feed one decoded record to `store`.
///
/// Never fails: irrelevant records are ignored and invalid ones discarded,
/// leaving the store untouched.
pub fn ingest(store: &mut MissionStore, record: &Value) -> Ingested {
    let Some(fields) = record.as_object() else {
        return Ingested::Ignored;
    };
    let Some(kind) = fields
        .get("event")
        .and_then(Value::as_str)
        .and_then(EventKind::from_name)
    else {
        return Ingested::Ignored;
    };

    match Event::from_record(kind, fields) {
        Ok(event) => Ingested::Applied {
            kind,
            outcome: store.apply(event),
        },
        Err(err) => {
            debug!(%kind, error = %err, "discarding journal record");
            Ingested::Rejected(err)
        }
    }
}

/// Decode one journal line and feed it to `store`.
pub fn ingest_line(store: &mut MissionStore, line: &str) -> Ingested {
    match serde_json::from_str::<Value>(line) {
        Ok(record) => ingest(store, &record),
        Err(err) => {
            debug!(error = %err, "skipping undecodable journal line");
            Ingested::Undecodable
        }
    }
}

/// Tally of a batch replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records turned into events and applied.
    pub applied: usize,
    /// Records of irrelevant kinds.
    pub ignored: usize,
    /// Relevant records discarded as invalid.
    pub rejected: usize,
    /// Lines that were not JSON.
    pub undecodable: usize,
}

impl ReplayStats {
    /// Count one outcome.
    pub fn record(&mut self, ingested: &Ingested) {
        match ingested {
            Ingested::Applied { .. } => self.applied += 1,
            Ingested::Ignored => self.ignored += 1,
            Ingested::Rejected(_) => self.rejected += 1,
            Ingested::Undecodable => self.undecodable += 1,
        }
    }

    /// Fold another tally into this one.
    pub fn merge(&mut self, other: ReplayStats) {
        self.applied += other.applied;
        self.ignored += other.ignored;
        self.rejected += other.rejected;
        self.undecodable += other.undecodable;
    }

    /// Total records seen.
    pub fn total(&self) -> usize {
        self.applied + self.ignored + self.rejected + self.undecodable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tea_acceptance() -> Value {
        json!({
            "timestamp": "2024-05-01T12:00:00Z",
            "event": "MissionAccepted",
            "Commodity": "$Tea_Name;",
            "Commodity_Localised": "Tea",
            "Count": 100,
            "DestinationSystem": "Sol",
            "DestinationStation": "Abraham Lincoln",
            "Expiry": "2024-05-08T12:00:00Z",
            "Wing": true,
            "MissionID": 42
        })
    }

    #[test]
    fn applies_recognised_records() {
        let mut store = MissionStore::new();
        assert_eq!(
            ingest(&mut store, &tea_acceptance()),
            Ingested::Applied {
                kind: EventKind::MissionAccepted,
                outcome: Applied::Inserted
            }
        );
        assert_eq!(store.get(42).unwrap().remaining_haul(), 100);
    }

    #[test]
    fn missing_count_leaves_store_unchanged() {
        let mut store = MissionStore::new();
        let mut record = tea_acceptance();
        record.as_object_mut().unwrap().remove("Count");

        assert_eq!(
            ingest(&mut store, &record),
            Ingested::Rejected(EventError::MissingField {
                kind: EventKind::MissionAccepted,
                missing: vec!["Count"],
            })
        );
        assert!(store.is_empty());
    }

    #[test]
    fn solo_mission_is_rejected() {
        let mut store = MissionStore::new();
        let mut record = tea_acceptance();
        record["Wing"] = json!(false);
        assert_eq!(
            ingest(&mut store, &record),
            Ingested::Rejected(EventError::InvalidMission { mission_id: 42 })
        );
        assert!(store.is_empty());
    }

    #[test]
    fn unrelated_records_are_ignored() {
        let mut store = MissionStore::new();
        for record in [
            json!({ "event": "Docked", "StationName": "Abraham Lincoln" }),
            json!({ "timestamp": "2024-05-01T12:00:00Z" }),
            json!({ "event": 7 }),
            json!([1, 2, 3]),
        ] {
            assert_eq!(ingest(&mut store, &record), Ingested::Ignored);
        }
        assert!(store.is_empty());
    }

    #[test]
    fn bad_record_does_not_stop_the_batch() {
        let mut store = MissionStore::new();
        let acceptance = tea_acceptance().to_string();
        let lines = [
            r#"{"event":"MissionAccepted","timestamp":"2024-05-01T12:00:00Z","MissionID":1}"#,
            "{not json",
            r#"{"event":"Music","MusicTrack":"Exploration"}"#,
            acceptance.as_str(),
        ];
        let mut stats = ReplayStats::default();
        for line in lines {
            stats.record(&ingest_line(&mut store, line));
        }
        assert_eq!(
            stats,
            ReplayStats {
                applied: 1,
                ignored: 1,
                rejected: 1,
                undecodable: 1
            }
        );
        assert_eq!(stats.total(), 4);
        assert_eq!(store.len(), 1);
    }
}

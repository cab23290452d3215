#![allow(missing_docs)]

//! Typed journal events relevant to wing mission tracking.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EventError;

/// Format used by every timestamp-bearing journal field.
pub const JOURNAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Five-star reputation marker as written in `MissionAccepted.Reputation`.
pub const FIVE_STAR_REPUTATION: &str = "+++++";

pub type MissionId = u64;

/// Journal event kinds the tracker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    MissionAccepted,
    MissionCompleted,
    MissionAbandoned,
    CargoDepot,
}

impl EventKind {
    /// Resolve a journal `event` name, returning `None` for kinds the tracker ignores.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "MissionAccepted" => Some(Self::MissionAccepted),
            "MissionCompleted" => Some(Self::MissionCompleted),
            "MissionAbandoned" => Some(Self::MissionAbandoned),
            "CargoDepot" => Some(Self::CargoDepot),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissionAccepted => "MissionAccepted",
            Self::MissionCompleted => "MissionCompleted",
            Self::MissionAbandoned => "MissionAbandoned",
            Self::CargoDepot => "CargoDepot",
        }
    }

    /// Fields a record of this kind must carry to be usable.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::MissionAccepted => &[
                "MissionID",
                "timestamp",
                "Commodity",
                "Commodity_Localised",
                "Count",
                "DestinationSystem",
                "DestinationStation",
                "Expiry",
                "Wing",
            ],
            Self::MissionCompleted => &[
                "MissionID",
                "timestamp",
                "Commodity",
                "Count",
                "DestinationSystem",
                "DestinationStation",
            ],
            Self::MissionAbandoned => &["MissionID", "timestamp"],
            Self::CargoDepot => &[
                "MissionID",
                "timestamp",
                "ItemsDelivered",
                "TotalItemsToDeliver",
            ],
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mission taken from a mission board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MissionAccepted {
    #[serde(rename = "MissionID")]
    pub mission_id: MissionId,
    #[serde(rename = "timestamp", with = "journal_time")]
    pub timestamp: DateTime<Utc>,
    pub commodity: String,
    #[serde(rename = "Commodity_Localised")]
    pub commodity_localised: String,
    pub count: u64,
    pub destination_system: String,
    pub destination_station: String,
    #[serde(with = "journal_time")]
    pub expiry: DateTime<Utc>,
    pub wing: bool,
    #[serde(default)]
    pub reward: Option<u64>,
    #[serde(default)]
    pub reputation: Option<String>,
    #[serde(default)]
    pub influence: Option<String>,
    #[serde(default)]
    pub faction: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "LocalisedName")]
    pub localised_name: Option<String>,
    /// Fields the tracker does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A mission handed in for its reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MissionCompleted {
    #[serde(rename = "MissionID")]
    pub mission_id: MissionId,
    #[serde(rename = "timestamp", with = "journal_time")]
    pub timestamp: DateTime<Utc>,
    pub commodity: String,
    #[serde(default, rename = "Commodity_Localised")]
    pub commodity_localised: Option<String>,
    pub count: u64,
    pub destination_system: String,
    pub destination_station: String,
    #[serde(default)]
    pub reward: Option<u64>,
    #[serde(default)]
    pub faction: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A mission dropped before completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MissionAbandoned {
    #[serde(rename = "MissionID")]
    pub mission_id: MissionId,
    #[serde(rename = "timestamp", with = "journal_time")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "LocalisedName")]
    pub localised_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Delivery progress reported by a `CargoDepot` record.
///
/// Wing members' deliveries arrive as `WingUpdate` records which omit the
/// cargo type and count, so only the progress counters are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CargoDeliveryUpdate {
    #[serde(rename = "MissionID")]
    pub mission_id: MissionId,
    #[serde(rename = "timestamp", with = "journal_time")]
    pub timestamp: DateTime<Utc>,
    pub items_delivered: u64,
    pub total_items_to_deliver: u64,
    #[serde(default)]
    pub update_type: Option<String>,
    #[serde(default)]
    pub cargo_type: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub items_collected: Option<u64>,
    #[serde(default, rename = "StartMarketID")]
    pub start_market_id: Option<u64>,
    #[serde(default, rename = "EndMarketID")]
    pub end_market_id: Option<u64>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CargoDeliveryUpdate {
    /// Units still owed according to this update.
    pub fn outstanding(&self) -> u64 {
        self.total_items_to_deliver
            .saturating_sub(self.items_delivered)
    }
}

/// A validated journal event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    MissionAccepted(MissionAccepted),
    MissionCompleted(MissionCompleted),
    MissionAbandoned(MissionAbandoned),
    CargoDelivery(CargoDeliveryUpdate),
}

impl Event {
    /// Build the typed event for `kind` from a decoded journal record.
    ///
    /// All missing required fields are reported together. Acceptances of
    /// non-wing missions are rejected with [`EventError::InvalidMission`].
    pub fn from_record(kind: EventKind, record: &Map<String, Value>) -> Result<Self, EventError> {
        let missing: Vec<&'static str> = kind
            .required_fields()
            .iter()
            .copied()
            .filter(|field| !record.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            return Err(EventError::MissingField { kind, missing });
        }

        let mut fields = record.clone();
        fields.remove("event");
        let fields = Value::Object(fields);

        let event = match kind {
            EventKind::MissionAccepted => {
                let accepted: MissionAccepted = decode(kind, fields)?;
                if !accepted.wing {
                    return Err(EventError::InvalidMission {
                        mission_id: accepted.mission_id,
                    });
                }
                Event::MissionAccepted(accepted)
            }
            EventKind::MissionCompleted => Event::MissionCompleted(decode(kind, fields)?),
            EventKind::MissionAbandoned => Event::MissionAbandoned(decode(kind, fields)?),
            EventKind::CargoDepot => Event::CargoDelivery(decode(kind, fields)?),
        };
        Ok(event)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::MissionAccepted(_) => EventKind::MissionAccepted,
            Event::MissionCompleted(_) => EventKind::MissionCompleted,
            Event::MissionAbandoned(_) => EventKind::MissionAbandoned,
            Event::CargoDelivery(_) => EventKind::CargoDepot,
        }
    }

    pub fn mission_id(&self) -> MissionId {
        match self {
            Event::MissionAccepted(event) => event.mission_id,
            Event::MissionCompleted(event) => event.mission_id,
            Event::MissionAbandoned(event) => event.mission_id,
            Event::CargoDelivery(event) => event.mission_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::MissionAccepted(event) => event.timestamp,
            Event::MissionCompleted(event) => event.timestamp,
            Event::MissionAbandoned(event) => event.timestamp,
            Event::CargoDelivery(event) => event.timestamp,
        }
    }
}

fn decode<T>(kind: EventKind, fields: Value) -> Result<T, EventError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(fields).map_err(|err| EventError::Malformed {
        kind,
        reason: err.to_string(),
    })
}

/// Parse a journal timestamp such as `2024-05-01T18:30:45Z`.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, JOURNAL_TIME_FORMAT).map(|naive| naive.and_utc())
}

mod journal_time {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::{parse_timestamp, JOURNAL_TIME_FORMAT};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(JOURNAL_TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .map_err(|err| de::Error::custom(format!("invalid timestamp '{raw}': {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn accepted_record() -> Value {
        json!({
            "timestamp": "2024-05-01T18:30:45Z",
            "event": "MissionAccepted",
            "Faction": "Sirius Corporation",
            "Name": "Mission_DeliveryWing_name",
            "LocalisedName": "Deliver Tea",
            "Commodity": "$Tea_Name;",
            "Commodity_Localised": "Tea",
            "Count": 720,
            "DestinationSystem": "Sol",
            "DestinationStation": "Abraham Lincoln",
            "Expiry": "2024-05-08T18:30:45Z",
            "Wing": true,
            "Influence": "++",
            "Reputation": "+++++",
            "Reward": 45000000,
            "MissionID": 951234567
        })
    }

    #[test]
    fn builds_mission_accepted_with_timestamps() {
        let event = Event::from_record(EventKind::MissionAccepted, &record(accepted_record()))
            .expect("valid acceptance");
        let Event::MissionAccepted(accepted) = event else {
            panic!("wrong variant");
        };
        assert_eq!(accepted.mission_id, 951234567);
        assert_eq!(accepted.commodity_localised, "Tea");
        assert_eq!(accepted.count, 720);
        assert_eq!(accepted.reward, Some(45_000_000));
        assert_eq!(accepted.reputation.as_deref(), Some(FIVE_STAR_REPUTATION));
        assert_eq!(
            accepted.timestamp,
            parse_timestamp("2024-05-01T18:30:45Z").unwrap()
        );
        assert!(accepted.expiry > accepted.timestamp);
        assert!(!accepted.extra.contains_key("event"));
    }

    #[test]
    fn keeps_unlisted_fields() {
        let mut raw = accepted_record();
        raw["PassengerCount"] = json!(3);
        let event = Event::from_record(EventKind::MissionAccepted, &record(raw)).unwrap();
        let Event::MissionAccepted(accepted) = event else {
            panic!("wrong variant");
        };
        assert_eq!(accepted.extra.get("PassengerCount"), Some(&json!(3)));
    }

    #[test]
    fn reports_every_missing_field() {
        let mut raw = record(accepted_record());
        raw.remove("Count");
        raw.remove("Expiry");
        let err = Event::from_record(EventKind::MissionAccepted, &raw).unwrap_err();
        assert_eq!(
            err,
            EventError::MissingField {
                kind: EventKind::MissionAccepted,
                missing: vec!["Count", "Expiry"],
            }
        );
        assert!(err.to_string().contains("Count, Expiry"));
    }

    #[test]
    fn completion_without_destination_is_missing_fields() {
        let raw = json!({
            "timestamp": "2024-05-02T10:00:00Z",
            "event": "MissionCompleted",
            "MissionID": 951234567,
            "Commodity": "$Tea_Name;",
            "Count": 720
        });
        let err = Event::from_record(EventKind::MissionCompleted, &record(raw)).unwrap_err();
        assert_eq!(
            err,
            EventError::MissingField {
                kind: EventKind::MissionCompleted,
                missing: vec!["DestinationSystem", "DestinationStation"],
            }
        );
    }

    #[test]
    fn depot_update_without_counters_is_missing_fields() {
        let raw = json!({
            "timestamp": "2024-05-01T19:00:00Z",
            "event": "CargoDepot",
            "MissionID": 951234567,
            "UpdateType": "Deliver",
            "ItemsDelivered": 200
        });
        let err = Event::from_record(EventKind::CargoDepot, &record(raw)).unwrap_err();
        assert_eq!(
            err,
            EventError::MissingField {
                kind: EventKind::CargoDepot,
                missing: vec!["TotalItemsToDeliver"],
            }
        );
    }

    #[test]
    fn rejects_solo_missions() {
        let mut raw = accepted_record();
        raw["Wing"] = json!(false);
        let err = Event::from_record(EventKind::MissionAccepted, &record(raw)).unwrap_err();
        assert_eq!(
            err,
            EventError::InvalidMission {
                mission_id: 951234567
            }
        );
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let raw = json!({
            "event": "MissionAbandoned",
            "timestamp": "yesterday",
            "MissionID": 1
        });
        let err = Event::from_record(EventKind::MissionAbandoned, &record(raw)).unwrap_err();
        assert!(matches!(
            err,
            EventError::Malformed {
                kind: EventKind::MissionAbandoned,
                ..
            }
        ));
    }

    #[test]
    fn wing_update_without_cargo_type_is_accepted() {
        let raw = json!({
            "timestamp": "2024-05-01T19:00:00Z",
            "event": "CargoDepot",
            "MissionID": 951234567,
            "UpdateType": "WingUpdate",
            "ItemsCollected": 0,
            "ItemsDelivered": 200,
            "TotalItemsToDeliver": 720,
            "Progress": 0.0
        });
        let event = Event::from_record(EventKind::CargoDepot, &record(raw)).unwrap();
        assert_eq!(event.kind(), EventKind::CargoDepot);
        let Event::CargoDelivery(update) = event else {
            panic!("wrong variant");
        };
        assert_eq!(update.outstanding(), 520);
        assert!(update.cargo_type.is_none());
    }

    #[test]
    fn recognises_only_tracked_kinds() {
        assert_eq!(
            EventKind::from_name("CargoDepot"),
            Some(EventKind::CargoDepot)
        );
        assert_eq!(EventKind::from_name("Docked"), None);
        assert_eq!(EventKind::from_name("missionaccepted"), None);
    }
}

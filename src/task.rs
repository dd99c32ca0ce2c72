//! Task snapshots as reported by the job system feeds.
//!
//! A snapshot is one point-in-time description of a task. Both feeds decode
//! into [`TaskSnapshot`]; the push feed never carries `createdAt`, the history
//! feed always does.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Task status as reported on the wire.
///
/// Open enumeration: the six statuses the job system emits, plus `Unknown`
/// carrying the raw value so that new producer states still display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Retrying,
    Scheduled,
    Unknown(String),
}

impl TaskStatus {
    /// Known statuses in display order.
    pub const KNOWN: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::Processing,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Retrying,
        TaskStatus::Scheduled,
    ];

    /// Parse a wire value. Matching is case-insensitive and ignores
    /// surrounding whitespace; anything else becomes `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => TaskStatus::Pending,
            "processing" => TaskStatus::Processing,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            "retrying" => TaskStatus::Retrying,
            "scheduled" => TaskStatus::Scheduled,
            _ => TaskStatus::Unknown(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Retrying => "retrying",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TaskStatus::Unknown(_))
    }

    /// Whether the producer is expected to move a task from `self` to `next`.
    ///
    /// Observed graph: pending -> processing -> completed|failed,
    /// failed -> retrying -> processing, scheduled -> pending. Staying in the
    /// same status is always allowed. Nothing enforces this; the store only
    /// reports transitions outside the graph.
    pub fn can_transition_to(&self, next: &TaskStatus) -> bool {
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
                | (TaskStatus::Failed, TaskStatus::Retrying)
                | (TaskStatus::Retrying, TaskStatus::Processing)
                | (TaskStatus::Scheduled, TaskStatus::Pending)
        )
    }
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        TaskStatus::parse(&value)
    }
}

impl From<TaskStatus> for String {
    fn from(value: TaskStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task arguments in canonical structured form.
///
/// Producers send either a JSON object or a string holding encoded JSON.
/// Normalization happens once, on decode:
/// - object -> as is
/// - string decoding to an object -> that object
/// - any other string -> `{"raw": <string>}`
/// - null -> `{}`
/// - other values -> `{"value": <value>}`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn normalize(value: Value) -> Self {
        match value {
            Value::Object(map) => Payload(map),
            Value::Null => Payload::default(),
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => Payload(map),
                _ => Payload(Map::from_iter([("raw".to_string(), Value::String(text))])),
            },
            other => Payload(Map::from_iter([("value".to_string(), other)])),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pretty-printed JSON for detail views.
    pub fn to_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Payload(map)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Payload::normalize(value))
    }
}

/// One reported state of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub payload: Payload,
    /// Only set on history snapshots.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    /// Producer-assigned version. Not sent by current producers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl TaskSnapshot {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            payload: Payload::default(),
            created_at: None,
            version: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Payload::normalize(payload);
        self
    }
}

/// Decode one push-feed message.
pub fn decode_live(data: &str) -> Result<TaskSnapshot> {
    Ok(serde_json::from_str(data)?)
}

/// Decode a history listing. A `null` body is an empty listing.
pub fn decode_history(body: &[u8]) -> Result<Vec<TaskSnapshot>> {
    let listing: Option<Vec<TaskSnapshot>> = serde_json::from_slice(body)?;
    Ok(listing.unwrap_or_default())
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(TaskStatus::parse("Processing"), TaskStatus::Processing);
        assert_eq!(TaskStatus::parse(" failed "), TaskStatus::Failed);
        assert_eq!(
            TaskStatus::parse("paused"),
            TaskStatus::Unknown("paused".to_string())
        );
    }

    #[test]
    fn unknown_status_round_trips_raw_value() {
        let status: TaskStatus = serde_json::from_value(json!("archived")).expect("status");
        assert!(!status.is_known());
        assert_eq!(serde_json::to_value(&status).expect("value"), json!("archived"));
    }

    #[test]
    fn transition_graph_matches_observed_lifecycle() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(&Processing));
        assert!(Processing.can_transition_to(&Completed));
        assert!(Processing.can_transition_to(&Failed));
        assert!(Failed.can_transition_to(&Retrying));
        assert!(Retrying.can_transition_to(&Processing));
        assert!(Scheduled.can_transition_to(&Pending));
        assert!(Completed.can_transition_to(&Completed));

        assert!(!Completed.can_transition_to(&Pending));
        assert!(!Processing.can_transition_to(&Pending));
        assert!(!Pending.can_transition_to(&Unknown("paused".to_string())));
    }

    #[test]
    fn payload_object_passes_through() {
        let payload = Payload::normalize(json!({"to": "a@b.c", "retries": 2}));
        assert_eq!(payload.get("to"), Some(&json!("a@b.c")));
        assert_eq!(payload.get("retries"), Some(&json!(2)));
    }

    #[test]
    fn payload_encoded_string_is_decoded() {
        let payload = Payload::normalize(json!("{\"to\":\"a@b.c\"}"));
        assert_eq!(payload.get("to"), Some(&json!("a@b.c")));
    }

    #[test]
    fn payload_odd_shapes_are_wrapped() {
        assert!(Payload::normalize(Value::Null).is_empty());
        assert_eq!(
            Payload::normalize(json!("not json")).get("raw"),
            Some(&json!("not json"))
        );
        assert_eq!(
            Payload::normalize(json!("[1,2]")).get("raw"),
            Some(&json!("[1,2]"))
        );
        assert_eq!(Payload::normalize(json!(7)).get("value"), Some(&json!(7)));
    }

    #[test]
    fn decode_live_snapshot_without_created_at() {
        let snapshot = decode_live(
            r#"{"id":"t1","name":"send-email","status":"pending","payload":"{\"to\":\"x\"}"}"#,
        )
        .expect("decode");
        assert_eq!(snapshot.id, "t1");
        assert_eq!(snapshot.name, "send-email");
        assert_eq!(snapshot.status, TaskStatus::Pending);
        assert_eq!(snapshot.payload.get("to"), Some(&json!("x")));
        assert!(snapshot.created_at.is_none());
        assert!(snapshot.version.is_none());
    }

    #[test]
    fn decode_live_rejects_malformed_messages() {
        assert!(decode_live("{not json").is_err());
        assert!(decode_live(r#"{"name":"missing id","status":"pending"}"#).is_err());
    }

    #[test]
    fn decode_history_parses_created_at() {
        let body = br#"[
            {"id":"h1","name":"report","status":"completed","payload":{},"createdAt":"2025-03-01T10:00:00Z"},
            {"id":"h2","name":"report","status":"failed","payload":{},"createdAt":"garbage"}
        ]"#;
        let listing = decode_history(body).expect("history");
        assert_eq!(listing.len(), 2);
        assert_eq!(
            listing[0].created_at,
            parse_timestamp("2025-03-01T10:00:00Z")
        );
        assert!(listing[1].created_at.is_none());
    }

    #[test]
    fn decode_history_null_is_empty() {
        assert!(decode_history(b"null").expect("history").is_empty());
    }

    #[test]
    fn parse_timestamp_returns_utc() {
        let parsed = parse_timestamp("2025-01-12T12:34:56+02:00").expect("timestamp");
        assert_eq!(parsed.timezone(), Utc);
        assert_eq!(format_timestamp(parsed), "2025-01-12 10:34:56");
    }
}

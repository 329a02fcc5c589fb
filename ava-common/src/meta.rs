//! Call metadata container
//!
//! `meta` keeps the full upstream payload plus a few fields owned by the
//! engine. Engine fields are typed; the payload stays an open JSON map.

use crate::coerce::non_blank;
use crate::time::parse_iso8601;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const CALLER_NAME: &str = "caller_name";
const RECORDING_URL: &str = "recording_url";
const STATUS_HISTORY: &str = "status_history";

/// How incoming payload keys override existing ones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Incoming keys always win, including explicit nulls
    #[default]
    LastWriteWins,
    /// Incoming nulls never erase an existing value
    PreferNonNull,
}

/// One entry of a call's status history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl StatusTransition {
    pub fn new(status: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            status: status.into(),
            timestamp,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let status = value.get("status").and_then(non_blank)?;
        let timestamp = value
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(parse_iso8601)?;
        Some(Self::new(status, timestamp))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct CallMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    /// Append-only
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub status_history: Vec<StatusTransition>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl From<Map<String, Value>> for CallMeta {
    fn from(mut payload: Map<String, Value>) -> Self {
        let caller_name = payload
            .remove(CALLER_NAME)
            .as_ref()
            .and_then(non_blank)
            .map(str::to_string);
        let recording_url = payload
            .remove(RECORDING_URL)
            .as_ref()
            .and_then(non_blank)
            .map(str::to_string);
        let status_history = match payload.remove(STATUS_HISTORY) {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(StatusTransition::from_value)
                .collect(),
            _ => Vec::new(),
        };

        Self {
            caller_name,
            recording_url,
            status_history,
            payload,
        }
    }
}

impl From<Value> for CallMeta {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => map.into(),
            _ => Self::default(),
        }
    }
}

impl CallMeta {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Follow a path of object keys through the payload
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.payload.get(*first)?, |value, key| value.get(*key))
    }

    /// Non-blank string at `key`
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(non_blank)
    }

    /// Merge `incoming` into `self`.
    ///
    /// Payload keys are added or overwritten according to `policy`; keys
    /// absent from `incoming` are kept. Engine fields only change when the
    /// incoming value is present, and status history is appended.
    pub fn merge(&mut self, incoming: CallMeta, policy: MergePolicy) {
        for (key, value) in incoming.payload {
            match policy {
                MergePolicy::LastWriteWins => {
                    self.payload.insert(key, value);
                }
                MergePolicy::PreferNonNull => {
                    if !value.is_null() || !self.payload.contains_key(&key) {
                        self.payload.insert(key, value);
                    }
                }
            }
        }

        if incoming.caller_name.is_some() {
            self.caller_name = incoming.caller_name;
        }
        if incoming.recording_url.is_some() {
            self.recording_url = incoming.recording_url;
        }
        self.status_history.extend(incoming.status_history);
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn meta(value: Value) -> CallMeta {
        CallMeta::from(value)
    }

    #[test]
    fn test_engine_fields_are_lifted_out_of_payload() {
        let m = meta(json!({
            "caller_name": "Jane",
            "recording_url": "https://r/1.mp3",
            "status_history": [
                {"status": "ringing", "timestamp": "2024-01-01T10:00:00Z"},
                {"status": "", "timestamp": "2024-01-01T10:00:00Z"},
                "garbage"
            ],
            "status": "ringing"
        }));

        assert_eq!(m.caller_name.as_deref(), Some("Jane"));
        assert_eq!(m.recording_url.as_deref(), Some("https://r/1.mp3"));
        assert_eq!(m.status_history.len(), 1);
        assert!(!m.payload.contains_key("caller_name"));
        assert_eq!(m.get_str("status"), Some("ringing"));
    }

    #[test]
    fn test_merge_keeps_old_keys_and_overwrites_new() {
        let mut existing = meta(json!({"a": 1, "b": 2}));
        existing.merge(meta(json!({"b": 3, "c": 4})), MergePolicy::LastWriteWins);
        assert_eq!(Value::Object(existing.payload), json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_merge_policy_null_handling() {
        let mut lww = meta(json!({"cost": 1.5}));
        lww.merge(meta(json!({"cost": null})), MergePolicy::LastWriteWins);
        assert_eq!(lww.get("cost"), Some(&Value::Null));

        let mut pnn = meta(json!({"cost": 1.5}));
        pnn.merge(meta(json!({"cost": null, "new": null})), MergePolicy::PreferNonNull);
        assert_eq!(pnn.get("cost"), Some(&json!(1.5)));
        assert_eq!(pnn.get("new"), Some(&Value::Null));
    }

    #[test]
    fn test_merge_engine_fields() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let mut existing = CallMeta {
            caller_name: Some("Jane".into()),
            status_history: vec![StatusTransition::new("ringing", t0)],
            ..Default::default()
        };
        let incoming = CallMeta {
            recording_url: Some("https://r/2.mp3".into()),
            status_history: vec![StatusTransition::new("completed", t0)],
            ..Default::default()
        };

        existing.merge(incoming, MergePolicy::LastWriteWins);

        assert_eq!(existing.caller_name.as_deref(), Some("Jane"));
        assert_eq!(existing.recording_url.as_deref(), Some("https://r/2.mp3"));
        let statuses: Vec<_> = existing.status_history.iter().map(|s| s.status.as_str()).collect();
        assert_eq!(statuses, vec!["ringing", "completed"]);
    }

    #[test]
    fn test_json_roundtrip_through_storage() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let mut original = meta(json!({"analytics": {"sentimentScore": 0.8}}));
        original.caller_name = Some("Jane".into());
        original.status_history.push(StatusTransition::new("completed", t0));

        let stored = original.to_json_string().unwrap();
        let restored: CallMeta = serde_json::from_str(&stored).unwrap();
        assert_eq!(restored, original);
        assert_eq!(
            restored.get_path(&["analytics", "sentimentScore"]),
            Some(&json!(0.8))
        );
    }

    #[test]
    fn test_non_object_is_empty() {
        assert_eq!(meta(json!([1, 2])), CallMeta::default());
    }
}

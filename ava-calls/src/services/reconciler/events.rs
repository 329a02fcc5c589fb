//! Inbound webhook event shapes
//!
//! Two sources feed the reconciler: JSON events from the voice provider
//! (Vapi) and form-encoded status callbacks from the telephony carrier
//! (Twilio). Neither carries a tenant id. Both are turned into a
//! [`CallRecord`] plus the [`EventSignals`] used to find the owner.

use super::resolution::EventSignals;
use ava_common::coerce::{coerce_i64, extract_transcript, non_blank};
use ava_common::db::CallRecord;
use ava_common::status::{self, is_terminal};
use ava_common::time::{parse_flexible, parse_iso8601, to_storage};
use ava_common::{CallMeta, Error, Result, StatusTransition, TenantId};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const NO_TRANSCRIPT: &str = "No transcript available";
pub const UNKNOWN_CALLER: &str = "Unknown Caller";

/// Report-level fields copied onto the call object when it lacks them
const REPORT_FIELDS: &[&str] = &[
    "startedAt",
    "endedAt",
    "durationSeconds",
    "duration",
    "cost",
    "transcript",
    "recordingUrl",
    "endedReason",
    "analysis",
    "artifact",
    "customer",
    "assistantId",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VapiEventKind {
    CallStarted,
    StatusUpdate,
    CallEnded,
    EndOfCallReport,
    TranscriptUpdate,
    FunctionCall,
    Other(String),
}

impl VapiEventKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "call.started" => Self::CallStarted,
            "status-update" => Self::StatusUpdate,
            "call.ended" => Self::CallEnded,
            "end-of-call-report" => Self::EndOfCallReport,
            "transcript.update" | "transcript" => Self::TranscriptUpdate,
            "function-call" => Self::FunctionCall,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CallStarted => "call.started",
            Self::StatusUpdate => "status-update",
            Self::CallEnded => "call.ended",
            Self::EndOfCallReport => "end-of-call-report",
            Self::TranscriptUpdate => "transcript.update",
            Self::FunctionCall => "function-call",
            Self::Other(raw) => raw,
        }
    }

    /// Whether the event writes a call record
    pub fn persists(&self) -> bool {
        matches!(
            self,
            Self::CallStarted | Self::StatusUpdate | Self::CallEnded | Self::EndOfCallReport
        )
    }

    /// Call-ended events trigger a summary notification
    pub fn is_call_end(&self) -> bool {
        matches!(self, Self::CallEnded | Self::EndOfCallReport)
    }
}

/// Provider call status -> canonical status
pub fn translate_vapi_status(raw: &str) -> Option<&'static str> {
    let mapped = match raw.trim().to_ascii_lowercase().as_str() {
        "queued" => status::QUEUED,
        "ringing" => status::RINGING,
        "in-progress" | "forwarding" => status::IN_PROGRESS,
        "ended" | "completed" => status::COMPLETED,
        "failed" => status::FAILED,
        "busy" => status::BUSY,
        "no-answer" => status::NO_ANSWER,
        "canceled" | "cancelled" => status::CANCELED,
        "error" => status::ERROR,
        _ => return None,
    };
    Some(mapped)
}

/// Carrier call status -> canonical status; anything unrecognized is `unknown`
pub fn translate_twilio_status(raw: &str) -> &'static str {
    match raw.trim().to_ascii_lowercase().as_str() {
        "queued" => status::QUEUED,
        "ringing" => status::RINGING,
        "in-progress" => status::IN_PROGRESS,
        "completed" => status::COMPLETED,
        "busy" => status::BUSY,
        "failed" => status::FAILED,
        "no-answer" => status::NO_ANSWER,
        "canceled" => status::CANCELED,
        _ => status::UNKNOWN,
    }
}

/// Render `[{role, message}]` entries as speaker-prefixed paragraphs
pub fn format_transcript(entries: &[Value]) -> String {
    if entries.is_empty() {
        return NO_TRANSCRIPT.to_string();
    }

    entries
        .iter()
        .map(|entry| {
            let role = entry.get("role").and_then(Value::as_str).unwrap_or("unknown");
            let message = entry.get("message").and_then(Value::as_str).unwrap_or("");
            format!("{}: {}", speaker_label(role), message)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn speaker_label(role: &str) -> String {
    match role {
        "assistant" => "AVA".to_string(),
        "user" => "Caller".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        }
    }
}

/// Normalize a carrier phone number: `00` prefix becomes `+`, bare digits get `+`
pub fn normalize_phone(number: Option<&str>) -> Option<String> {
    let mut number = number?.trim().to_string();
    if number.is_empty() {
        return None;
    }

    if let Some(rest) = number.strip_prefix("00") {
        number = format!("+{rest}");
    }

    let digits = number.replace('+', "");
    let digits = digits.trim_start_matches('-');
    if !number.starts_with('+') && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        number = format!("+{number}");
    }

    Some(number)
}

/// Owner hints attached to the call by whoever created the assistant
pub fn extract_call_metadata(call: &Map<String, Value>) -> Map<String, Value> {
    for key in ["metadata", "assistantMetadata"] {
        if let Some(Value::Object(meta)) = call.get(key) {
            if !meta.is_empty() {
                return meta.clone();
            }
        }
    }

    if let Some(Value::Object(assistant)) = call.get("assistant") {
        for key in ["metadata", "meta"] {
            if let Some(Value::Object(meta)) = assistant.get(key) {
                if !meta.is_empty() {
                    return meta.clone();
                }
            }
        }
    }

    Map::new()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A parsed provider webhook
#[derive(Debug, Clone)]
pub struct VapiEvent {
    pub kind: VapiEventKind,
    /// Call object with report-level fields folded in
    pub call: Map<String, Value>,
    envelope: Map<String, Value>,
}

impl VapiEvent {
    /// Accepts both `{type, call}` and the `{message: {type, call}}` envelope
    pub fn parse(body: Value) -> Result<Self> {
        let Value::Object(mut root) = body else {
            return Err(Error::InvalidInput("webhook body must be a JSON object".to_string()));
        };

        let mut envelope = match root.remove("message") {
            Some(Value::Object(message)) if message.contains_key("type") => message,
            other => {
                if let Some(value) = other {
                    root.insert("message".to_string(), value);
                }
                root
            }
        };

        let kind = VapiEventKind::parse(envelope.get("type").and_then(Value::as_str).unwrap_or(""));
        let mut call = match envelope.remove("call") {
            Some(Value::Object(call)) => call,
            _ => Map::new(),
        };

        for key in REPORT_FIELDS {
            if !call.contains_key(*key) {
                if let Some(value) = envelope.get(*key) {
                    call.insert((*key).to_string(), value.clone());
                }
            }
        }

        Ok(Self {
            kind,
            call,
            envelope,
        })
    }

    pub fn call_id(&self) -> Option<String> {
        self.call.get("id").and_then(scalar_string)
    }

    pub fn assistant_id(&self) -> Option<String> {
        self.call.get("assistantId").and_then(scalar_string)
    }

    pub fn metadata(&self) -> Map<String, Value> {
        extract_call_metadata(&self.call)
    }

    pub fn signals(&self) -> EventSignals {
        let metadata = self.metadata();
        let owner_ids = ["user_id", "userId", "tenant_id", "tenantId"]
            .iter()
            .filter_map(|key| metadata.get(*key).and_then(scalar_string))
            .collect();

        EventSignals {
            call_id: self.call_id(),
            owner_ids,
            assistant_id: self.assistant_id(),
            destination_number: None,
        }
    }

    fn customer_field(&self, key: &str) -> Option<String> {
        self.call
            .get("customer")
            .and_then(|c| c.get(key))
            .and_then(non_blank)
            .map(str::to_string)
    }

    pub fn caller_phone(&self) -> Option<String> {
        self.customer_field("number")
    }

    /// Customer name, then metadata `caller_name`, then a placeholder
    pub fn caller_name(&self) -> String {
        self.customer_field("name")
            .or_else(|| {
                self.metadata()
                    .get("caller_name")
                    .and_then(non_blank)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| UNKNOWN_CALLER.to_string())
    }

    /// Organization name from the call metadata
    pub fn organization_hint(&self) -> Option<String> {
        let metadata = self.metadata();
        ["organization", "organizationName"]
            .iter()
            .find_map(|key| metadata.get(*key).and_then(non_blank).map(str::to_string))
    }

    pub fn recording_url(&self) -> Option<String> {
        self.call
            .get("recordingUrl")
            .and_then(non_blank)
            .or_else(|| {
                self.call
                    .get("artifact")
                    .and_then(|a| a.get("recordingUrl"))
                    .and_then(non_blank)
            })
            .map(str::to_string)
    }

    /// Transcript text from a message array, a string, or `artifact.transcript`
    pub fn transcript(&self) -> Option<String> {
        match self.call.get("transcript") {
            Some(Value::Array(entries)) if !entries.is_empty() => Some(format_transcript(entries)),
            Some(other) => extract_transcript(other),
            None => None,
        }
        .or_else(|| {
            self.call
                .get("artifact")
                .and_then(|a| a.get("transcript"))
                .and_then(extract_transcript)
        })
    }

    /// Canonical status this event asserts, if any.
    ///
    /// End events always land on a terminal status.
    pub fn resolved_status(&self) -> Option<&'static str> {
        let call_status = self.call.get("status").and_then(Value::as_str);
        let message_status = self.envelope.get("status").and_then(Value::as_str);

        let raw = match self.kind {
            VapiEventKind::StatusUpdate => message_status.or(call_status),
            _ => call_status.or(message_status),
        };
        let mapped = raw.and_then(translate_vapi_status);

        match self.kind {
            VapiEventKind::CallEnded | VapiEventKind::EndOfCallReport => match mapped {
                Some(s) if is_terminal(s) || s == status::ERROR => Some(s),
                _ => Some(status::COMPLETED),
            },
            VapiEventKind::CallStarted => mapped.or(Some(status::IN_PROGRESS)),
            _ => mapped,
        }
    }

    /// Build the record to merge-upsert for `tenant_id`
    pub fn to_call_record(&self, tenant_id: &TenantId, now: DateTime<Utc>) -> Result<CallRecord> {
        let call_id = self
            .call_id()
            .ok_or_else(|| Error::InvalidInput(format!("{} event without call id", self.kind.as_str())))?;

        let started_at = self
            .call
            .get("startedAt")
            .and_then(Value::as_str)
            .and_then(parse_iso8601)
            .unwrap_or(now);

        let mut payload = self.call.clone();
        payload.remove("transcript");
        if let Some(status) = self.resolved_status() {
            payload.insert("status".to_string(), Value::String(status.to_string()));
        }
        if !payload.contains_key("durationSeconds") {
            if let Some(duration) = payload.get("duration").and_then(coerce_i64) {
                payload.insert("durationSeconds".to_string(), Value::from(duration));
            }
        }

        let mut record = CallRecord::new(
            call_id,
            self.assistant_id().unwrap_or_else(|| "unknown".to_string()),
            tenant_id.clone(),
            started_at,
        );
        record.customer_number = self.caller_phone();
        record.transcript = self.transcript();
        record.meta = CallMeta::from(payload);
        record.meta.caller_name = Some(self.caller_name());
        record.meta.recording_url = self.recording_url();
        record.refresh_from_payload();

        Ok(record)
    }
}

/// A parsed carrier status callback
#[derive(Debug, Clone)]
pub struct TwilioStatusCallback {
    pub call_sid: String,
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub duration_seconds: Option<i64>,
    pub called_via_sid: Option<String>,
    pub direction: Option<String>,
    pub form: Map<String, Value>,
}

impl TwilioStatusCallback {
    pub fn from_form(form: HashMap<String, String>, now: DateTime<Utc>) -> Result<Self> {
        let field = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .filter_map(|key| form.get(*key))
                .map(|v| v.trim())
                .find(|v| !v.is_empty())
                .map(str::to_string)
        };

        let call_sid = field(&["CallSid"])
            .ok_or_else(|| Error::InvalidInput("Missing CallSid".to_string()))?;
        let status = translate_twilio_status(field(&["CallStatus"]).as_deref().unwrap_or(""));
        let timestamp = field(&["Timestamp", "CallTimestamp"])
            .as_deref()
            .and_then(parse_flexible)
            .unwrap_or(now);
        let from = normalize_phone(field(&["From"]).as_deref());
        let to = normalize_phone(field(&["To", "Called"]).as_deref());
        let duration_seconds = field(&["CallDuration", "DialCallDuration"])
            .filter(|d| d.chars().all(|c| c.is_ascii_digit()))
            .and_then(|d| d.parse().ok());
        let called_via_sid = field(&["CalledViaSid"]);
        let direction = field(&["Direction"]);

        let form = form
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();

        Ok(Self {
            call_sid,
            status,
            timestamp,
            from,
            to,
            duration_seconds,
            called_via_sid,
            direction,
            form,
        })
    }

    pub fn signals(&self) -> EventSignals {
        EventSignals {
            call_id: Some(self.call_sid.clone()),
            owner_ids: Vec::new(),
            assistant_id: None,
            destination_number: self.to.clone(),
        }
    }

    /// Build the record to merge-upsert for `tenant_id`.
    ///
    /// Every callback appends one status history entry. An unrecognized
    /// carrier status is recorded in the history but does not overwrite a
    /// known status on an existing row.
    pub fn to_call_record(&self, tenant_id: &TenantId) -> CallRecord {
        let terminal = is_terminal(self.status);

        let mut payload = Map::new();
        if self.status != status::UNKNOWN {
            payload.insert("status".to_string(), Value::String(self.status.to_string()));
        }
        if terminal {
            payload.insert("endedAt".to_string(), Value::String(to_storage(&self.timestamp)));
        }
        if let Some(duration) = self.duration_seconds {
            payload.insert("durationSeconds".to_string(), Value::from(duration));
        }
        payload.insert("twilio".to_string(), Value::Object(self.form.clone()));
        payload.insert("twilio_call_sid".to_string(), Value::String(self.call_sid.clone()));
        if let Some(direction) = &self.direction {
            payload.insert("direction".to_string(), Value::String(direction.clone()));
        }

        let assistant_id = self
            .called_via_sid
            .clone()
            .unwrap_or_else(|| "twilio-status".to_string());

        let mut record = CallRecord::new(&self.call_sid, assistant_id, tenant_id.clone(), self.timestamp);
        record.status = self.status.to_string();
        record.customer_number = self.from.clone();
        record.ended_at = terminal.then_some(self.timestamp);
        record.duration_seconds = self.duration_seconds;
        record.meta = CallMeta::from(payload);
        record
            .meta
            .status_history
            .push(StatusTransition::new(self.status, self.timestamp));
        record
    }
}

//! Database models

use crate::coerce::{coerce_f64, coerce_i64, extract_transcript};
use crate::ids::TenantId;
use crate::meta::{CallMeta, MergePolicy};
use crate::status::{canonical_status, UNKNOWN};
use crate::time::{self, parse_iso8601};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ownership anchor for calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Owner account. A user's tenant id is its normalized user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub twilio_phone_number: Option<String>,
    pub vapi_api_key: Option<String>,
}

impl User {
    pub fn tenant_id(&self) -> TenantId {
        TenantId::new(&self.id)
    }

    /// Display name for the tenant anchor
    pub fn tenant_name(&self) -> String {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Ava Tenant")
            .to_string()
    }
}

/// Per-tenant assistant configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub id: String,
    pub user_id: String,
    pub organization_name: Option<String>,
    pub vapi_assistant_id: Option<String>,
    pub summary_email: Option<String>,
    pub fallback_email: Option<String>,
}

/// One row per upstream call id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallRecord {
    pub id: String,
    pub assistant_id: String,
    pub tenant_id: TenantId,
    pub customer_number: Option<String>,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub cost: Option<f64>,
    pub meta: CallMeta,
    pub transcript: Option<String>,
}

impl CallRecord {
    /// Minimal record with status `unknown` and empty meta
    pub fn new(
        id: impl Into<String>,
        assistant_id: impl Into<String>,
        tenant_id: TenantId,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            assistant_id: assistant_id.into(),
            tenant_id,
            customer_number: None,
            status: UNKNOWN.to_string(),
            started_at,
            ended_at: None,
            duration_seconds: None,
            cost: None,
            meta: CallMeta::default(),
            transcript: None,
        }
    }

    /// Whole seconds between start and end, when both are known and ordered
    pub fn span_seconds(&self) -> Option<i64> {
        let ended = self.ended_at?;
        let span = (ended - self.started_at).num_seconds();
        (span >= 0).then_some(span)
    }

    /// Fill `duration_seconds` from the timestamps when it is missing
    pub fn fill_derived_duration(&mut self) {
        if self.duration_seconds.is_none() {
            self.duration_seconds = self.span_seconds();
        }
    }

    /// Re-derive typed columns from the merged payload.
    ///
    /// Values that are absent or fail to parse leave the current column
    /// untouched. Duration falls back to the timestamp span when the payload
    /// carries no usable `durationSeconds`.
    pub fn refresh_from_payload(&mut self) {
        if let Some(status) = self.meta.get_str("status") {
            self.status = canonical_status(status);
        }
        if let Some(started) = self.meta.get_str("startedAt").and_then(parse_iso8601) {
            self.started_at = started;
        }
        if let Some(ended) = self.meta.get_str("endedAt").and_then(parse_iso8601) {
            self.ended_at = Some(ended);
        }

        match self.meta.get("durationSeconds").and_then(coerce_i64) {
            Some(duration) => self.duration_seconds = Some(duration),
            None => {
                if let Some(span) = self.span_seconds() {
                    self.duration_seconds = Some(span);
                }
            }
        }

        if let Some(cost) = self.meta.get("cost").and_then(coerce_f64) {
            self.cost = Some(cost);
        }
    }

    /// Merge-upsert `incoming` into this existing row.
    ///
    /// The owner never changes. The customer number is only filled when
    /// missing, and a transcript only replaces the current one when present.
    /// Once the merged call is past the retention window the transcript is
    /// cleared instead, so a re-sync cannot restore a scrubbed transcript.
    pub fn absorb(
        &mut self,
        incoming: CallRecord,
        policy: MergePolicy,
        retention: TranscriptRetention,
    ) {
        let CallRecord {
            assistant_id,
            customer_number,
            transcript,
            meta,
            ..
        } = incoming;

        self.meta.merge(meta, policy);
        self.refresh_from_payload();

        if retention.expired(self.started_at) {
            self.transcript = None;
        } else if let Some(text) = transcript.filter(|t| !t.trim().is_empty()) {
            self.transcript = Some(text);
        }
        if self.customer_number.is_none() {
            self.customer_number = customer_number;
        }
        if self.assistant_id.trim().is_empty() {
            self.assistant_id = assistant_id;
        }
    }

    /// Transcript from the payload, as a plain string or `{text}` object
    pub fn payload_transcript(&self) -> Option<String> {
        self.meta.get("transcript").and_then(extract_transcript)
    }

    /// True once `started_at + retention <= now`
    pub fn transcript_expired(&self, now: DateTime<Utc>, retention: chrono::Duration) -> bool {
        TranscriptRetention::at(now, retention).expired(self.started_at)
    }
}

/// Transcript retention window evaluated at a fixed instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptRetention {
    pub now: DateTime<Utc>,
    pub window: chrono::Duration,
}

impl TranscriptRetention {
    pub fn at(now: DateTime<Utc>, window: chrono::Duration) -> Self {
        Self { now, window }
    }

    /// Window evaluated at the current time
    pub fn current(window: chrono::Duration) -> Self {
        Self::at(time::now(), window)
    }

    pub fn expired(&self, started_at: DateTime<Utc>) -> bool {
        started_at <= self.now - self.window
    }
}

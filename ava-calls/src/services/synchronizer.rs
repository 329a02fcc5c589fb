//! Poll-based call ingestion
//!
//! Pulls a tenant's recent calls from the upstream provider and upserts them.
//! Re-running a sync against unchanged upstream data leaves exactly one row
//! per call id.

use crate::db::{upsert_calls, UpsertSummary};
use crate::services::circuit_breaker::CircuitBreaker;
use crate::services::vapi_client::CallProvider;
use ava_common::coerce::{coerce_f64, coerce_i64, extract_transcript, non_blank};
use ava_common::db::{CallRecord, TranscriptRetention};
use ava_common::status::{canonical_status, UNKNOWN};
use ava_common::time::parse_iso8601;
use ava_common::{CallMeta, MergePolicy, Result, TenantId};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Result of one sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub fetched: usize,
    /// Entries without an id
    pub skipped: usize,
    pub inserted: usize,
    pub updated: usize,
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn timestamp_or(raw: &Value, key: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let parsed = raw.get(key).and_then(Value::as_str).and_then(parse_iso8601);
    if parsed.is_none() {
        debug!(field = key, "Unparseable provider timestamp, using current time");
    }
    parsed.unwrap_or(fallback)
}

/// Convert one raw provider call object into a record owned by `tenant_id`.
///
/// Returns `None` for entries without an id. Field-level parse failures never
/// reject the entry: timestamps fall back to `now`, numbers are omitted.
pub fn normalize_call(raw: Value, tenant_id: &TenantId, now: DateTime<Utc>) -> Option<CallRecord> {
    let id = raw.get("id").and_then(id_string)?;

    let started_at = timestamp_or(&raw, "startedAt", now);
    let ended_at = match raw.get("endedAt") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(_) => Some(timestamp_or(&raw, "endedAt", now)),
    };

    let status = raw
        .get("status")
        .and_then(non_blank)
        .map(canonical_status)
        .unwrap_or_else(|| UNKNOWN.to_string());

    let customer_number = raw
        .get("customer")
        .and_then(|c| c.get("number"))
        .and_then(non_blank)
        .map(str::to_string);

    let assistant_id = raw
        .get("assistantId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut record = CallRecord::new(id, assistant_id, tenant_id.clone(), started_at);
    record.customer_number = customer_number;
    record.status = status;
    record.ended_at = ended_at;
    record.duration_seconds = raw.get("durationSeconds").and_then(coerce_i64);
    record.cost = raw.get("cost").and_then(coerce_f64);
    record.transcript = raw.get("transcript").and_then(extract_transcript);
    record.meta = CallMeta::from(raw);

    Some(record)
}

/// Fetch up to `limit` calls through the breaker and upsert them for `tenant_id`
pub async fn sync_tenant_calls(
    pool: &SqlitePool,
    tenant_id: &TenantId,
    provider: &dyn CallProvider,
    breaker: &CircuitBreaker,
    limit: u32,
    policy: MergePolicy,
    transcript_window: Duration,
) -> Result<SyncReport> {
    let raw_calls = breaker.call(|| provider.list_calls(limit)).await?;

    let fetched = raw_calls.len();
    let now = ava_common::time::now();
    let records: Vec<CallRecord> = raw_calls
        .into_iter()
        .filter_map(|raw| normalize_call(raw, tenant_id, now))
        .collect();
    let skipped = fetched - records.len();

    let retention = TranscriptRetention::at(now, transcript_window);
    let UpsertSummary { inserted, updated } =
        upsert_calls(pool, records, policy, retention).await?;

    info!(
        tenant_id = %tenant_id,
        fetched,
        skipped,
        inserted,
        updated,
        "Synchronized provider calls"
    );

    Ok(SyncReport {
        fetched,
        skipped,
        inserted,
        updated,
    })
}

//! Call record repository
//!
//! Rows are keyed by the provider's call id. Writes go through
//! [`upsert_calls`], which merges into existing rows instead of replacing
//! them; the owning tenant of a row never changes after the first write.

use ava_common::db::{CallRecord, TranscriptRetention};
use ava_common::time::{from_storage, to_storage};
use ava_common::{CallMeta, Error, MergePolicy, Result, TenantId};
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

const CALL_COLUMNS: &str = "id, assistant_id, tenant_id, customer_number, status, started_at, \
     ended_at, duration_seconds, cost, meta, transcript";

/// Outcome of one [`upsert_calls`] batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

fn call_from_row(row: &SqliteRow) -> Result<CallRecord> {
    let id: String = row.try_get("id")?;

    let started_raw: String = row.try_get("started_at")?;
    let started_at = from_storage(&started_raw).ok_or_else(|| {
        Error::Internal(format!("call {id} has unreadable started_at {started_raw:?}"))
    })?;
    let ended_at = row
        .try_get::<Option<String>, _>("ended_at")?
        .as_deref()
        .and_then(from_storage);

    let meta_raw: String = row.try_get("meta")?;
    let meta: CallMeta = serde_json::from_str(&meta_raw)?;

    let tenant_raw: String = row.try_get("tenant_id")?;

    Ok(CallRecord {
        assistant_id: row.try_get("assistant_id")?,
        tenant_id: TenantId::new(tenant_raw),
        customer_number: row.try_get("customer_number")?,
        status: row.try_get("status")?,
        started_at,
        ended_at,
        duration_seconds: row.try_get("duration_seconds")?,
        cost: row.try_get("cost")?,
        meta,
        transcript: row.try_get("transcript")?,
        id,
    })
}

/// Move a payload transcript into the transcript column.
///
/// The transcript is only ever stored in its own column so that scrubbing
/// it leaves no copy behind in `meta`.
fn detach_transcript(record: &mut CallRecord) {
    let from_payload = record.payload_transcript();
    record.meta.payload.remove("transcript");
    if record.transcript.as_deref().map_or(true, |t| t.trim().is_empty()) {
        record.transcript = from_payload;
    }
}

async fn fetch_call(conn: &mut SqliteConnection, call_id: &str) -> Result<Option<CallRecord>> {
    let sql = format!("SELECT {CALL_COLUMNS} FROM calls WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(call_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(call_from_row).transpose()
}

async fn insert_call(conn: &mut SqliteConnection, call: &CallRecord) -> Result<()> {
    let sql = format!(
        "INSERT INTO calls ({CALL_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    );
    sqlx::query(&sql)
        .bind(&call.id)
        .bind(&call.assistant_id)
        .bind(call.tenant_id.as_str())
        .bind(&call.customer_number)
        .bind(&call.status)
        .bind(to_storage(&call.started_at))
        .bind(call.ended_at.as_ref().map(to_storage))
        .bind(call.duration_seconds)
        .bind(call.cost)
        .bind(call.meta.to_json_string()?)
        .bind(&call.transcript)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Rewrite every mutable column. `tenant_id` is deliberately absent.
async fn update_call(conn: &mut SqliteConnection, call: &CallRecord) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE calls SET
            assistant_id = ?,
            customer_number = ?,
            status = ?,
            started_at = ?,
            ended_at = ?,
            duration_seconds = ?,
            cost = ?,
            meta = ?,
            transcript = ?
        WHERE id = ?
        "#,
    )
    .bind(&call.assistant_id)
    .bind(&call.customer_number)
    .bind(&call.status)
    .bind(to_storage(&call.started_at))
    .bind(call.ended_at.as_ref().map(to_storage))
    .bind(call.duration_seconds)
    .bind(call.cost)
    .bind(call.meta.to_json_string()?)
    .bind(&call.transcript)
    .bind(&call.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Insert or merge a batch of calls in a single transaction.
///
/// For an existing id the incoming meta is merged into the stored meta and
/// the typed columns are re-derived from the merged payload. New rows get a
/// derived duration when both timestamps are known. A merged row past
/// `retention` keeps no transcript.
///
/// The batch reads before it writes, so it takes the write lock up front
/// with `BEGIN IMMEDIATE`. A deferred transaction would fail with
/// `SQLITE_BUSY` on lock upgrade when another writer got there first.
pub async fn upsert_calls(
    pool: &SqlitePool,
    records: Vec<CallRecord>,
    policy: MergePolicy,
    retention: TranscriptRetention,
) -> Result<UpsertSummary> {
    let mut summary = UpsertSummary::default();
    if records.is_empty() {
        return Ok(summary);
    }

    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

    for mut incoming in records {
        detach_transcript(&mut incoming);

        match fetch_call(&mut tx, &incoming.id).await? {
            Some(mut existing) => {
                if existing.tenant_id != incoming.tenant_id {
                    warn!(
                        call_id = %existing.id,
                        owner = %existing.tenant_id,
                        incoming_tenant = %incoming.tenant_id,
                        "Ignoring tenant change on existing call"
                    );
                }
                existing.absorb(incoming, policy, retention);
                update_call(&mut tx, &existing).await?;
                summary.updated += 1;
            }
            None => {
                incoming.fill_derived_duration();
                insert_call(&mut tx, &incoming).await?;
                summary.inserted += 1;
            }
        }
    }

    tx.commit().await?;

    debug!(
        inserted = summary.inserted,
        updated = summary.updated,
        "Upserted call batch"
    );
    Ok(summary)
}

/// Most recent calls first, optionally filtered by tenant and lower bound
pub async fn get_recent_calls(
    pool: &SqlitePool,
    tenant_id: Option<&TenantId>,
    since: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<CallRecord>> {
    let sql = format!(
        "SELECT {CALL_COLUMNS} FROM calls \
         WHERE (?1 IS NULL OR tenant_id = ?1) AND (?2 IS NULL OR started_at >= ?2) \
         ORDER BY started_at DESC LIMIT ?3"
    );
    let rows = sqlx::query(&sql)
        .bind(tenant_id.map(TenantId::as_str))
        .bind(since.as_ref().map(to_storage))
        .bind(limit.max(0))
        .fetch_all(pool)
        .await?;

    rows.iter().map(call_from_row).collect()
}

/// A tenant's most recent calls, optionally restricted to one status
pub async fn get_tenant_calls(
    pool: &SqlitePool,
    tenant_id: &TenantId,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<CallRecord>> {
    let sql = format!(
        "SELECT {CALL_COLUMNS} FROM calls \
         WHERE tenant_id = ?1 AND (?2 IS NULL OR status = ?2) \
         ORDER BY started_at DESC LIMIT ?3"
    );
    let rows = sqlx::query(&sql)
        .bind(tenant_id.as_str())
        .bind(status)
        .bind(limit.max(0))
        .fetch_all(pool)
        .await?;

    rows.iter().map(call_from_row).collect()
}

/// A tenant's calls with `start <= started_at <= end`, most recent first
pub async fn get_calls_in_range(
    pool: &SqlitePool,
    tenant_id: &TenantId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<CallRecord>> {
    let sql = format!(
        "SELECT {CALL_COLUMNS} FROM calls \
         WHERE tenant_id = ? AND started_at >= ? AND started_at <= ? \
         ORDER BY started_at DESC"
    );
    let rows = sqlx::query(&sql)
        .bind(tenant_id.as_str())
        .bind(to_storage(&start))
        .bind(to_storage(&end))
        .fetch_all(pool)
        .await?;

    rows.iter().map(call_from_row).collect()
}

/// Look up a call by id, retrying with surrounding whitespace removed
pub async fn get_call_by_id(pool: &SqlitePool, call_id: &str) -> Result<Option<CallRecord>> {
    let mut conn = pool.acquire().await?;

    if let Some(call) = fetch_call(&mut conn, call_id).await? {
        return Ok(Some(call));
    }

    let trimmed = call_id.trim();
    if trimmed != call_id && !trimmed.is_empty() {
        return fetch_call(&mut conn, trimmed).await;
    }

    Ok(None)
}

/// Delete a call owned by `tenant_id`.
///
/// Returns false when the call does not exist or belongs to another tenant.
pub async fn delete_call_record(
    pool: &SqlitePool,
    call_id: &str,
    tenant_id: &TenantId,
) -> Result<bool> {
    let Some(call) = get_call_by_id(pool, call_id).await? else {
        return Ok(false);
    };

    if call.tenant_id.as_str() != tenant_id.as_str() {
        warn!(
            call_id = %call.id,
            tenant_id = %tenant_id,
            "Refusing to delete call owned by another tenant"
        );
        return Ok(false);
    }

    sqlx::query("DELETE FROM calls WHERE id = ?")
        .bind(&call.id)
        .execute(pool)
        .await?;

    Ok(true)
}

/// Null the transcript once `started_at + retention <= now`.
///
/// Runs on the caller's connection or transaction and does not commit.
/// Returns whether a scrub happened.
pub async fn scrub_transcript_if_expired(
    conn: &mut SqliteConnection,
    call: &mut CallRecord,
    now: DateTime<Utc>,
    retention: Duration,
) -> Result<bool> {
    let has_transcript = call
        .transcript
        .as_deref()
        .is_some_and(|t| !t.is_empty());
    if !has_transcript || !call.transcript_expired(now, retention) {
        return Ok(false);
    }

    sqlx::query("UPDATE calls SET transcript = NULL WHERE id = ?")
        .bind(&call.id)
        .execute(&mut *conn)
        .await?;

    call.transcript = None;
    debug!(call_id = %call.id, "Scrubbed expired transcript");
    Ok(true)
}

/// Scrub expired transcripts in a batch of rows about to be returned.
///
/// The transaction is only committed when something was scrubbed.
pub async fn scrub_expired_on_read(
    pool: &SqlitePool,
    calls: &mut [CallRecord],
    now: DateTime<Utc>,
    retention: Duration,
) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let mut scrubbed = 0;

    for call in calls.iter_mut() {
        if scrub_transcript_if_expired(&mut tx, call, now, retention).await? {
            scrubbed += 1;
        }
    }

    if scrubbed > 0 {
        tx.commit().await?;
        debug!(scrubbed, "Scrubbed expired transcripts on read");
    } else {
        tx.rollback().await?;
    }

    Ok(scrubbed)
}

/// Scrub every transcript whose retention window has passed
pub async fn sweep_expired_transcripts(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    retention: Duration,
) -> Result<u64> {
    let cutoff = now - retention;
    let result = sqlx::query(
        "UPDATE calls SET transcript = NULL WHERE transcript IS NOT NULL AND started_at <= ?",
    )
    .bind(to_storage(&cutoff))
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Delete every call that started before `before`
pub async fn prune_old_calls(pool: &SqlitePool, before: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM calls WHERE started_at < ?")
        .bind(to_storage(&before))
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

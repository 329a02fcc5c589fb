//! Tenant-scoped call history endpoints
//!
//! Every read path scrubs expired transcripts before returning rows.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use ava_common::db::CallRecord;
use ava_common::status::canonical_status;
use ava_common::{CallMeta, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::db::{
    delete_call_record, find_config_for_user, find_user_for_tenant, get_call_by_id,
    get_tenant_calls, scrub_expired_on_read,
};
use crate::error::{ApiError, ApiResult};
use crate::services::reconciler::events::{NO_TRANSCRIPT, UNKNOWN_CALLER};
use crate::services::CallSummary;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
pub struct ListCallsQuery {
    pub limit: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallListItem {
    pub id: String,
    pub assistant_id: String,
    pub customer_number: Option<String>,
    pub caller_name: Option<String>,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub cost: Option<f64>,
    pub transcript_preview: Option<String>,
}

impl From<CallRecord> for CallListItem {
    fn from(call: CallRecord) -> Self {
        let transcript_preview = call
            .transcript
            .as_deref()
            .map(|t| t.chars().take(PREVIEW_CHARS).collect());

        Self {
            id: call.id,
            assistant_id: call.assistant_id,
            customer_number: call.customer_number,
            caller_name: call.meta.caller_name,
            status: call.status,
            started_at: call.started_at,
            ended_at: call.ended_at,
            duration_seconds: call.duration_seconds,
            cost: call.cost,
            transcript_preview,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallDetail {
    pub id: String,
    pub assistant_id: String,
    pub customer_number: Option<String>,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub cost: Option<f64>,
    pub transcript: Option<String>,
    pub metadata: CallMeta,
    pub recording_url: Option<String>,
}

/// Engine field first, then the provider payload shapes
pub fn recording_url(call: &CallRecord) -> Option<String> {
    call.meta
        .recording_url
        .clone()
        .or_else(|| call.meta.get_str("recordingUrl").map(str::to_string))
        .or_else(|| {
            call.meta
                .get_path(&["artifact", "recordingUrl"])
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        })
}

impl From<CallRecord> for CallDetail {
    fn from(call: CallRecord) -> Self {
        let recording_url = recording_url(&call);
        Self {
            id: call.id,
            assistant_id: call.assistant_id,
            customer_number: call.customer_number,
            status: call.status,
            started_at: call.started_at,
            ended_at: call.ended_at,
            duration_seconds: call.duration_seconds,
            cost: call.cost,
            transcript: call.transcript,
            metadata: call.meta,
            recording_url,
        }
    }
}

/// Load a call owned by `tenant_id`; another tenant's call is reported as missing
async fn owned_call(state: &AppState, tenant_id: &TenantId, call_id: &str) -> ApiResult<CallRecord> {
    match get_call_by_id(&state.db, call_id).await? {
        Some(call) if call.tenant_id == *tenant_id => Ok(call),
        _ => Err(ApiError::NotFound(format!("Call {call_id} not found"))),
    }
}

async fn scrub(state: &AppState, calls: &mut [CallRecord]) -> ApiResult<()> {
    let window = state.config.retention.transcript_window();
    scrub_expired_on_read(&state.db, calls, ava_common::time::now(), window).await?;
    Ok(())
}

/// GET /api/tenants/:tenant_id/calls?limit&status
pub async fn list_calls(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(query): Query<ListCallsQuery>,
) -> ApiResult<Json<Value>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }

    let tenant_id = TenantId::new(tenant_id);
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(canonical_status);

    let mut calls = get_tenant_calls(&state.db, &tenant_id, status.as_deref(), limit).await?;
    scrub(&state, &mut calls).await?;

    let items: Vec<CallListItem> = calls.into_iter().map(CallListItem::from).collect();
    Ok(Json(json!({
        "total": items.len(),
        "calls": items,
    })))
}

/// GET /api/tenants/:tenant_id/calls/:call_id
pub async fn get_call_detail(
    State(state): State<AppState>,
    Path((tenant_id, call_id)): Path<(String, String)>,
) -> ApiResult<Json<CallDetail>> {
    let tenant_id = TenantId::new(tenant_id);
    let mut call = owned_call(&state, &tenant_id, &call_id).await?;
    scrub(&state, std::slice::from_mut(&mut call)).await?;

    Ok(Json(CallDetail::from(call)))
}

/// GET /api/tenants/:tenant_id/calls/:call_id/recording
pub async fn get_call_recording(
    State(state): State<AppState>,
    Path((tenant_id, call_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let tenant_id = TenantId::new(tenant_id);
    let call = owned_call(&state, &tenant_id, &call_id).await?;

    let url = recording_url(&call)
        .ok_or_else(|| ApiError::NotFound("Recording not available".to_string()))?;
    Ok(Json(json!({ "recordingUrl": url })))
}

/// DELETE /api/tenants/:tenant_id/calls/:call_id
pub async fn delete_call(
    State(state): State<AppState>,
    Path((tenant_id, call_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let tenant_id = TenantId::new(tenant_id);
    if !delete_call_record(&state.db, &call_id, &tenant_id).await? {
        return Err(ApiError::NotFound(format!("Call {call_id} not found")));
    }

    info!(call_id = %call_id, tenant_id = %tenant_id, "Deleted call");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/tenants/:tenant_id/calls/:call_id/email
///
/// Re-sends the summary email for a stored call.
pub async fn email_call_summary(
    State(state): State<AppState>,
    Path((tenant_id, call_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let tenant_id = TenantId::new(tenant_id);
    let mut call = owned_call(&state, &tenant_id, &call_id).await?;
    scrub(&state, std::slice::from_mut(&mut call)).await?;

    let user = find_user_for_tenant(&state.db, &tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No account for tenant {tenant_id}")))?;
    let config = find_config_for_user(&state.db, &user.id).await?;

    let recipient = config
        .as_ref()
        .and_then(|c| c.fallback_email.clone().or_else(|| c.summary_email.clone()))
        .or_else(|| user.email.clone())
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest("No recipient email configured for transcript delivery".to_string())
        })?;

    let summary = CallSummary {
        to: recipient.clone(),
        caller_name: call
            .meta
            .caller_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_CALLER.to_string()),
        caller_phone: call.customer_number.clone().unwrap_or_else(|| "Unknown".to_string()),
        transcript: call.transcript.clone().unwrap_or_else(|| NO_TRANSCRIPT.to_string()),
        duration_seconds: call.duration_seconds,
        call_date: call.ended_at.unwrap_or(call.started_at),
        call_id: call.id.clone(),
        business_name: config
            .and_then(|c| c.organization_name)
            .unwrap_or_else(|| user.tenant_name()),
    };

    if !state.notifier.send_call_summary(&summary).await {
        return Err(ApiError::Internal("Failed to send email".to_string()));
    }

    Ok(Json(json!({
        "status": "success",
        "message": format!("Transcript sent to {recipient}"),
    })))
}

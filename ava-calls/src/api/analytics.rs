//! Dashboard analytics endpoints
//!
//! Each request reads the stored window; syncing with the provider is a
//! separate call (`POST /sync`).

use axum::{
    extract::{Path, State},
    Json,
};
use ava_common::db::CallRecord;
use ava_common::TenantId;
use serde_json::{json, Value};

use crate::analytics::{
    compute_activity_heatmap, compute_overview_metrics, compute_time_series,
    compute_trending_topics, detect_anomalies, recent_calls, Window, ANOMALY_LIMIT,
    DEFAULT_LOOKBACK_DAYS, OVERVIEW_LOOKBACK_DAYS, OVERVIEW_TOPIC_LIMIT, RECENT_LIMIT,
    TOPIC_LIMIT,
};
use crate::db::{get_calls_in_range, get_recent_calls, scrub_expired_on_read};
use crate::error::ApiResult;
use crate::AppState;

/// Stored calls in the lookback window, with expired transcripts scrubbed
async fn load_window(state: &AppState, tenant_id: &TenantId, days: i64) -> ApiResult<(Window, Vec<CallRecord>)> {
    let now = ava_common::time::now();
    let window = Window::lookback(now, days);
    let mut calls = get_calls_in_range(&state.db, tenant_id, window.start, window.end).await?;
    scrub_expired_on_read(&state.db, &mut calls, now, state.config.retention.transcript_window()).await?;
    Ok((window, calls))
}

/// GET /api/tenants/:tenant_id/analytics/overview
pub async fn analytics_overview(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let tenant_id = TenantId::new(tenant_id);
    let config = &state.config.analytics;

    let (window, calls) = load_window(&state, &tenant_id, OVERVIEW_LOOKBACK_DAYS).await?;
    let overview = compute_overview_metrics(&calls, window, config);

    let mut recent = get_recent_calls(&state.db, Some(&tenant_id), None, RECENT_LIMIT).await?;
    let now = ava_common::time::now();
    scrub_expired_on_read(&state.db, &mut recent, now, state.config.retention.transcript_window()).await?;

    let (_, topic_calls) = load_window(&state, &tenant_id, DEFAULT_LOOKBACK_DAYS).await?;
    let topics = compute_trending_topics(&topic_calls, config, OVERVIEW_TOPIC_LIMIT);

    Ok(Json(json!({
        "overview": overview,
        "calls": recent_calls(&recent),
        "topics": topics,
    })))
}

/// GET /api/tenants/:tenant_id/analytics/timeseries
pub async fn analytics_timeseries(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let (window, calls) = load_window(&state, &TenantId::new(tenant_id), DEFAULT_LOOKBACK_DAYS).await?;
    Ok(Json(json!({ "series": compute_time_series(&calls, window) })))
}

/// GET /api/tenants/:tenant_id/analytics/topics
pub async fn analytics_topics(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let (_, calls) = load_window(&state, &TenantId::new(tenant_id), DEFAULT_LOOKBACK_DAYS).await?;
    let topics = compute_trending_topics(&calls, &state.config.analytics, TOPIC_LIMIT);
    Ok(Json(json!({ "topics": topics })))
}

/// GET /api/tenants/:tenant_id/analytics/anomalies
pub async fn analytics_anomalies(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let (_, calls) = load_window(&state, &TenantId::new(tenant_id), DEFAULT_LOOKBACK_DAYS).await?;
    let anomalies = detect_anomalies(&calls, &state.config.analytics, ANOMALY_LIMIT);
    Ok(Json(json!({ "anomalies": anomalies })))
}

/// GET /api/tenants/:tenant_id/analytics/heatmap
pub async fn analytics_heatmap(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let (_, calls) = load_window(&state, &TenantId::new(tenant_id), DEFAULT_LOOKBACK_DAYS).await?;
    Ok(Json(json!({ "heatmap": compute_activity_heatmap(&calls) })))
}

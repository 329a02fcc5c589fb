//! On-demand provider sync

use axum::{
    extract::{Path, State},
    Json,
};
use ava_common::TenantId;

use crate::db::{ensure_tenant, find_user_for_tenant};
use crate::error::{ApiError, ApiResult};
use crate::services::{sync_tenant_calls, SyncReport};
use crate::AppState;

/// POST /api/tenants/:tenant_id/sync
///
/// Pulls recent calls with the tenant's own provider key.
pub async fn sync_calls(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<SyncReport>> {
    let tenant_id = TenantId::new(tenant_id);
    let user = find_user_for_tenant(&state.db, &tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No account for tenant {tenant_id}")))?;

    let api_key = user
        .vapi_api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No provider API key configured".to_string()))?;

    let owner = user.tenant_id();
    ensure_tenant(&state.db, &owner, &user.tenant_name()).await?;

    let provider = state.providers.for_api_key(api_key);
    let report = sync_tenant_calls(
        &state.db,
        &owner,
        provider.as_ref(),
        &state.breaker,
        state.config.provider.sync_limit,
        state.config.reconciler.merge_policy,
        state.config.retention.transcript_window(),
    )
    .await?;

    Ok(Json(report))
}

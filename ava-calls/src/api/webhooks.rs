//! Inbound provider and carrier webhooks

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Form, Json,
};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::collections::HashMap;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::services::VapiOutcome;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-vapi-signature";

/// Check an HMAC-SHA256 signature, hex encoded with an optional `sha256=` prefix
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let hex_sig = signature.trim();
    let hex_sig = hex_sig.strip_prefix("sha256=").unwrap_or(hex_sig);

    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };

    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// POST /webhooks/vapi
///
/// Signature is only enforced when `webhooks.vapi_secret` is configured.
pub async fn vapi_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    if let Some(secret) = state.config.webhooks.vapi_secret.as_deref().filter(|s| !s.is_empty()) {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing webhook signature".to_string()))?;

        if !verify_signature(secret, &body, signature) {
            warn!("Rejected provider webhook with invalid signature");
            return Err(ApiError::Unauthorized("invalid webhook signature".to_string()));
        }
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;

    let response = match state.reconciler.handle_vapi_event(payload).await? {
        VapiOutcome::Persisted(outcome) => json!({
            "status": "ok",
            "callId": outcome.call_id,
            "tenantId": outcome.tenant_id,
            "strategy": outcome.strategy,
            "callStatus": outcome.status,
            "notified": outcome.notified,
        }),
        VapiOutcome::Acknowledged { event_type } => json!({
            "status": "ignored",
            "eventType": event_type,
        }),
    };

    Ok(Json(response))
}

/// POST /webhooks/twilio/status
pub async fn twilio_status_webhook(
    State(state): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let outcome = state.reconciler.handle_twilio_status(form).await?;

    Ok(Json(json!({
        "status": "ok",
        "callId": outcome.call_id,
        "tenantId": outcome.tenant_id,
        "strategy": outcome.strategy,
        "callStatus": outcome.status,
    })))
}

//! Webhook tenant reconciler
//!
//! Attributes provider events and carrier callbacks to an owner, merges them
//! into the call store and sends the post-call summary.

pub mod events;
pub mod resolution;

pub use events::{TwilioStatusCallback, VapiEvent, VapiEventKind};
pub use resolution::{EventSignals, Resolution, TenantResolver, TenantStrategy};

use crate::db::{ensure_tenant, get_call_by_id, upsert_calls};
use crate::services::notifier::{CallNotifier, CallSummary};
use ava_common::db::{CallRecord, TranscriptRetention};
use ava_common::{Error, MergePolicy, Result, TenantId};
use chrono::Duration;
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_BUSINESS_NAME: &str = "AVA Business";

/// What happened to a persisted event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub call_id: String,
    pub tenant_id: TenantId,
    pub strategy: &'static str,
    pub status: String,
    /// Whether a summary email was handed off
    pub notified: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VapiOutcome {
    Persisted(ReconcileOutcome),
    /// Event type that carries nothing to store
    Acknowledged { event_type: String },
}

pub struct Reconciler {
    pool: SqlitePool,
    resolver: TenantResolver,
    notifier: Arc<dyn CallNotifier>,
    merge_policy: MergePolicy,
    transcript_window: Duration,
}

impl Reconciler {
    pub fn new(
        pool: SqlitePool,
        resolver: TenantResolver,
        notifier: Arc<dyn CallNotifier>,
        merge_policy: MergePolicy,
        transcript_window: Duration,
    ) -> Self {
        Self {
            pool,
            resolver,
            notifier,
            merge_policy,
            transcript_window,
        }
    }

    pub async fn handle_vapi_event(&self, body: Value) -> Result<VapiOutcome> {
        let event = VapiEvent::parse(body)?;

        if !event.kind.persists() {
            debug!(event_type = event.kind.as_str(), "Acknowledged provider event");
            return Ok(VapiOutcome::Acknowledged {
                event_type: event.kind.as_str().to_string(),
            });
        }

        if event.call_id().is_none() {
            return Err(Error::InvalidInput(format!(
                "{} event without call id",
                event.kind.as_str()
            )));
        }

        let resolution = self.resolver.resolve(&self.pool, &event.signals()).await?;
        let tenant_id = resolution.tenant_id();
        let record = event.to_call_record(&tenant_id, ava_common::time::now())?;
        let stored = self.persist(&resolution, record).await?;

        let notified = if event.kind.is_call_end() {
            self.notify_call_end(&event, &resolution, &stored).await
        } else {
            false
        };

        info!(
            event_type = event.kind.as_str(),
            call_id = %stored.id,
            tenant_id = %stored.tenant_id,
            status = %stored.status,
            "Reconciled provider event"
        );

        Ok(VapiOutcome::Persisted(ReconcileOutcome {
            call_id: stored.id,
            tenant_id: stored.tenant_id,
            strategy: resolution.strategy,
            status: stored.status,
            notified,
        }))
    }

    pub async fn handle_twilio_status(
        &self,
        form: HashMap<String, String>,
    ) -> Result<ReconcileOutcome> {
        let callback = TwilioStatusCallback::from_form(form, ava_common::time::now())?;

        let resolution = self.resolver.resolve(&self.pool, &callback.signals()).await?;
        let record = callback.to_call_record(&resolution.tenant_id());
        let stored = self.persist(&resolution, record).await?;

        info!(
            call_sid = %stored.id,
            tenant_id = %stored.tenant_id,
            carrier_status = callback.status,
            status = %stored.status,
            "Reconciled carrier status callback"
        );

        Ok(ReconcileOutcome {
            call_id: stored.id,
            tenant_id: stored.tenant_id,
            strategy: resolution.strategy,
            status: stored.status,
            notified: false,
        })
    }

    /// Anchor the tenant, merge-upsert, and return the stored row
    async fn persist(&self, resolution: &Resolution, record: CallRecord) -> Result<CallRecord> {
        let user = &resolution.user;
        ensure_tenant(&self.pool, &user.tenant_id(), &user.tenant_name()).await?;

        let call_id = record.id.clone();
        let retention = TranscriptRetention::current(self.transcript_window);
        upsert_calls(&self.pool, vec![record], self.merge_policy, retention).await?;

        get_call_by_id(&self.pool, &call_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("call {call_id} missing after upsert")))
    }

    /// Send the summary email. Failures are logged and never surface.
    async fn notify_call_end(
        &self,
        event: &VapiEvent,
        resolution: &Resolution,
        stored: &CallRecord,
    ) -> bool {
        let config = resolution.config.as_ref();
        let recipient = config
            .and_then(|c| c.fallback_email.as_deref().or(c.summary_email.as_deref()))
            .or(resolution.user.email.as_deref())
            .map(str::trim)
            .filter(|r| !r.is_empty());

        let Some(recipient) = recipient else {
            info!(call_id = %stored.id, "No summary recipient configured, skipping email");
            return false;
        };

        let business_name = config
            .and_then(|c| c.organization_name.clone())
            .filter(|n| !n.trim().is_empty())
            .or_else(|| event.organization_hint())
            .unwrap_or_else(|| DEFAULT_BUSINESS_NAME.to_string());

        let transcript = stored
            .transcript
            .clone()
            .unwrap_or_else(|| events::NO_TRANSCRIPT.to_string());

        let summary = CallSummary {
            to: recipient.to_string(),
            caller_name: event.caller_name(),
            caller_phone: event.caller_phone().unwrap_or_else(|| "Unknown".to_string()),
            transcript,
            duration_seconds: stored.duration_seconds,
            call_date: stored.ended_at.unwrap_or_else(ava_common::time::now),
            call_id: stored.id.clone(),
            business_name,
        };

        let sent = self.notifier.send_call_summary(&summary).await;
        if !sent {
            warn!(call_id = %stored.id, "Call summary was not delivered");
        }
        sent
    }
}

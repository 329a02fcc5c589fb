//! Post-call summary notifications
//!
//! Delivery is best effort: implementations report success as a bool and
//! never fail the caller.

use ava_common::config::NotificationConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// Everything a call summary email needs
#[derive(Debug, Clone, PartialEq)]
pub struct CallSummary {
    pub to: String,
    pub caller_name: String,
    pub caller_phone: String,
    pub transcript: String,
    pub duration_seconds: Option<i64>,
    pub call_date: DateTime<Utc>,
    pub call_id: String,
    pub business_name: String,
}

impl CallSummary {
    pub fn subject(&self) -> String {
        format!("New call for {} from {}", self.business_name, self.caller_name)
    }

    /// Plain-text body
    pub fn render_text(&self) -> String {
        let duration = match self.duration_seconds {
            Some(secs) => format!("{}m {:02}s", secs / 60, secs % 60),
            None => "unknown".to_string(),
        };

        format!(
            "Call summary for {business}\n\n\
             Caller: {name}\n\
             Phone: {phone}\n\
             Date: {date}\n\
             Duration: {duration}\n\
             Call ID: {id}\n\n\
             Transcript\n\
             ----------\n\
             {transcript}\n",
            business = self.business_name,
            name = self.caller_name,
            phone = self.caller_phone,
            date = self.call_date.format("%Y-%m-%d %H:%M UTC"),
            id = self.call_id,
            transcript = self.transcript,
        )
    }
}

#[async_trait]
pub trait CallNotifier: Send + Sync {
    /// Returns whether the summary was handed off for delivery
    async fn send_call_summary(&self, summary: &CallSummary) -> bool;
}

/// Logs summaries instead of sending them
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl CallNotifier for LogNotifier {
    async fn send_call_summary(&self, summary: &CallSummary) -> bool {
        info!(
            call_id = %summary.call_id,
            to = %summary.to,
            "Email delivery not configured, call summary logged only"
        );
        false
    }
}

/// Sends summaries through a Resend-compatible HTTP email API
pub struct HttpEmailNotifier {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from_address: String,
}

impl HttpEmailNotifier {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        from_address: impl Into<String>,
    ) -> ava_common::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ava_common::Error::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            from_address: from_address.into(),
        })
    }
}

#[async_trait]
impl CallNotifier for HttpEmailNotifier {
    async fn send_call_summary(&self, summary: &CallSummary) -> bool {
        let body = json!({
            "from": self.from_address,
            "to": [summary.to],
            "subject": summary.subject(),
            "text": summary.render_text(),
        });

        let result = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(call_id = %summary.call_id, to = %summary.to, "Call summary sent");
                true
            }
            Ok(response) => {
                warn!(
                    call_id = %summary.call_id,
                    status = %response.status(),
                    "Email API rejected call summary"
                );
                false
            }
            Err(e) => {
                warn!(call_id = %summary.call_id, error = %e, "Failed to send call summary");
                false
            }
        }
    }
}

/// HTTP notifier when an API key is configured, logging notifier otherwise
pub fn notifier_from_config(
    config: &NotificationConfig,
) -> ava_common::Result<std::sync::Arc<dyn CallNotifier>> {
    match config.resend_api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(std::sync::Arc::new(HttpEmailNotifier::new(
            config.api_url.clone(),
            key,
            config.from_address.clone(),
        )?)),
        _ => Ok(std::sync::Arc::new(LogNotifier)),
    }
}

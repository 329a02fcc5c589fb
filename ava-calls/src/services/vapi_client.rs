//! Upstream voice provider client (Vapi REST API)
//!
//! Only the call listing is consumed. The provider is abstracted behind
//! [`CallProvider`] so the synchronizer can be driven by any source of raw
//! call objects.

use crate::services::circuit_breaker::TripsBreaker;
use ava_common::config::ProviderConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, TLS or timeout failure
    #[error("network error: {0}")]
    Network(String),

    #[error("provider rejected the API key")]
    Unauthorized,

    #[error("provider rate limit exceeded")]
    RateLimited,

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not a call list
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl TripsBreaker for ProviderError {
    fn trips_breaker(&self) -> bool {
        match self {
            ProviderError::Network(_) | ProviderError::RateLimited => true,
            ProviderError::Status { status, .. } => *status >= 500,
            ProviderError::Unauthorized | ProviderError::Decode(_) => false,
        }
    }
}

impl From<ProviderError> for ava_common::Error {
    fn from(err: ProviderError) -> Self {
        ava_common::Error::UpstreamUnavailable(err.to_string())
    }
}

/// Source of raw call objects for one tenant
#[async_trait]
pub trait CallProvider: Send + Sync {
    /// Up to `limit` recent calls, as returned by the provider
    async fn list_calls(&self, limit: u32) -> Result<Vec<Value>, ProviderError>;
}

/// Builds a provider client for a tenant's API key
pub trait ProviderFactory: Send + Sync {
    fn for_api_key(&self, api_key: &str) -> Arc<dyn CallProvider>;
}

pub struct VapiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl VapiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

/// Accept either a bare array or an `{ "items": [...] }` envelope
pub fn extract_call_list(body: Value) -> Result<Vec<Value>, ProviderError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ProviderError::Decode("object without an items array".to_string())),
        },
        other => Err(ProviderError::Decode(format!("expected a list, got {other}"))),
    }
}

#[async_trait]
impl CallProvider for VapiClient {
    async fn list_calls(&self, limit: u32) -> Result<Vec<Value>, ProviderError> {
        let url = format!("{}/call", self.base_url);
        debug!(%url, limit, "Listing provider calls");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => return Err(ProviderError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => return Err(ProviderError::RateLimited),
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::Status {
                    status: s.as_u16(),
                    body,
                });
            }
            _ => {}
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        extract_call_list(body)
    }
}

/// Creates [`VapiClient`]s that share one HTTP connection pool
pub struct VapiProviderFactory {
    http: reqwest::Client,
    base_url: String,
}

impl VapiProviderFactory {
    pub fn new(config: &ProviderConfig) -> ava_common::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ava_common::Error::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.vapi_base_url.clone(),
        })
    }
}

impl ProviderFactory for VapiProviderFactory {
    fn for_api_key(&self, api_key: &str) -> Arc<dyn CallProvider> {
        Arc::new(VapiClient::new(self.http.clone(), self.base_url.clone(), api_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_bare_array() {
        let calls = extract_call_list(json!([{"id": "a"}, {"id": "b"}])).unwrap();
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn test_extract_items_envelope() {
        let calls = extract_call_list(json!({"items": [{"id": "a"}], "next": null})).unwrap();
        assert_eq!(calls, vec![json!({"id": "a"})]);
    }

    #[test]
    fn test_extract_rejects_other_shapes() {
        assert!(matches!(
            extract_call_list(json!({"data": []})),
            Err(ProviderError::Decode(_))
        ));
        assert!(matches!(extract_call_list(json!("nope")), Err(ProviderError::Decode(_))));
    }

    #[test]
    fn test_breaker_classification() {
        assert!(ProviderError::Network("reset".into()).trips_breaker());
        assert!(ProviderError::RateLimited.trips_breaker());
        assert!(ProviderError::Status { status: 503, body: String::new() }.trips_breaker());
        assert!(!ProviderError::Status { status: 404, body: String::new() }.trips_breaker());
        assert!(!ProviderError::Unauthorized.trips_breaker());
        assert!(!ProviderError::Decode("bad json".into()).trips_breaker());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = VapiClient::new(reqwest::Client::new(), "https://api.vapi.ai/", "key");
        assert_eq!(client.base_url, "https://api.vapi.ai");
    }
}

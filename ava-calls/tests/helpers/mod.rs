//! Shared fixtures for ava-calls integration tests
//!
//! Each test binary uses a different subset.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ava_calls::db::{create_assistant_config, create_user, ensure_tenant};
use ava_calls::services::{
    CallNotifier, CallProvider, CallSummary, ProviderError, ProviderFactory, Reconciler,
    TenantResolver,
};
use ava_calls::AppState;
use ava_common::config::AppConfig;
use ava_common::db::{
    init_memory_database, AssistantConfig, CallRecord, TranscriptRetention, User,
};
use ava_common::{MergePolicy, TenantId};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::SqlitePool;

pub const OWNER_ID: &str = "3F2504E0-4F89-11D3-9A0C-0305E82C3301";
pub const OWNER_TENANT: &str = "3f2504e0-4f89-11d3-9a0c-0305e82c3301";
pub const OWNER_NUMBER: &str = "+15551230000";
pub const ASSISTANT_ID: &str = "asst-front-desk";

/// Default 24 hour transcript window
pub fn transcript_window() -> Duration {
    Duration::hours(24)
}

/// Default window evaluated now
pub fn retention() -> TranscriptRetention {
    TranscriptRetention::current(transcript_window())
}

pub async fn test_db() -> SqlitePool {
    init_memory_database().await.expect("in-memory database")
}

pub fn user(id: &str, email: Option<&str>, twilio: Option<&str>, api_key: Option<&str>) -> User {
    User {
        id: id.to_string(),
        email: email.map(str::to_string),
        name: Some("Front Desk Clinic".to_string()),
        twilio_phone_number: twilio.map(str::to_string),
        vapi_api_key: api_key.map(str::to_string),
    }
}

pub async fn seed_user(pool: &SqlitePool, user: User) -> User {
    create_user(pool, &user).await.expect("create user");
    ensure_tenant(pool, &user.tenant_id(), &user.tenant_name())
        .await
        .expect("ensure tenant");
    user
}

/// The standard owner: UUID id, carrier number, provider key
pub async fn seed_owner(pool: &SqlitePool) -> User {
    seed_user(
        pool,
        user(OWNER_ID, Some("owner@clinic.test"), Some(OWNER_NUMBER), Some("vapi-key-1")),
    )
    .await
}

pub async fn seed_config(
    pool: &SqlitePool,
    user_id: &str,
    assistant_id: &str,
    fallback_email: Option<&str>,
) -> AssistantConfig {
    let config = AssistantConfig {
        id: format!("cfg-{assistant_id}"),
        user_id: user_id.to_string(),
        organization_name: Some("Smile Dental".to_string()),
        vapi_assistant_id: Some(assistant_id.to_string()),
        summary_email: Some("summary@clinic.test".to_string()),
        fallback_email: fallback_email.map(str::to_string),
    };
    create_assistant_config(pool, &config).await.expect("create config");
    config
}

pub fn call_at(id: &str, tenant: &str, started_at: DateTime<Utc>) -> CallRecord {
    CallRecord::new(id, ASSISTANT_ID, TenantId::new(tenant), started_at)
}

/// How the fake provider answers
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Calls(Vec<Value>),
    ServerError,
    Unauthorized,
}

pub struct FakeProvider {
    response: FakeResponse,
    invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl CallProvider for FakeProvider {
    async fn list_calls(&self, limit: u32) -> Result<Vec<Value>, ProviderError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            FakeResponse::Calls(calls) => Ok(calls.iter().take(limit as usize).cloned().collect()),
            FakeResponse::ServerError => Err(ProviderError::Status {
                status: 500,
                body: "upstream exploded".to_string(),
            }),
            FakeResponse::Unauthorized => Err(ProviderError::Unauthorized),
        }
    }
}

impl FakeProvider {
    pub fn new(response: FakeResponse) -> Self {
        Self {
            response,
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

/// Hands out providers that all share one response and invocation counter
pub struct FakeProviderFactory {
    response: Mutex<FakeResponse>,
    invocations: Arc<AtomicUsize>,
    keys: Mutex<Vec<String>>,
}

impl FakeProviderFactory {
    pub fn new(response: FakeResponse) -> Self {
        Self {
            response: Mutex::new(response),
            invocations: Arc::new(AtomicUsize::new(0)),
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn set_response(&self, response: FakeResponse) {
        *self.response.lock().unwrap() = response;
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

impl ProviderFactory for FakeProviderFactory {
    fn for_api_key(&self, api_key: &str) -> Arc<dyn CallProvider> {
        self.keys.lock().unwrap().push(api_key.to_string());
        Arc::new(FakeProvider {
            response: self.response.lock().unwrap().clone(),
            invocations: Arc::clone(&self.invocations),
        })
    }
}

/// Remembers every summary and reports the configured outcome
pub struct RecordingNotifier {
    succeed: bool,
    sent: Mutex<Vec<CallSummary>>,
}

impl RecordingNotifier {
    pub fn new(succeed: bool) -> Self {
        Self {
            succeed,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<CallSummary> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallNotifier for RecordingNotifier {
    async fn send_call_summary(&self, summary: &CallSummary) -> bool {
        self.sent.lock().unwrap().push(summary.clone());
        self.succeed
    }
}

pub fn reconciler(
    pool: &SqlitePool,
    single_tenant_mode: bool,
    notifier: Arc<RecordingNotifier>,
) -> Reconciler {
    Reconciler::new(
        pool.clone(),
        TenantResolver::standard(single_tenant_mode),
        notifier,
        MergePolicy::LastWriteWins,
        transcript_window(),
    )
}

pub fn app_state(
    pool: SqlitePool,
    config: AppConfig,
    providers: Arc<FakeProviderFactory>,
    notifier: Arc<RecordingNotifier>,
) -> AppState {
    AppState::new(pool, config, providers, notifier)
}

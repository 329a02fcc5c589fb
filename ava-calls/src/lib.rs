//! ava-calls library - call ingestion, webhook reconciliation and analytics
//!
//! Keeps a per-tenant history of voice-assistant calls fed by provider
//! polling and by webhooks, and serves dashboard analytics over it.

use std::sync::Arc;

use ava_common::config::AppConfig;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod analytics;
pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use error::{ApiError, ApiResult};

use services::{
    notifier_from_config, CallNotifier, CircuitBreaker, ProviderFactory, Reconciler,
    TenantResolver, VapiProviderFactory,
};

/// Name the provider circuit breaker reports in errors and logs
pub const PROVIDER_SERVICE: &str = "vapi";

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub reconciler: Arc<Reconciler>,
    /// Builds a provider client per tenant API key
    pub providers: Arc<dyn ProviderFactory>,
    /// Shared by every sync so upstream outages trip it once for all tenants
    pub breaker: Arc<CircuitBreaker>,
    pub notifier: Arc<dyn CallNotifier>,
}

impl AppState {
    /// Create application state with explicit collaborators
    pub fn new(
        db: SqlitePool,
        config: AppConfig,
        providers: Arc<dyn ProviderFactory>,
        notifier: Arc<dyn CallNotifier>,
    ) -> Self {
        let resolver = TenantResolver::standard(config.reconciler.single_tenant_mode);
        let reconciler = Reconciler::new(
            db.clone(),
            resolver,
            Arc::clone(&notifier),
            config.reconciler.merge_policy,
            config.retention.transcript_window(),
        );
        let breaker = CircuitBreaker::from_config(PROVIDER_SERVICE, &config.breaker);

        Self {
            db,
            config: Arc::new(config),
            reconciler: Arc::new(reconciler),
            providers,
            breaker: Arc::new(breaker),
            notifier,
        }
    }

    /// Create application state with the HTTP provider client and configured notifier
    pub fn from_config(db: SqlitePool, config: AppConfig) -> ava_common::Result<Self> {
        let providers = Arc::new(VapiProviderFactory::new(&config.provider)?);
        let notifier = notifier_from_config(&config.notifications)?;
        Ok(Self::new(db, config, providers, notifier))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let tenant_routes = Router::new()
        .route("/calls", get(api::list_calls))
        .route("/calls/:call_id", get(api::get_call_detail).delete(api::delete_call))
        .route("/calls/:call_id/recording", get(api::get_call_recording))
        .route("/calls/:call_id/email", post(api::email_call_summary))
        .route("/sync", post(api::sync_calls))
        .route("/analytics/overview", get(api::analytics_overview))
        .route("/analytics/timeseries", get(api::analytics_timeseries))
        .route("/analytics/topics", get(api::analytics_topics))
        .route("/analytics/anomalies", get(api::analytics_anomalies))
        .route("/analytics/heatmap", get(api::analytics_heatmap));

    let webhooks = Router::new()
        .route("/webhooks/vapi", post(api::vapi_webhook))
        .route("/webhooks/twilio/status", post(api::twilio_status_webhook));

    Router::new()
        .nest("/api/tenants/:tenant_id", tenant_routes)
        .merge(webhooks)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

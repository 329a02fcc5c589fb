//! Business services for ava-calls

pub mod circuit_breaker;
pub mod notifier;
pub mod reconciler;
pub mod retention;
pub mod synchronizer;
pub mod vapi_client;

pub use circuit_breaker::{BreakerError, BreakerState, CircuitBreaker, TripsBreaker};
pub use notifier::{notifier_from_config, CallNotifier, CallSummary, HttpEmailNotifier, LogNotifier};
pub use reconciler::{ReconcileOutcome, Reconciler, TenantResolver, VapiOutcome};
pub use retention::{spawn_retention_sweeper, sweep_once, SweepReport};
pub use synchronizer::{normalize_call, sync_tenant_calls, SyncReport};
pub use vapi_client::{CallProvider, ProviderError, ProviderFactory, VapiClient, VapiProviderFactory};

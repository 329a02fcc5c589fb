//! HTTP API handlers for ava-calls

pub mod analytics;
pub mod calls;
pub mod health;
pub mod sync;
pub mod webhooks;

pub use analytics::{
    analytics_anomalies, analytics_heatmap, analytics_overview, analytics_timeseries,
    analytics_topics,
};
pub use calls::{delete_call, email_call_summary, get_call_detail, get_call_recording, list_calls};
pub use health::health_routes;
pub use sync::sync_calls;
pub use webhooks::{twilio_status_webhook, vapi_webhook};

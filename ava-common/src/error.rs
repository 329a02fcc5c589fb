//! Common error types for AVA

use thiserror::Error;

/// Common result type for AVA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the AVA call engine
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error, e.g. a corrupt `meta` column
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The upstream call provider could not be reached or answered with a failure
    #[error("Upstream provider unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A circuit breaker is open for `service`
    #[error("Service {service} temporarily unavailable, retry after {retry_after_secs}s")]
    ServiceUnavailable {
        service: String,
        retry_after_secs: u64,
    },

    /// No resolution strategy could attribute an inbound event to a tenant
    #[error("Unable to resolve tenant: {0}")]
    TenantUnresolved(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

//! Circuit breaker for upstream provider calls.
//!
//! After `failure_threshold` consecutive counted failures the breaker opens
//! and rejects calls without running them. Once `recovery_timeout` has
//! elapsed it lets trial calls through (half-open); `success_threshold`
//! consecutive trial successes close it again, a single trial failure
//! re-opens it.
//!
//! Only errors that report [`TripsBreaker::trips_breaker`] count. Parse
//! errors and client-side rejections leave the state untouched.

use ava_common::config::BreakerConfig;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// Classifies whether an error indicates the upstream service is unhealthy
pub trait TripsBreaker {
    fn trips_breaker(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Rejected without calling upstream
    #[error("circuit open for {service}, retry after {retry_after:?}")]
    Open {
        service: String,
        retry_after: Duration,
    },

    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    success_threshold: u32,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        failure_threshold: u32,
        recovery_timeout: Duration,
        success_threshold: u32,
    ) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            success_threshold: success_threshold.max(1),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
            }),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &BreakerConfig) -> Self {
        Self::new(
            name,
            config.failure_threshold,
            Duration::from_secs(config.recovery_timeout_secs),
            config.success_threshold,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Run `operation` through the breaker
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TripsBreaker,
    {
        self.admit()?;

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                if err.trips_breaker() {
                    self.record_failure();
                }
                Err(BreakerError::Inner(err))
            }
        }
    }

    fn admit<E>(&self) -> Result<(), BreakerError<E>> {
        let mut inner = self.lock();
        if inner.state != BreakerState::Open {
            return Ok(());
        }

        let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::MAX);
        if elapsed >= self.recovery_timeout {
            info!(breaker = %self.name, "Circuit breaker half-open, allowing trial call");
            inner.state = BreakerState::HalfOpen;
            inner.half_open_successes = 0;
            return Ok(());
        }

        Err(BreakerError::Open {
            service: self.name.clone(),
            retry_after: self.recovery_timeout - elapsed,
        })
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => inner.consecutive_failures = 0,
            BreakerState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.success_threshold {
                    info!(breaker = %self.name, "Circuit breaker closed");
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.opened_at = None;
                }
            }
            // A call admitted before another task opened the breaker
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        "Circuit breaker opened"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                warn!(breaker = %self.name, "Trial call failed, circuit breaker re-opened");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
            }
            BreakerState::Open => {}
        }
    }
}

impl<E: Into<ava_common::Error>> From<BreakerError<E>> for ava_common::Error {
    fn from(err: BreakerError<E>) -> Self {
        match err {
            BreakerError::Open {
                service,
                retry_after,
            } => ava_common::Error::ServiceUnavailable {
                service,
                retry_after_secs: retry_after_secs(retry_after),
            },
            BreakerError::Inner(inner) => inner.into(),
        }
    }
}

/// Whole seconds to wait, rounded up and never zero
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

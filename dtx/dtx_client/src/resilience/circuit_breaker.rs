use std::future::Future;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::CircuitBreakerConfig;
use crate::error::{Result, TransactionError};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally
    Closed,

    /// Calls are rejected until the recovery timeout elapses
    Open,

    /// A limited number of trial calls probe whether the coordinator recovered
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    half_open_in_flight: u32,
}

/// Fails fast once the coordinator has failed repeatedly.
///
/// After `failure_threshold` consecutive failures the circuit opens and every
/// call is rejected with [`TransactionError::CircuitOpen`]. Once
/// `recovery_timeout` has passed since the last failure the circuit goes
/// half-open and admits up to `half_open_max_calls` concurrent trial calls. A
/// trial success closes the circuit; a trial failure reopens it.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

/// Releases a half-open trial slot when the call finishes or is dropped.
struct TrialPermit<'a> {
    breaker: &'a CircuitBreaker,
}

impl Drop for TrialPermit<'_> {
    fn drop(&mut self) {
        let mut inner = self.breaker.inner.lock();
        inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        CircuitBreaker {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                half_open_in_flight: 0,
            }),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Force the breaker back to closed and forget recorded failures.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
    }

    /// Run `operation` through the breaker. Rejected calls never invoke it.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let trial = self.admit()?;
        let _permit = trial.then(|| TrialPermit { breaker: self });

        let result = operation().await;
        match &result {
            Ok(_) => self.record_success(),
            // Cancellation says nothing about coordinator health.
            Err(err) if err.is_cancelled() => {}
            Err(_) => self.record_failure(),
        }
        result
    }

    /// Decide whether a call may proceed. Returns `Ok(true)` when the call
    /// occupies a half-open trial slot.
    fn admit(&self) -> Result<bool> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let recovered = inner
                .last_failure
                .map(|at| at.elapsed() >= self.config.recovery_timeout)
                .unwrap_or(true);
            if !recovered {
                debug!("circuit open, rejecting call");
                return Err(TransactionError::CircuitOpen);
            }
            info!("circuit breaker entering half-open state");
            inner.state = CircuitState::HalfOpen;
            inner.half_open_in_flight = 0;
        }

        match inner.state {
            CircuitState::Closed => Ok(false),
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight >= self.config.half_open_max_calls.max(1) {
                    debug!("half-open trial limit reached, rejecting call");
                    return Err(TransactionError::CircuitOpen);
                }
                inner.half_open_in_flight += 1;
                Ok(true)
            }
            CircuitState::Open => Err(TransactionError::CircuitOpen),
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!("circuit breaker closed after successful trial call");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                info!("trial call failed, circuit breaker reopened");
                inner.state = CircuitState::Open;
            }
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold.max(1) => {
                info!(
                    failures = inner.failure_count,
                    "circuit breaker opened"
                );
                inner.state = CircuitState::Open;
            }
            _ => {}
        }
    }
}

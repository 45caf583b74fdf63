//! Retry and circuit-breaker protection for coordinator calls
//!
//! Each orchestrator execution builds one [`Resilience`] guard from its
//! [`ExecutionOptions`]. The retry policy applies to every remote call of the
//! execution. The circuit breaker, shared across the execution, guards only
//! the transaction-level calls (start, registration, submit, status polls).
//! Branch calls and cleanup go through [`Resilience::retry_only`]: one
//! branch's failures must not stop the others from being attempted or
//! cancelled.

pub mod circuit_breaker;
pub mod retry;

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ExecutionOptions;
use crate::error::Result;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use retry::RetryExecutor;

/// Per-execution call guard: `retry(breaker(call))`
#[derive(Debug, Clone, Default)]
pub struct Resilience {
    retry: Option<RetryExecutor>,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl Resilience {
    pub fn from_options(options: &ExecutionOptions) -> Self {
        Resilience {
            retry: options.retry.clone().map(RetryExecutor::new),
            breaker: options
                .circuit_breaker
                .clone()
                .map(|config| Arc::new(CircuitBreaker::new(config))),
        }
    }

    /// A guard that runs every call exactly once.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.breaker.as_ref()
    }

    /// Run `operation` with the configured protections. Each retry attempt
    /// passes through the breaker, so an open circuit ends the retries early.
    pub async fn call<T, F, Fut>(&self, cancel: &CancellationToken, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match &self.retry {
            Some(retry) => {
                retry
                    .execute_with_retry(cancel, || self.through_breaker(operation()))
                    .await
            }
            None => self.through_breaker(operation()).await,
        }
    }

    /// Run `operation` under the retry policy alone. The breaker is neither
    /// consulted nor updated.
    pub async fn retry_only<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match &self.retry {
            Some(retry) => retry.execute_with_retry(cancel, operation).await,
            None => operation().await,
        }
    }

    async fn through_breaker<T, Fut>(&self, call: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match &self.breaker {
            Some(breaker) => breaker.execute(|| call).await,
            None => call.await,
        }
    }
}

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{Result, TransactionError};

/// Symmetric jitter applied to every backoff delay, as a fraction of the delay
const JITTER_RATIO: f64 = 0.1;

/// Runs an operation up to `max_retries + 1` times with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor
    pub fn new(config: RetryConfig) -> Self {
        RetryExecutor { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay before jitter for the given zero-based attempt:
    /// `retry_interval * backoff_factor ^ attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.config.retry_interval.as_secs_f64() * self.config.backoff_factor.powi(exponent);
        secs_to_duration(secs)
    }

    /// Backoff delay with up to ±10% jitter; never negative.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.backoff_delay(attempt).as_secs_f64();
        let jitter = rand::thread_rng().gen_range(-JITTER_RATIO..=JITTER_RATIO);
        secs_to_duration(base + base * jitter)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, the
    /// attempts run out, or `cancel` fires.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_validation(cancel, operation, |_| Ok(()))
            .await
    }

    /// Like [`execute_with_retry`](Self::execute_with_retry), but a successful
    /// result must also pass `validator`; a validation failure counts as a
    /// failed attempt.
    pub async fn execute_with_validation<T, F, Fut, V>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
        mut validator: V,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        V: FnMut(&T) -> Result<()>,
    {
        let max_retries = self.config.max_retries;
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(TransactionError::Cancelled);
            }

            let outcome = match operation().await {
                Ok(value) => validator(&value).map(|_| value),
                Err(err) => Err(err),
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if err.is_cancelled() || !err.is_retryable() {
                return Err(err);
            }

            if attempt >= max_retries {
                warn!(retries = max_retries, error = %err, "retries exhausted");
                return Err(TransactionError::RetriesExhausted {
                    retries: max_retries,
                    source: Box::new(err),
                });
            }

            let delay = self.jittered_delay(attempt);
            warn!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "operation failed, backing off"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransactionError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

//! Saga and TCC orchestrators built on the transaction handle

pub mod saga;
pub mod tcc;

#[cfg(test)]
pub(crate) mod tests;

use std::future::Future;

use tokio::time::{timeout_at, Instant};

use crate::error::{Result, TransactionError};

pub use saga::{
    compensation_handler, CompensationHandler, SagaOrchestrator, SagaPhase, SagaStep,
    SagaWorkflow,
};
pub use tcc::{TccOrchestrator, TccPhase, TccStep, TccWorkflow};

/// Run `fut` unless the execution deadline passes first.
pub(crate) async fn with_deadline<T, F>(deadline: Instant, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransactionError::Timeout(format!(
            "{} exceeded the execution deadline",
            what
        ))),
    }
}

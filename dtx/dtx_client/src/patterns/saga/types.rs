use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::patterns::saga::definition::SagaStep;

/// Caller-supplied compensation for a failed Saga step.
///
/// The orchestrator calls it once per failed step, walking the workflow in
/// reverse, and awaits the returned futures concurrently. An `Err` message is
/// reported as a compensation failure.
pub type CompensationHandler =
    Arc<dyn Fn(SagaStep, CancellationToken) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Wrap an async closure as a [`CompensationHandler`].
pub fn compensation_handler<F, Fut>(handler: F) -> CompensationHandler
where
    F: Fn(SagaStep, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    Arc::new(move |step, cancel| handler(step, cancel).boxed())
}

/// Progress of one Saga execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaPhase {
    Starting,
    Registering,
    Submitting,
    Polling,
    Compensating,
    Committed,
    Aborted,
}

impl fmt::Display for SagaPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Registering => "registering",
            Self::Submitting => "submitting",
            Self::Polling => "polling",
            Self::Compensating => "compensating",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

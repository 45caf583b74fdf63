use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::TccPhase;
use crate::client::TransactionClient;
use crate::config::ExecutionOptions;
use crate::error::{Result, TransactionError};
use crate::model::TransactionMode;
use crate::patterns::tcc::definition::{TccStep, TccWorkflow};
use crate::patterns::with_deadline;
use crate::resilience::Resilience;
use crate::transaction::TransactionHandle;

/// Drives TCC transactions: Try every branch, then Confirm every branch. A
/// failure in either phase sends Cancel to every branch of the workflow.
#[derive(Debug, Clone)]
pub struct TccOrchestrator {
    client: Arc<TransactionClient>,
}

/// Everything a branch task needs, shareable across spawned tasks.
#[derive(Clone)]
struct PhaseContext {
    handle: Arc<TransactionHandle>,
    guard: Resilience,
    cancel: CancellationToken,
    payload: Arc<[u8]>,
}

impl TccOrchestrator {
    pub fn new(client: Arc<TransactionClient>) -> Self {
        TccOrchestrator { client }
    }

    pub fn client(&self) -> &Arc<TransactionClient> {
        &self.client
    }

    /// Run a TCC transaction. Returns the gid once every branch confirmed.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        workflow: &TccWorkflow,
        payload: &[u8],
        options: &ExecutionOptions,
    ) -> Result<String> {
        self.run(cancel, workflow, payload, payload.to_vec(), options)
            .await
    }

    /// Like [`execute`](Self::execute), but every Try carries the payload
    /// with `barrier_id` appended so branch services can drop duplicate
    /// deliveries. The transaction itself is started with the plain payload.
    pub async fn execute_with_barrier(
        &self,
        cancel: &CancellationToken,
        workflow: &TccWorkflow,
        payload: &[u8],
        barrier_id: &str,
        options: &ExecutionOptions,
    ) -> Result<String> {
        if barrier_id.is_empty() {
            return Err(TransactionError::Validation(
                "barrier ID cannot be empty".to_string(),
            ));
        }

        let mut try_payload = Vec::with_capacity(payload.len() + barrier_id.len());
        try_payload.extend_from_slice(payload);
        try_payload.extend_from_slice(barrier_id.as_bytes());
        self.run(cancel, workflow, payload, try_payload, options)
            .await
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        workflow: &TccWorkflow,
        payload: &[u8],
        try_payload: Vec<u8>,
        options: &ExecutionOptions,
    ) -> Result<String> {
        workflow.validate()?;
        options.validate()?;

        let guard = Resilience::from_options(options);
        let deadline = Instant::now() + options.timeout;

        let proposed = TransactionClient::generate_gid();
        let handle = with_deadline(
            deadline,
            "TCC start",
            guard.call(cancel, || {
                self.client.start_transaction_with_gid(
                    cancel,
                    &proposed,
                    TransactionMode::Tcc,
                    payload.to_vec(),
                )
            }),
        )
        .await?;
        let gid = handle.gid().to_string();

        let ctx = PhaseContext {
            handle: Arc::new(handle),
            guard,
            cancel: cancel.clone(),
            payload: Arc::from(try_payload),
        };

        let outcome = with_deadline(deadline, "TCC execution", async {
            run_phase(TccPhase::Try, &ctx, workflow, options).await?;
            run_phase(TccPhase::Confirm, &ctx, workflow, options).await
        })
        .await;

        match outcome {
            Ok(()) => {
                info!(gid = %gid, "TCC transaction confirmed");
                Ok(gid)
            }
            Err(err) => {
                warn!(gid = %gid, error = %err, "TCC execution failed");
                if cancel.is_cancelled() {
                    warn!(gid = %gid, "execution cancelled, skipping branch cancellation");
                } else {
                    cancel_all(&ctx, workflow, options).await;
                }
                Err(err)
            }
        }
    }
}

/// Run one phase over every step. Sequential mode stops at the first
/// failure; parallel mode attempts every branch and reports the first
/// failure to complete.
async fn run_phase(
    phase: TccPhase,
    ctx: &PhaseContext,
    workflow: &TccWorkflow,
    options: &ExecutionOptions,
) -> Result<()> {
    debug!(gid = %ctx.handle.gid(), phase = %phase, "TCC phase started");

    if options.parallel_branches {
        let failures = fan_out(phase, ctx, workflow, options.max_concurrency).await;
        if let Some(err) = failures.into_iter().next() {
            return Err(err);
        }
    } else {
        for step in &workflow.steps {
            call_branch(phase, ctx, step).await?;
        }
    }

    debug!(gid = %ctx.handle.gid(), phase = %phase, "TCC phase completed");
    Ok(())
}

/// Send Cancel to every branch of the workflow. Failures are logged only.
async fn cancel_all(ctx: &PhaseContext, workflow: &TccWorkflow, options: &ExecutionOptions) {
    info!(gid = %ctx.handle.gid(), branches = workflow.steps.len(), "cancelling all branches");
    for err in fan_out(TccPhase::Cancel, ctx, workflow, options.max_concurrency).await {
        warn!(gid = %ctx.handle.gid(), error = %err, "branch cancel failed");
    }
}

/// Issue `phase` for every step concurrently, at most `max_concurrency` in
/// flight. Returns the failures in completion order.
async fn fan_out(
    phase: TccPhase,
    ctx: &PhaseContext,
    workflow: &TccWorkflow,
    max_concurrency: usize,
) -> Vec<TransactionError> {
    let gate = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for step in &workflow.steps {
        let gate = gate.clone();
        let ctx = ctx.clone();
        let step = step.clone();
        tasks.spawn(async move {
            let _permit = gate
                .acquire_owned()
                .await
                .map_err(|_| TransactionError::Internal("admission gate closed".to_string()))?;
            call_branch(phase, &ctx, &step).await
        });
    }

    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let result = joined.unwrap_or_else(|e| {
            Err(TransactionError::Internal(format!(
                "{} task failed: {}",
                phase, e
            )))
        });
        if let Err(err) = result {
            failures.push(err);
        }
    }
    failures
}

/// Branch calls are retried but bypass the circuit breaker, so failing
/// branches never keep the remaining ones from being tried or cancelled.
async fn call_branch(phase: TccPhase, ctx: &PhaseContext, step: &TccStep) -> Result<()> {
    let PhaseContext {
        handle,
        guard,
        cancel,
        payload,
    } = ctx;
    let branch_id = step.branch_id.as_str();

    match phase {
        TccPhase::Try => {
            guard
                .retry_only(cancel, || {
                    handle.try_branch(cancel, branch_id, &step.try_action, payload)
                })
                .await
        }
        TccPhase::Confirm => {
            guard
                .retry_only(cancel, || handle.confirm_branch(cancel, branch_id))
                .await
        }
        TccPhase::Cancel => {
            guard
                .retry_only(cancel, || handle.cancel_branch(cancel, branch_id))
                .await
        }
    }
}

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::TransactionClient;
use crate::config::{CompensationPolicy, ExecutionOptions};
use crate::error::{Phase, Result, TransactionError};
use crate::model::{TransactionInfo, TransactionMode, TransactionStatus};
use crate::patterns::saga::definition::SagaWorkflow;
use crate::patterns::saga::types::{CompensationHandler, SagaPhase};
use crate::patterns::with_deadline;
use crate::resilience::Resilience;
use crate::transaction::TransactionHandle;

/// Drives Saga transactions: register every branch, submit, then poll the
/// coordinator until the transaction commits or aborts.
#[derive(Debug, Clone)]
pub struct SagaOrchestrator {
    client: Arc<TransactionClient>,
}

impl SagaOrchestrator {
    pub fn new(client: Arc<TransactionClient>) -> Self {
        SagaOrchestrator { client }
    }

    pub fn client(&self) -> &Arc<TransactionClient> {
        &self.client
    }

    /// Run a Saga and wait for its outcome. Returns the gid on commit.
    ///
    /// Compensation of an aborted Saga is left to the coordinator, unless the
    /// options' [`CompensationPolicy`] forbids running without a handler.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        workflow: &SagaWorkflow,
        payload: &[u8],
        options: &ExecutionOptions,
    ) -> Result<String> {
        self.run(cancel, workflow, payload, None, options).await
    }

    /// Run a Saga; if it aborts, call `handler` for every step the coordinator
    /// reports as failed, in reverse workflow order.
    ///
    /// An aborted Saga is reported as an error even when every compensation
    /// succeeds: the result is [`TransactionError::Aborted`], or
    /// [`TransactionError::Compensation`] when some handler calls failed. A
    /// successful unwind is not turned into `Ok`, since the business action
    /// did not commit.
    pub async fn execute_with_compensation(
        &self,
        cancel: &CancellationToken,
        workflow: &SagaWorkflow,
        payload: &[u8],
        handler: CompensationHandler,
        options: &ExecutionOptions,
    ) -> Result<String> {
        self.run(cancel, workflow, payload, Some(&handler), options)
            .await
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        workflow: &SagaWorkflow,
        payload: &[u8],
        handler: Option<&CompensationHandler>,
        options: &ExecutionOptions,
    ) -> Result<String> {
        workflow.validate()?;
        options.validate()?;
        if handler.is_none() && options.compensation_policy == CompensationPolicy::RequireHandler {
            return Err(TransactionError::Validation(
                "a compensation handler is required by the configured compensation policy"
                    .to_string(),
            ));
        }

        let guard = Resilience::from_options(options);
        let deadline = Instant::now() + options.timeout;
        let mut phase = SagaPhase::Starting;

        // One gid for every start attempt, so a retry after a lost reply
        // cannot open a second transaction.
        let proposed = TransactionClient::generate_gid();
        let handle = with_deadline(
            deadline,
            "saga start",
            guard.call(cancel, || {
                self.client.start_transaction_with_gid(
                    cancel,
                    &proposed,
                    TransactionMode::Saga,
                    payload.to_vec(),
                )
            }),
        )
        .await?;
        let gid = handle.gid().to_string();

        advance(&gid, &mut phase, SagaPhase::Registering);
        for step in &workflow.steps {
            let registered = with_deadline(
                deadline,
                "saga branch registration",
                guard.call(cancel, || {
                    handle.add_branch(cancel, &step.branch_id, &step.action)
                }),
            )
            .await;

            if let Err(err) = registered {
                warn!(gid = %gid, branch_id = %step.branch_id, error = %err, "branch registration failed");
                if !err.is_cancelled() {
                    abort_quietly(&handle, &guard, cancel).await;
                }
                return Err(err);
            }
        }

        advance(&gid, &mut phase, SagaPhase::Submitting);
        with_deadline(
            deadline,
            "saga submit",
            guard.call(cancel, || handle.submit(cancel)),
        )
        .await?;

        advance(&gid, &mut phase, SagaPhase::Polling);
        let info = poll_until_terminal(&handle, &guard, cancel, options, deadline).await?;

        if info.status == TransactionStatus::Committed {
            advance(&gid, &mut phase, SagaPhase::Committed);
            return Ok(gid);
        }

        let aborted = TransactionError::Aborted { gid: gid.clone() };
        let failures = match handler {
            Some(handler) => {
                advance(&gid, &mut phase, SagaPhase::Compensating);
                compensate(cancel, workflow, &info, handler).await
            }
            None => {
                warn!(
                    gid = %gid,
                    failed_branches = ?info.failed_branch_ids(),
                    "saga aborted without a compensation handler, compensation is left to the coordinator"
                );
                Vec::new()
            }
        };
        advance(&gid, &mut phase, SagaPhase::Aborted);

        if failures.is_empty() {
            Err(aborted)
        } else {
            Err(TransactionError::Compensation {
                cause: Box::new(aborted),
                failures,
            })
        }
    }
}

fn advance(gid: &str, phase: &mut SagaPhase, next: SagaPhase) {
    debug!(gid, from = %phase, to = %next, "saga phase");
    *phase = next;
}

async fn abort_quietly(handle: &TransactionHandle, guard: &Resilience, cancel: &CancellationToken) {
    match guard.retry_only(cancel, || handle.abort(cancel)).await {
        Ok(()) => info!(gid = %handle.gid(), "saga aborted after registration failure"),
        Err(err) => warn!(gid = %handle.gid(), error = %err, "best-effort abort failed"),
    }
}

/// Poll on a fixed interval until Committed or Aborted. Ticks never overlap:
/// the next wait starts only after the previous status query returned.
async fn poll_until_terminal(
    handle: &TransactionHandle,
    guard: &Resilience,
    cancel: &CancellationToken,
    options: &ExecutionOptions,
    deadline: Instant,
) -> Result<TransactionInfo> {
    let timed_out = || {
        TransactionError::Timeout(format!(
            "saga {} did not finish within {:?}",
            handle.gid(),
            options.timeout
        ))
    };

    let mut ticker = interval_at(Instant::now() + options.poll_interval, options.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let expired = sleep_until(deadline);
    tokio::pin!(expired);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransactionError::Cancelled),
            _ = &mut expired => return Err(timed_out()),
            _ = ticker.tick() => {}
        }

        let info = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransactionError::Cancelled),
            _ = &mut expired => return Err(timed_out()),
            info = guard.call(cancel, || handle.info(cancel)) => info?,
        };

        debug!(gid = %handle.gid(), status = %info.status, "saga status");
        match info.status {
            TransactionStatus::Committed | TransactionStatus::Aborted => return Ok(info),
            TransactionStatus::Submitted => continue,
            TransactionStatus::Other(status) => {
                return Err(TransactionError::UnexpectedStatus(status));
            }
        }
    }
}

/// Call `handler` for each failed step, newest first, and await all of them.
/// Returns every failure; an empty list means every compensation succeeded.
async fn compensate(
    cancel: &CancellationToken,
    workflow: &SagaWorkflow,
    info: &TransactionInfo,
    handler: &CompensationHandler,
) -> Vec<TransactionError> {
    let mut tasks = JoinSet::new();

    for step in workflow
        .steps
        .iter()
        .rev()
        .filter(|step| info.is_branch_failed(&step.branch_id))
    {
        info!(gid = %info.gid, branch_id = %step.branch_id, "compensating branch");
        let compensation = handler(step.clone(), cancel.clone());
        let branch_id = step.branch_id.clone();
        tasks.spawn(async move { (branch_id, compensation.await) });
    }

    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((branch_id, Err(message))) => {
                warn!(gid = %info.gid, branch_id = %branch_id, error = %message, "compensation failed");
                failures.push(TransactionError::phase(
                    Phase::Compensate,
                    format!("branch {}", branch_id),
                    TransactionError::Handler(message),
                ));
            }
            Err(join_err) => {
                failures.push(TransactionError::Internal(format!(
                    "compensation task failed: {}",
                    join_err
                )));
            }
        }
    }

    failures
}

//! Scripted in-memory coordinator for orchestrator tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorCode, Result, TransactionError};
use crate::gateway::{cancellable, CoordinatorGateway};
use crate::model::{
    Branch, BranchStatus, HealthStatus, TransactionInfo, TransactionMode, TransactionStatus,
};

/// A recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start { mode: TransactionMode, payload: Vec<u8> },
    AddBranch { branch_id: String, action: String },
    Submit,
    Abort,
    Try { branch_id: String, payload: Vec<u8> },
    Confirm(String),
    Cancel(String),
    BranchSucceed(String),
    BranchFail(String),
    Get,
    List,
    Health,
    Metrics,
}

#[derive(Default)]
struct StubState {
    calls: Vec<Call>,
    proposed_gids: Vec<String>,
    mode: Option<TransactionMode>,
    assigned_gid: Option<String>,
    statuses: VecDeque<TransactionStatus>,
    branches: Vec<Branch>,
    branch_statuses: HashMap<String, BranchStatus>,
    failures: HashSet<(String, String)>,
    transient: HashMap<(String, String), u32>,
}

/// Coordinator double that records every call and replays scripted answers.
///
/// Status queries pop the scripted statuses in order; the last one repeats.
/// Failures are keyed by operation name and branch id (empty for
/// transaction-level operations).
pub struct StubCoordinator {
    state: Mutex<StubState>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubCoordinator {
    pub fn new() -> Self {
        StubCoordinator {
            state: Mutex::new(StubState {
                statuses: VecDeque::from(vec![TransactionStatus::Committed]),
                ..StubState::default()
            }),
            delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Status progression reported by successive queries.
    pub fn with_statuses(self, statuses: Vec<TransactionStatus>) -> Self {
        self.state.lock().statuses = statuses.into();
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = delay;
        self
    }

    pub fn assign_gid(&self, gid: &str) {
        self.state.lock().assigned_gid = Some(gid.to_string());
    }

    pub fn set_branch_status(&self, branch_id: &str, status: BranchStatus) {
        self.state
            .lock()
            .branch_statuses
            .insert(branch_id.to_string(), status);
    }

    /// Fail every `op` call for `branch_id` with a non-retryable coordinator error.
    pub fn fail_on(&self, op: &str, branch_id: &str) {
        self.state
            .lock()
            .failures
            .insert((op.to_string(), branch_id.to_string()));
    }

    /// Fail the next `times` calls of `op` for `branch_id` with a transport error.
    pub fn fail_transiently(&self, op: &str, branch_id: &str, times: u32) {
        self.state
            .lock()
            .transient
            .insert((op.to_string(), branch_id.to_string()), times);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Gids proposed by the client, one per start attempt.
    pub fn proposed_gids(&self) -> Vec<String> {
        self.state.lock().proposed_gids.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Highest number of calls that were in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn record(
        &self,
        cancel: &CancellationToken,
        op: &str,
        branch_id: &str,
        call: Call,
    ) -> Result<()> {
        self.state.lock().calls.push(call);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock();
        let waited = cancellable(cancel, async {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(())
        })
        .await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        waited?;

        let key = (op.to_string(), branch_id.to_string());
        let mut state = self.state.lock();
        if state.failures.contains(&key) {
            return Err(TransactionError::application(
                ErrorCode::InvalidRequest,
                format!("injected {} failure", op),
            ));
        }
        if let Some(remaining) = state.transient.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransactionError::Transport(format!(
                    "injected transient {} failure",
                    op
                )));
            }
        }
        Ok(())
    }

    fn snapshot(&self, gid: &str) -> TransactionInfo {
        let mut state = self.state.lock();
        let status = if state.statuses.len() > 1 {
            state.statuses.pop_front()
        } else {
            state.statuses.front().cloned()
        }
        .unwrap_or(TransactionStatus::Submitted);

        let branches = state
            .branches
            .iter()
            .map(|b| match state.branch_statuses.get(&b.branch_id) {
                Some(status) => b.clone().with_status(status.clone()),
                None => b.clone(),
            })
            .collect();

        TransactionInfo {
            gid: gid.to_string(),
            mode: state.mode.unwrap_or(TransactionMode::Saga),
            status,
            payload: Vec::new(),
            branches,
            created_unix: 0,
            updated_unix: 0,
        }
    }
}

#[async_trait]
impl CoordinatorGateway for StubCoordinator {
    async fn start_global(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        mode: TransactionMode,
        payload: &[u8],
    ) -> Result<String> {
        let call = Call::Start {
            mode,
            payload: payload.to_vec(),
        };
        self.state.lock().proposed_gids.push(gid.to_string());
        self.record(cancel, "start", "", call).await?;

        let mut state = self.state.lock();
        state.mode = Some(mode);
        Ok(state.assigned_gid.clone().unwrap_or_else(|| gid.to_string()))
    }

    async fn add_branch(
        &self,
        cancel: &CancellationToken,
        _gid: &str,
        branch_id: &str,
        action: &str,
    ) -> Result<()> {
        let call = Call::AddBranch {
            branch_id: branch_id.to_string(),
            action: action.to_string(),
        };
        self.record(cancel, "add_branch", branch_id, call).await?;
        self.state.lock().branches.push(Branch::new(branch_id, action));
        Ok(())
    }

    async fn submit(&self, cancel: &CancellationToken, _gid: &str) -> Result<()> {
        self.record(cancel, "submit", "", Call::Submit).await
    }

    async fn abort(&self, cancel: &CancellationToken, _gid: &str) -> Result<()> {
        self.record(cancel, "abort", "", Call::Abort).await
    }

    async fn try_branch(
        &self,
        cancel: &CancellationToken,
        _gid: &str,
        branch_id: &str,
        action: &str,
        payload: &[u8],
    ) -> Result<()> {
        let call = Call::Try {
            branch_id: branch_id.to_string(),
            payload: payload.to_vec(),
        };
        self.record(cancel, "try", branch_id, call).await?;
        self.state.lock().branches.push(Branch::new(branch_id, action));
        Ok(())
    }

    async fn confirm_branch(
        &self,
        cancel: &CancellationToken,
        _gid: &str,
        branch_id: &str,
    ) -> Result<()> {
        let call = Call::Confirm(branch_id.to_string());
        self.record(cancel, "confirm", branch_id, call).await
    }

    async fn cancel_branch(
        &self,
        cancel: &CancellationToken,
        _gid: &str,
        branch_id: &str,
    ) -> Result<()> {
        let call = Call::Cancel(branch_id.to_string());
        self.record(cancel, "cancel", branch_id, call).await
    }

    async fn branch_succeed(
        &self,
        cancel: &CancellationToken,
        _gid: &str,
        branch_id: &str,
    ) -> Result<()> {
        let call = Call::BranchSucceed(branch_id.to_string());
        self.record(cancel, "branch_succeed", branch_id, call).await
    }

    async fn branch_fail(
        &self,
        cancel: &CancellationToken,
        _gid: &str,
        branch_id: &str,
    ) -> Result<()> {
        let call = Call::BranchFail(branch_id.to_string());
        self.record(cancel, "branch_fail", branch_id, call).await
    }

    async fn get_transaction(
        &self,
        cancel: &CancellationToken,
        gid: &str,
    ) -> Result<TransactionInfo> {
        self.record(cancel, "get", "", Call::Get).await?;
        Ok(self.snapshot(gid))
    }

    async fn list_transactions(
        &self,
        cancel: &CancellationToken,
        _limit: u32,
        _offset: u32,
        _status: Option<&TransactionStatus>,
    ) -> Result<Vec<TransactionInfo>> {
        self.record(cancel, "list", "", Call::List).await?;
        Ok(Vec::new())
    }

    async fn health(&self, cancel: &CancellationToken) -> Result<HealthStatus> {
        self.record(cancel, "health", "", Call::Health).await?;
        Ok(HealthStatus {
            status: "healthy".to_string(),
            timestamp: None,
        })
    }

    async fn metrics(&self, cancel: &CancellationToken) -> Result<String> {
        self.record(cancel, "metrics", "", Call::Metrics).await?;
        Ok("dtx_transactions_total 0\n".to_string())
    }
}

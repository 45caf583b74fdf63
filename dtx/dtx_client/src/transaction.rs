//! Handle to one live global transaction
//!
//! A [`TransactionHandle`] is created by
//! [`TransactionClient::start_transaction`](crate::TransactionClient::start_transaction)
//! and exposes the phase operations of that transaction. Every failure is
//! returned with the phase and target it happened in.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Phase, Result, TransactionError};
use crate::gateway::CoordinatorGateway;
use crate::model::{Branch, BranchStatus, TransactionInfo, TransactionMode};

/// A started global transaction.
///
/// The branch list is a local record of what this handle registered; the
/// coordinator's view is available through [`info`](Self::info).
pub struct TransactionHandle {
    gateway: Arc<dyn CoordinatorGateway>,
    gid: String,
    mode: TransactionMode,
    payload: Vec<u8>,
    branches: Mutex<Vec<Branch>>,
}

impl std::fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("gid", &self.gid)
            .field("mode", &self.mode)
            .field("branches", &self.branches.lock().len())
            .finish()
    }
}

fn branch_target(branch_id: &str) -> String {
    format!("branch {}", branch_id)
}

impl TransactionHandle {
    pub(crate) fn new(
        gateway: Arc<dyn CoordinatorGateway>,
        gid: String,
        mode: TransactionMode,
        payload: Vec<u8>,
    ) -> Self {
        TransactionHandle {
            gateway,
            gid,
            mode,
            payload,
            branches: Mutex::new(Vec::new()),
        }
    }

    pub fn gid(&self) -> &str {
        &self.gid
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Snapshot of the branches registered through this handle, in order.
    pub fn branches(&self) -> Vec<Branch> {
        self.branches.lock().clone()
    }

    fn transaction_target(&self) -> String {
        format!("transaction {}", self.gid)
    }

    /// Register a branch. The local list only grows when the coordinator accepts it.
    pub async fn add_branch(
        &self,
        cancel: &CancellationToken,
        branch_id: &str,
        action: &str,
    ) -> Result<()> {
        self.gateway
            .add_branch(cancel, &self.gid, branch_id, action)
            .await
            .map_err(|e| TransactionError::phase(Phase::AddBranch, branch_target(branch_id), e))?;

        debug!(gid = %self.gid, branch_id, "branch registered");
        self.branches.lock().push(Branch::new(branch_id, action));
        Ok(())
    }

    pub async fn submit(&self, cancel: &CancellationToken) -> Result<()> {
        self.gateway
            .submit(cancel, &self.gid)
            .await
            .map_err(|e| TransactionError::phase(Phase::Submit, self.transaction_target(), e))?;
        info!(gid = %self.gid, "transaction submitted");
        Ok(())
    }

    pub async fn abort(&self, cancel: &CancellationToken) -> Result<()> {
        self.gateway
            .abort(cancel, &self.gid)
            .await
            .map_err(|e| TransactionError::phase(Phase::Abort, self.transaction_target(), e))?;
        info!(gid = %self.gid, "transaction aborted");
        Ok(())
    }

    /// TCC Try. A successful Try also registers the branch locally.
    pub async fn try_branch(
        &self,
        cancel: &CancellationToken,
        branch_id: &str,
        action: &str,
        payload: &[u8],
    ) -> Result<()> {
        self.gateway
            .try_branch(cancel, &self.gid, branch_id, action, payload)
            .await
            .map_err(|e| TransactionError::phase(Phase::Try, branch_target(branch_id), e))?;

        debug!(gid = %self.gid, branch_id, "try succeeded");
        self.branches
            .lock()
            .push(Branch::new(branch_id, action).with_status(BranchStatus::Prepared));
        Ok(())
    }

    pub async fn confirm_branch(&self, cancel: &CancellationToken, branch_id: &str) -> Result<()> {
        self.gateway
            .confirm_branch(cancel, &self.gid, branch_id)
            .await
            .map_err(|e| TransactionError::phase(Phase::Confirm, branch_target(branch_id), e))?;
        self.set_branch_status(branch_id, BranchStatus::Succeeded);
        Ok(())
    }

    pub async fn cancel_branch(&self, cancel: &CancellationToken, branch_id: &str) -> Result<()> {
        self.gateway
            .cancel_branch(cancel, &self.gid, branch_id)
            .await
            .map_err(|e| TransactionError::phase(Phase::Cancel, branch_target(branch_id), e))
    }

    /// Report a branch as succeeded to the coordinator.
    pub async fn branch_succeed(&self, cancel: &CancellationToken, branch_id: &str) -> Result<()> {
        self.gateway
            .branch_succeed(cancel, &self.gid, branch_id)
            .await
            .map_err(|e| {
                TransactionError::phase(Phase::BranchSucceed, branch_target(branch_id), e)
            })?;
        self.set_branch_status(branch_id, BranchStatus::Succeeded);
        Ok(())
    }

    /// Report a branch as failed to the coordinator.
    pub async fn branch_fail(&self, cancel: &CancellationToken, branch_id: &str) -> Result<()> {
        self.gateway
            .branch_fail(cancel, &self.gid, branch_id)
            .await
            .map_err(|e| TransactionError::phase(Phase::BranchFail, branch_target(branch_id), e))?;
        self.set_branch_status(branch_id, BranchStatus::Failed);
        Ok(())
    }

    /// Fetch the coordinator's current view of this transaction.
    pub async fn info(&self, cancel: &CancellationToken) -> Result<TransactionInfo> {
        self.gateway
            .get_transaction(cancel, &self.gid)
            .await
            .map_err(|e| TransactionError::phase(Phase::Query, self.transaction_target(), e))
    }

    fn set_branch_status(&self, branch_id: &str, status: BranchStatus) {
        let mut branches = self.branches.lock();
        if let Some(branch) = branches.iter_mut().find(|b| b.branch_id == branch_id) {
            branch.status = Some(status);
        }
    }
}

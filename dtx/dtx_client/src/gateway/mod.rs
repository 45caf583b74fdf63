//! Coordinator gateway
//!
//! [`CoordinatorGateway`] is the seam between the orchestration logic and
//! the remote coordinator. [`HttpGateway`] speaks the coordinator's JSON API,
//! [`GrpcGateway`] its gRPC service; tests plug in scripted implementations.

pub mod grpc;
pub mod http;
pub mod selector;

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TransactionError};
use crate::model::{HealthStatus, TransactionInfo, TransactionMode, TransactionStatus};

pub use grpc::GrpcGateway;
pub use http::HttpGateway;
pub use selector::EndpointSelector;

/// Remote operations offered by a transaction coordinator.
///
/// Every method takes the caller's cancellation token and must return
/// [`TransactionError::Cancelled`] once it fires.
#[async_trait]
pub trait CoordinatorGateway: Send + Sync {
    /// Create a global transaction. Returns the gid the coordinator assigned,
    /// which may differ from the proposed one.
    async fn start_global(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        mode: TransactionMode,
        payload: &[u8],
    ) -> Result<String>;

    async fn add_branch(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
        action: &str,
    ) -> Result<()>;

    async fn submit(&self, cancel: &CancellationToken, gid: &str) -> Result<()>;

    async fn abort(&self, cancel: &CancellationToken, gid: &str) -> Result<()>;

    /// TCC Try. Also registers the branch with the coordinator.
    async fn try_branch(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
        action: &str,
        payload: &[u8],
    ) -> Result<()>;

    async fn confirm_branch(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
    ) -> Result<()>;

    async fn cancel_branch(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
    ) -> Result<()>;

    async fn branch_succeed(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
    ) -> Result<()>;

    async fn branch_fail(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
    ) -> Result<()>;

    async fn get_transaction(
        &self,
        cancel: &CancellationToken,
        gid: &str,
    ) -> Result<TransactionInfo>;

    /// List transactions. A zero `limit` or `offset` and a `None` status are
    /// left to the coordinator's defaults.
    async fn list_transactions(
        &self,
        cancel: &CancellationToken,
        limit: u32,
        offset: u32,
        status: Option<&TransactionStatus>,
    ) -> Result<Vec<TransactionInfo>>;

    async fn health(&self, cancel: &CancellationToken) -> Result<HealthStatus>;

    /// Raw metrics exposition text.
    async fn metrics(&self, cancel: &CancellationToken) -> Result<String>;
}

/// Race `fut` against `cancel`.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransactionError::Cancelled),
        result = fut => result,
    }
}

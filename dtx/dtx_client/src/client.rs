use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::config::{ClientConfig, TransportKind};
use crate::error::{Phase, Result, TransactionError};
use crate::gateway::{CoordinatorGateway, GrpcGateway, HttpGateway};
use crate::model::{HealthStatus, TransactionInfo, TransactionMode, TransactionStatus};
use crate::transaction::TransactionHandle;

/// Entry point for talking to a transaction coordinator.
///
/// Cheap to share behind an `Arc`; orchestrators hold one and start a new
/// transaction per execution.
pub struct TransactionClient {
    gateway: Arc<dyn CoordinatorGateway>,
    config: ClientConfig,
}

impl std::fmt::Debug for TransactionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TransactionClient {
    /// Create a client over the transport named in `config`. A gRPC client
    /// must be created inside a Tokio runtime.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let gateway: Arc<dyn CoordinatorGateway> = match config.transport {
            TransportKind::Http => Arc::new(HttpGateway::new(&config)?),
            TransportKind::Grpc => Arc::new(GrpcGateway::new(&config)?),
        };
        Ok(TransactionClient { gateway, config })
    }

    /// Create a client over any gateway implementation.
    pub fn with_gateway(gateway: Arc<dyn CoordinatorGateway>) -> Self {
        TransactionClient {
            gateway,
            config: ClientConfig::default(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<dyn CoordinatorGateway> {
        &self.gateway
    }

    /// A fresh gid to propose to the coordinator.
    pub fn generate_gid() -> String {
        Uuid::new_v4().to_string()
    }

    /// Start a global transaction with a freshly generated gid. The gid the
    /// coordinator returns is the one the handle uses.
    pub async fn start_transaction(
        &self,
        cancel: &CancellationToken,
        mode: TransactionMode,
        payload: Vec<u8>,
    ) -> Result<TransactionHandle> {
        self.start_transaction_with_gid(cancel, &Self::generate_gid(), mode, payload)
            .await
    }

    /// Start a global transaction under a caller-chosen gid. Retrying this
    /// with the same gid cannot create a second transaction on a coordinator
    /// that already accepted the first attempt.
    pub async fn start_transaction_with_gid(
        &self,
        cancel: &CancellationToken,
        proposed: &str,
        mode: TransactionMode,
        payload: Vec<u8>,
    ) -> Result<TransactionHandle> {
        let gid = self
            .gateway
            .start_global(cancel, proposed, mode, &payload)
            .await
            .map_err(|e| {
                TransactionError::phase(Phase::Start, format!("transaction {}", proposed), e)
            })?;

        let gid = if gid.is_empty() {
            proposed.to_string()
        } else {
            gid
        };
        info!(gid = %gid, mode = %mode, "transaction started");
        Ok(TransactionHandle::new(
            self.gateway.clone(),
            gid,
            mode,
            payload,
        ))
    }

    pub async fn get_transaction(
        &self,
        cancel: &CancellationToken,
        gid: &str,
    ) -> Result<TransactionInfo> {
        self.gateway.get_transaction(cancel, gid).await
    }

    pub async fn list_transactions(
        &self,
        cancel: &CancellationToken,
        limit: u32,
        offset: u32,
        status: Option<&TransactionStatus>,
    ) -> Result<Vec<TransactionInfo>> {
        self.gateway
            .list_transactions(cancel, limit, offset, status)
            .await
    }

    pub async fn health(&self, cancel: &CancellationToken) -> Result<HealthStatus> {
        self.gateway.health(cancel).await
    }

    pub async fn metrics(&self, cancel: &CancellationToken) -> Result<String> {
        self.gateway.metrics(cancel).await
    }
}

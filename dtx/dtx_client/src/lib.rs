//! DTX Client - Saga and TCC orchestration against a remote transaction coordinator
//!
//! This crate drives distributed transactions from the caller's side. The
//! coordinator owns the transaction state; the client starts transactions,
//! registers branches, runs the Try/Confirm/Cancel phases and waits for the
//! outcome.
//!
//! # Components
//!
//! - [`TransactionClient`] and [`TransactionHandle`]: start a global transaction
//!   and issue its phase calls
//! - [`SagaOrchestrator`]: register branches, submit, poll until the Saga commits
//!   or aborts, and optionally compensate failed steps
//! - [`TccOrchestrator`]: Try then Confirm every branch, cancelling all of them
//!   on failure
//! - [`resilience`]: retry with exponential backoff and a circuit breaker, applied
//!   to every remote call an orchestrator makes
//! - [`gateway`]: the coordinator seam and its HTTP and gRPC implementations
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dtx_client::{ClientConfig, ExecutionOptions, SagaOrchestrator, SagaWorkflow, TransactionClient};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> dtx_client::Result<()> {
//! let client = Arc::new(TransactionClient::new(ClientConfig::default())?);
//! let saga = SagaOrchestrator::new(client);
//!
//! let mut workflow = SagaWorkflow::default();
//! workflow
//!     .add_step("reserve", "http://inventory/reserve", "http://inventory/release")
//!     .add_step("charge", "http://payment/charge", "http://payment/refund");
//!
//! let cancel = CancellationToken::new();
//! let gid = saga
//!     .execute(&cancel, &workflow, br#"{"order_id":"1"}"#, &ExecutionOptions::default())
//!     .await?;
//! println!("committed {}", gid);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod patterns;
pub mod resilience;
pub mod transaction;
pub mod utils;

pub use client::TransactionClient;
pub use config::{
    CircuitBreakerConfig, ClientConfig, CompensationPolicy, ExecutionOptions, RetryConfig,
    TransportKind,
};
pub use error::{ErrorCode, Phase, Result, TransactionError};
pub use gateway::{CoordinatorGateway, EndpointSelector, GrpcGateway, HttpGateway};
pub use model::{
    Branch, BranchStatus, HealthStatus, TransactionInfo, TransactionMode, TransactionStatus,
};
pub use patterns::{
    compensation_handler, CompensationHandler, SagaOrchestrator, SagaStep, SagaWorkflow,
    TccOrchestrator, TccStep, TccWorkflow,
};
pub use resilience::{CircuitBreaker, CircuitState, Resilience, RetryExecutor};
pub use transaction::TransactionHandle;

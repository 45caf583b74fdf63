//! Transaction data model shared by the gateway, the handle and the orchestrators

pub mod transaction;

pub use transaction::{
    Branch, BranchStatus, HealthStatus, TransactionInfo, TransactionMode, TransactionStatus,
};

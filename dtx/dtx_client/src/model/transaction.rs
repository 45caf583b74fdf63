use crate::utils::serialization::base64_bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction pattern, fixed when the transaction is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionMode {
    /// Each branch runs its action directly; failures are undone by compensation
    Saga,

    /// Each branch reserves in Try, finalises in Confirm, releases in Cancel
    Tcc,
}

impl TransactionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Saga => "saga",
            Self::Tcc => "tcc",
        }
    }
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global transaction status as reported by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionStatus {
    /// Accepted and still executing
    Submitted,

    /// All branches succeeded
    Committed,

    /// The transaction was rolled back
    Aborted,

    /// A status this client does not model
    Other(String),
}

impl TransactionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Committed => "COMMITTED",
            Self::Aborted => "ABORTED",
            Self::Other(status) => status,
        }
    }

    /// Whether the coordinator will never move the transaction out of this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

impl From<String> for TransactionStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "SUBMITTED" => Self::Submitted,
            "COMMITTED" => Self::Committed,
            "ABORTED" => Self::Aborted,
            _ => Self::Other(status),
        }
    }
}

impl From<TransactionStatus> for String {
    fn from(status: TransactionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Branch status as last observed at the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BranchStatus {
    Prepared,
    Succeeded,
    Failed,
    Other(String),
}

impl BranchStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Prepared => "PREPARED",
            Self::Succeeded => "SUCCEED",
            Self::Failed => "FAILED",
            Self::Other(status) => status,
        }
    }
}

impl From<String> for BranchStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "PREPARED" => Self::Prepared,
            "SUCCEED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            _ => Self::Other(status),
        }
    }
}

impl From<BranchStatus> for String {
    fn from(status: BranchStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One participant's piece of a global transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Caller-supplied branch identifier, unique within the transaction
    pub branch_id: String,

    /// Target the coordinator invokes for this branch
    #[serde(default)]
    pub action: String,

    /// Last observed status; absent for branches known only locally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BranchStatus>,
}

impl Branch {
    pub fn new(branch_id: &str, action: &str) -> Self {
        Branch {
            branch_id: branch_id.to_string(),
            action: action.to_string(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: BranchStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == Some(BranchStatus::Failed)
    }
}

/// Coordinator-side snapshot of a global transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub gid: String,
    pub mode: TransactionMode,
    pub status: TransactionStatus,
    #[serde(default, with = "base64_bytes")]
    pub payload: Vec<u8>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub created_unix: i64,
    #[serde(default)]
    pub updated_unix: i64,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Branch>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Branch>>::deserialize(deserializer)?.unwrap_or_default())
}

impl TransactionInfo {
    /// Look up a branch by id.
    pub fn branch(&self, branch_id: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.branch_id == branch_id)
    }

    /// Whether the coordinator reports the given branch as failed.
    pub fn is_branch_failed(&self, branch_id: &str) -> bool {
        self.branches
            .iter()
            .any(|b| b.branch_id == branch_id && b.is_failed())
    }

    /// Ids of every branch the coordinator reports as failed, in reported order.
    pub fn failed_branch_ids(&self) -> Vec<String> {
        self.branches
            .iter()
            .filter(|b| b.is_failed())
            .map(|b| b.branch_id.clone())
            .collect()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.created_unix, 0).single()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.updated_unix, 0).single()
    }
}

/// Coordinator health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

//! Error types for the transaction client.
//!
//! Every fallible operation in this crate returns [`TransactionError`]. The
//! variants follow the failure classes a caller has to tell apart: transport
//! failures, structured coordinator failures, local validation failures,
//! cancellation, and the cleanup failures collected while unwinding a
//! transaction.

use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TransactionError>;

/// Error codes reported by the coordinator in its structured error body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The request was malformed or referenced an invalid state.
    InvalidRequest,

    /// The global transaction does not exist.
    TransactionNotFound,

    /// The branch does not exist within the transaction.
    BranchNotFound,

    /// The coordinator failed internally.
    ServerError,

    /// The coordinator or a branch service timed out.
    Timeout,

    /// The coordinator could not reach a branch service.
    NetworkError,

    /// The coordinator is temporarily unable to serve requests.
    Unavailable,

    /// Any code this client does not know about.
    Unknown(String),
}

impl ErrorCode {
    /// Parse a wire code. Unrecognised codes are preserved as [`ErrorCode::Unknown`].
    pub fn parse(code: &str) -> Self {
        match code {
            "INVALID_REQUEST" => Self::InvalidRequest,
            "TRANSACTION_NOT_FOUND" => Self::TransactionNotFound,
            "BRANCH_NOT_FOUND" => Self::BranchNotFound,
            "SERVER_ERROR" => Self::ServerError,
            "TIMEOUT" => Self::Timeout,
            "NETWORK_ERROR" => Self::NetworkError,
            "UNAVAILABLE" => Self::Unavailable,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Derive a code from an HTTP status when the reply carried no usable error body.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            404 => Self::TransactionNotFound,
            408 | 504 => Self::Timeout,
            503 => Self::Unavailable,
            500..=599 => Self::ServerError,
            other => Self::Unknown(format!("HTTP_{}", other)),
        }
    }

    /// Wire representation of the code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            Self::BranchNotFound => "BRANCH_NOT_FOUND",
            Self::ServerError => "SERVER_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Unavailable => "UNAVAILABLE",
            Self::Unknown(code) => code,
        }
    }

    /// Whether a call that failed with this code may be attempted again.
    ///
    /// The set is closed: codes this client does not recognise are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ServerError | Self::Timeout | Self::NetworkError | Self::Unavailable
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The phase of a transaction a remote call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Start,
    AddBranch,
    Submit,
    Abort,
    Try,
    Confirm,
    Cancel,
    BranchSucceed,
    BranchFail,
    Query,
    Compensate,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::AddBranch => "add branch",
            Self::Submit => "submit",
            Self::Abort => "abort",
            Self::Try => "try",
            Self::Confirm => "confirm",
            Self::Cancel => "cancel",
            Self::BranchSucceed => "branch succeed",
            Self::BranchFail => "branch fail",
            Self::Query => "query",
            Self::Compensate => "compensation",
        };
        f.write_str(name)
    }
}

/// Error type for every client, gateway and orchestrator operation.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The request never produced a coordinator reply (connection refused,
    /// transport timeout, broken body).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The HTTP client failed before a coordinator reply was read. The
    /// underlying error stays reachable through `source()`.
    #[error("Transport error: {0}")]
    Http(#[source] reqwest::Error),

    /// The gRPC channel failed before a coordinator reply was read.
    #[error("Transport error: {}", .0.message())]
    Rpc(#[source] tonic::Status),

    /// The coordinator answered with a structured failure.
    #[error("Coordinator error [{code}]: {message}")]
    Application {
        code: ErrorCode,
        message: String,
        details: Option<String>,
    },

    /// A workflow, option set or argument was rejected before any remote call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The caller's cancellation token fired.
    #[error("Operation cancelled")]
    Cancelled,

    /// The execution deadline elapsed.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The circuit breaker rejected the call without attempting it.
    #[error("Circuit breaker is open")]
    CircuitOpen,

    /// Every allowed attempt failed; carries the last failure.
    #[error("Operation failed after {retries} retries: {source}")]
    RetriesExhausted {
        retries: u32,
        #[source]
        source: Box<TransactionError>,
    },

    /// A phase call failed; names the phase and the branch or transaction it targeted.
    #[error("{phase} failed for {target}: {source}")]
    Phase {
        phase: Phase,
        target: String,
        #[source]
        source: Box<TransactionError>,
    },

    /// The coordinator reported the Saga as aborted.
    #[error("Saga transaction {gid} aborted")]
    Aborted { gid: String },

    /// The coordinator reported a status this client cannot act on.
    #[error("Unexpected transaction status: {0}")]
    UnexpectedStatus(String),

    /// The primary failure plus every cleanup failure collected while unwinding.
    #[error("{cause}; {} compensation call(s) failed: {}", .failures.len(), join_errors(.failures))]
    Compensation {
        cause: Box<TransactionError>,
        failures: Vec<TransactionError>,
    },

    /// A caller-supplied handler reported a failure.
    #[error("{0}")]
    Handler(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_errors(errors: &[TransactionError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl TransactionError {
    /// Attach phase context to a failure. Cancellation passes through untouched
    /// so callers can always recognise it.
    pub fn phase(phase: Phase, target: impl Into<String>, source: TransactionError) -> Self {
        if source.is_cancelled() {
            return source;
        }
        Self::Phase {
            phase,
            target: target.into(),
            source: Box::new(source),
        }
    }

    /// Build an application error from a code and message.
    pub fn application(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Application {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// True when this error, or the failure it wraps, is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Phase { source, .. } | Self::RetriesExhausted { source, .. } => {
                source.is_cancelled()
            }
            _ => false,
        }
    }

    /// Retry eligibility. Transport failures and transient coordinator codes
    /// are retryable; validation, cancellation, circuit rejection and every
    /// terminal outcome are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Http(_) | Self::Rpc(_) => true,
            Self::Application { code, .. } => code.is_retryable(),
            Self::Phase { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// The coordinator error code, if the failure came from the coordinator.
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            Self::Application { code, .. } => Some(code),
            Self::Phase { source, .. } | Self::RetriesExhausted { source, .. } => source.code(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransactionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Http(err)
        }
    }
}

impl From<serde_json::Error> for TransactionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

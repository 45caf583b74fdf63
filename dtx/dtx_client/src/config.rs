//! Configuration for the client and for orchestrator executions
//!
//! `ClientConfig` describes how to reach the coordinator and is usually loaded
//! from a TOML file. `ExecutionOptions` tunes a single Saga or TCC execution and
//! bundles the retry and circuit-breaker policies applied to its remote calls.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use crate::error::{Result, TransactionError};
use crate::utils::serialization::duration_ms;

/// Environment variable overriding the configured coordinator endpoints
/// (comma-separated base URLs).
pub const ENDPOINT_ENV: &str = "DTX_HTTP_ENDPOINT";

/// Wire protocol used to reach the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Http,
    Grpc,
}

/// Coordinator connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Which of the two endpoint lists the client talks to
    #[serde(default)]
    pub transport: TransportKind,

    /// Base URLs of the coordinator's HTTP API, rotated round-robin
    #[serde(default = "default_http_endpoints")]
    pub http_endpoints: Vec<String>,

    /// Addresses of the coordinator's gRPC service (`host:port`,
    /// `grpc://host:port` or `http://host:port`), rotated round-robin
    #[serde(default = "default_grpc_endpoints")]
    pub grpc_endpoints: Vec<String>,

    /// Timeout for a single request
    #[serde(
        default = "default_request_timeout",
        rename = "request_timeout_ms",
        with = "duration_ms"
    )]
    pub request_timeout: Duration,

    /// Timeout for establishing a connection
    #[serde(
        default = "default_connect_timeout",
        rename = "connect_timeout_ms",
        with = "duration_ms"
    )]
    pub connect_timeout: Duration,

    /// Idle pooled connections kept per host
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,

    /// Bearer token sent with every request
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_http_endpoints() -> Vec<String> {
    vec!["http://localhost:36789".to_string()]
}

fn default_grpc_endpoints() -> Vec<String> {
    vec!["localhost:36790".to_string()]
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_idle_per_host() -> usize {
    100
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            http_endpoints: default_http_endpoints(),
            grpc_endpoints: default_grpc_endpoints(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            max_idle_per_host: default_max_idle_per_host(),
            auth_token: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file, falling back to defaults when no
    /// path is given or the file does not exist. The endpoint environment
    /// override is applied last.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = ClientConfig::default();

        if let Some(path) = path {
            info!("Loading client configuration from {}", path.display());

            if !fs::try_exists(path).await.unwrap_or(false) {
                warn!("Configuration file not found: {}", path.display());
            } else {
                let content = fs::read_to_string(path).await.map_err(|e| {
                    TransactionError::Config(format!(
                        "failed to read {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                config = Self::from_toml(&content)?;
            }
        }

        config = config.with_endpoint_override(std::env::var(ENDPOINT_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| TransactionError::Config(format!("failed to parse configuration: {}", e)))
    }

    /// Replace the endpoint list with a comma-separated override, if one is given.
    pub fn with_endpoint_override(mut self, value: Option<String>) -> Self {
        if let Some(value) = value {
            let endpoints: Vec<String> = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !endpoints.is_empty() {
                self.http_endpoints = endpoints;
            }
        }
        self
    }

    /// Endpoints of the configured transport.
    pub fn endpoints(&self) -> &[String] {
        match self.transport {
            TransportKind::Http => &self.http_endpoints,
            TransportKind::Grpc => &self.grpc_endpoints,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoints().is_empty() {
            return Err(TransactionError::Config(
                "at least one coordinator endpoint is required".to_string(),
            ));
        }
        if self.endpoints().iter().any(|e| e.trim().is_empty()) {
            return Err(TransactionError::Config(
                "coordinator endpoint cannot be empty".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(TransactionError::Config(
                "request timeout cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry
    #[serde(
        default = "default_retry_interval",
        rename = "retry_interval_ms",
        with = "duration_ms"
    )]
    pub retry_interval: Duration,

    /// Multiplier applied per attempt
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_interval: default_retry_interval(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Time after the last failure before a trial call is let through
    #[serde(
        default = "default_recovery_timeout",
        rename = "recovery_timeout_ms",
        with = "duration_ms"
    )]
    pub recovery_timeout: Duration,

    /// Trial calls allowed in flight while half-open
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_half_open_max_calls() -> u32 {
    3
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout: default_recovery_timeout(),
            half_open_max_calls: default_half_open_max_calls(),
        }
    }
}

/// What a Saga execution does when the coordinator reports it aborted and the
/// caller supplied no compensation handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompensationPolicy {
    /// The coordinator runs the registered compensations; the client only reports
    #[default]
    CoordinatorDriven,

    /// Executions without a compensation handler are rejected up front
    RequireHandler,
}

/// Options for a single orchestrator execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Overall deadline for the execution
    #[serde(default = "default_timeout", rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,

    /// Retry policy for remote calls; `None` disables retries
    #[serde(default = "default_retry")]
    pub retry: Option<RetryConfig>,

    /// Circuit breaker for remote calls; `None` disables it
    #[serde(default = "default_circuit_breaker")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,

    /// Fan TCC phases out concurrently instead of one branch at a time
    #[serde(default = "default_parallel_branches")]
    pub parallel_branches: bool,

    /// Upper bound on concurrently in-flight branch calls
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Interval between Saga status polls
    #[serde(
        default = "default_poll_interval",
        rename = "poll_interval_ms",
        with = "duration_ms"
    )]
    pub poll_interval: Duration,

    #[serde(default)]
    pub compensation_policy: CompensationPolicy,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retry() -> Option<RetryConfig> {
    Some(RetryConfig::default())
}

fn default_circuit_breaker() -> Option<CircuitBreakerConfig> {
    Some(CircuitBreakerConfig::default())
}

fn default_parallel_branches() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    10
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retry: default_retry(),
            circuit_breaker: default_circuit_breaker(),
            parallel_branches: default_parallel_branches(),
            max_concurrency: default_max_concurrency(),
            poll_interval: default_poll_interval(),
            compensation_policy: CompensationPolicy::default(),
        }
    }
}

impl ExecutionOptions {
    /// Options with no retries and no circuit breaker.
    pub fn without_resilience() -> Self {
        Self {
            retry: None,
            circuit_breaker: None,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: Option<RetryConfig>) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, breaker: Option<CircuitBreakerConfig>) -> Self {
        self.circuit_breaker = breaker;
        self
    }

    pub fn with_parallel_branches(mut self, parallel: bool) -> Self {
        self.parallel_branches = parallel;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_compensation_policy(mut self, policy: CompensationPolicy) -> Self {
        self.compensation_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(TransactionError::Validation(
                "execution timeout cannot be zero".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(TransactionError::Validation(
                "poll interval cannot be zero".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(TransactionError::Validation(
                "max concurrency must be at least 1".to_string(),
            ));
        }
        if let Some(retry) = &self.retry {
            if !retry.backoff_factor.is_finite() || retry.backoff_factor <= 0.0 {
                return Err(TransactionError::Validation(format!(
                    "backoff factor must be a positive number, got {}",
                    retry.backoff_factor
                )));
            }
        }
        Ok(())
    }
}

//! Workflow file commands
//!
//! A workflow file is TOML describing either a Saga or a TCC transaction:
//!
//! ```toml
//! kind = "saga"
//! payload = '{"order_id":"1"}'
//!
//! [options]
//! timeout_ms = 60000
//!
//! [[steps]]
//! branch_id = "reserve"
//! action = "http://inventory/reserve"
//! compensate = "http://inventory/release"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use dtx_client::{
    CompensationPolicy, ExecutionOptions, SagaOrchestrator, SagaStep, SagaWorkflow,
    TccOrchestrator, TccStep, TccWorkflow, TransactionClient,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Arguments for the validate command
#[derive(Args)]
pub struct ValidateArgs {
    /// Workflow file to check
    pub file: PathBuf,
}

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Workflow file to run
    pub file: PathBuf,

    /// Business payload; replaces the payload in the file
    #[clap(long)]
    pub payload: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WorkflowFile {
    Saga {
        #[serde(default)]
        payload: Option<String>,
        steps: Vec<SagaStep>,
        #[serde(default)]
        options: ExecutionOptions,
    },
    Tcc {
        #[serde(default)]
        payload: Option<String>,
        /// Appended to the Try payload of every branch
        #[serde(default)]
        barrier: Option<String>,
        steps: Vec<TccStep>,
        #[serde(default)]
        options: ExecutionOptions,
    },
}

impl WorkflowFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read workflow file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid workflow file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowFile::Saga { .. } => "saga",
            WorkflowFile::Tcc { .. } => "tcc",
        }
    }

    pub fn step_count(&self) -> usize {
        match self {
            WorkflowFile::Saga { steps, .. } => steps.len(),
            WorkflowFile::Tcc { steps, .. } => steps.len(),
        }
    }

    /// Offline checks: workflow shape and execution options.
    pub fn validate(&self) -> Result<()> {
        match self {
            WorkflowFile::Saga { steps, options, .. } => {
                SagaWorkflow::new(steps.clone()).validate()?;
                options.validate()?;
                // No compensation handler can be supplied from the command line.
                if options.compensation_policy == CompensationPolicy::RequireHandler {
                    bail!("compensation_policy = \"require_handler\" cannot be run from the CLI");
                }
            }
            WorkflowFile::Tcc {
                steps,
                options,
                barrier,
                ..
            } => {
                TccWorkflow::new(steps.clone()).validate()?;
                options.validate()?;
                if matches!(barrier.as_deref(), Some("")) {
                    bail!("barrier cannot be empty");
                }
            }
        }
        Ok(())
    }
}

/// Implementation of the validate command
pub fn execute_validate(args: &ValidateArgs) -> Result<()> {
    let workflow = WorkflowFile::load(&args.file)?;
    workflow.validate()?;

    println!(
        "{}: valid {} workflow with {} step(s)",
        args.file.display(),
        workflow.kind(),
        workflow.step_count()
    );
    Ok(())
}

/// Implementation of the run command
pub async fn execute_run(client: TransactionClient, args: &RunArgs) -> Result<()> {
    let workflow = WorkflowFile::load(&args.file)?;
    workflow.validate()?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling transaction");
            trigger.cancel();
        }
    });

    let client = Arc::new(client);
    let gid = match workflow {
        WorkflowFile::Saga {
            payload,
            steps,
            options,
        } => {
            let payload = args.payload.clone().or(payload).unwrap_or_default();
            info!(steps = steps.len(), "Running saga workflow");
            SagaOrchestrator::new(client)
                .execute(&cancel, &SagaWorkflow::new(steps), payload.as_bytes(), &options)
                .await
                .context("saga failed")?
        }
        WorkflowFile::Tcc {
            payload,
            barrier,
            steps,
            options,
        } => {
            let payload = args.payload.clone().or(payload).unwrap_or_default();
            let orchestrator = TccOrchestrator::new(client);
            let workflow = TccWorkflow::new(steps);
            info!(steps = workflow.steps.len(), "Running TCC workflow");
            match barrier {
                Some(barrier) => orchestrator
                    .execute_with_barrier(&cancel, &workflow, payload.as_bytes(), &barrier, &options)
                    .await
                    .context("TCC transaction failed")?,
                None => orchestrator
                    .execute(&cancel, &workflow, payload.as_bytes(), &options)
                    .await
                    .context("TCC transaction failed")?,
            }
        }
    };

    println!("{}", gid);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_saga_file() {
        let workflow = WorkflowFile::parse(
            r#"
            kind = "saga"
            payload = "order-1"

            [options]
            timeout_ms = 5000
            parallel_branches = false

            [[steps]]
            branch_id = "a"
            action = "http://svc/a"
            compensate = "http://svc/a/undo"
            "#,
        )
        .unwrap();

        match &workflow {
            WorkflowFile::Saga {
                payload,
                steps,
                options,
            } => {
                assert_eq!(payload.as_deref(), Some("order-1"));
                assert_eq!(steps[0], SagaStep::new("a", "http://svc/a", "http://svc/a/undo"));
                assert_eq!(options.timeout, Duration::from_secs(5));
                assert!(!options.parallel_branches);
            }
            other => panic!("expected saga, got {:?}", other),
        }
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_parse_tcc_file_with_defaults() {
        let workflow = WorkflowFile::parse(
            r#"
            kind = "tcc"
            barrier = ":b1"

            [[steps]]
            branch_id = "pay"
            try = "http://svc/pay/try"
            confirm = "http://svc/pay/confirm"
            cancel = "http://svc/pay/cancel"
            "#,
        )
        .unwrap();

        assert_eq!(workflow.kind(), "tcc");
        assert_eq!(workflow.step_count(), 1);
        match &workflow {
            WorkflowFile::Tcc { options, .. } => {
                assert_eq!(options, &ExecutionOptions::default())
            }
            other => panic!("expected tcc, got {:?}", other),
        }
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_require_handler_is_rejected() {
        let workflow = WorkflowFile::parse(
            r#"
            kind = "saga"

            [options]
            compensation_policy = "require_handler"

            [[steps]]
            branch_id = "a"
            action = "http://svc/a"
            "#,
        )
        .unwrap();

        assert!(workflow.validate().is_err());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(WorkflowFile::parse("kind = \"xa\"\nsteps = []").is_err());
    }
}

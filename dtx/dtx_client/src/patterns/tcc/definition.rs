use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransactionError};

/// One TCC branch with its three phase targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TccStep {
    pub branch_id: String,

    #[serde(rename = "try")]
    pub try_action: String,

    pub confirm: String,
    pub cancel: String,
}

impl TccStep {
    pub fn new(branch_id: &str, try_action: &str, confirm: &str, cancel: &str) -> Self {
        TccStep {
            branch_id: branch_id.to_string(),
            try_action: try_action.to_string(),
            confirm: confirm.to_string(),
            cancel: cancel.to_string(),
        }
    }
}

/// Ordered list of TCC steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TccWorkflow {
    pub steps: Vec<TccStep>,
}

impl TccWorkflow {
    pub fn new(steps: Vec<TccStep>) -> Self {
        TccWorkflow { steps }
    }

    pub fn add_step(
        &mut self,
        branch_id: &str,
        try_action: &str,
        confirm: &str,
        cancel: &str,
    ) -> &mut Self {
        self.steps
            .push(TccStep::new(branch_id, try_action, confirm, cancel));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(TransactionError::Validation(
                "TCC workflow must have at least one step".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            let missing = if step.branch_id.is_empty() {
                Some("branch ID cannot be empty")
            } else if step.try_action.is_empty() {
                Some("try action cannot be empty")
            } else if step.confirm.is_empty() {
                Some("confirm action cannot be empty")
            } else if step.cancel.is_empty() {
                Some("cancel action cannot be empty")
            } else {
                None
            };
            if let Some(message) = missing {
                return Err(TransactionError::Validation(message.to_string()));
            }

            if !seen.insert(step.branch_id.as_str()) {
                return Err(TransactionError::Validation(format!(
                    "duplicate branch ID: {}",
                    step.branch_id
                )));
            }
        }

        Ok(())
    }
}

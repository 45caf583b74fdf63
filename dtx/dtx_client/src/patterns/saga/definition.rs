use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransactionError};

/// One Saga branch: the action the coordinator runs and the action that undoes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaStep {
    pub branch_id: String,
    pub action: String,

    /// Undo target. Optional: the coordinator may compensate without one.
    #[serde(default)]
    pub compensate: String,
}

impl SagaStep {
    pub fn new(branch_id: &str, action: &str, compensate: &str) -> Self {
        SagaStep {
            branch_id: branch_id.to_string(),
            action: action.to_string(),
            compensate: compensate.to_string(),
        }
    }
}

/// Ordered list of Saga steps; branches are registered in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaWorkflow {
    pub steps: Vec<SagaStep>,
}

impl SagaWorkflow {
    pub fn new(steps: Vec<SagaStep>) -> Self {
        SagaWorkflow { steps }
    }

    pub fn add_step(&mut self, branch_id: &str, action: &str, compensate: &str) -> &mut Self {
        self.steps.push(SagaStep::new(branch_id, action, compensate));
        self
    }

    /// Look up a step by branch id.
    pub fn step(&self, branch_id: &str) -> Option<&SagaStep> {
        self.steps.iter().find(|s| s.branch_id == branch_id)
    }

    /// Check the workflow before any remote call is made.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(TransactionError::Validation(
                "saga workflow must have at least one step".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.branch_id.is_empty() {
                return Err(TransactionError::Validation(
                    "branch ID cannot be empty".to_string(),
                ));
            }
            if step.action.is_empty() {
                return Err(TransactionError::Validation(
                    "action cannot be empty".to_string(),
                ));
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

#[cfg(test)]
mod tests {
    use super::*;

    fn message(workflow: &SagaWorkflow) -> String {
        match workflow.validate() {
            Err(TransactionError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_workflow() {
        let mut workflow = SagaWorkflow::default();
        workflow
            .add_step("reserve", "http://inventory/reserve", "http://inventory/release")
            .add_step("charge", "http://payment/charge", "");

        assert!(workflow.validate().is_ok());
        assert_eq!(
            workflow.step("charge").map(|s| s.action.as_str()),
            Some("http://payment/charge")
        );
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            message(&SagaWorkflow::default()),
            "saga workflow must have at least one step"
        );
        assert_eq!(
            message(&SagaWorkflow::new(vec![SagaStep::new("", "http://a", "")])),
            "branch ID cannot be empty"
        );
        assert_eq!(
            message(&SagaWorkflow::new(vec![SagaStep::new("a", "", "")])),
            "action cannot be empty"
        );
        assert_eq!(
            message(&SagaWorkflow::new(vec![
                SagaStep::new("a", "http://a", ""),
                SagaStep::new("b", "http://b", ""),
                SagaStep::new("a", "http://c", ""),
            ])),
            "duplicate branch ID: a"
        );
    }

    #[test]
    fn test_deserialize_without_compensate() {
        let workflow: SagaWorkflow = toml::from_str(
            r#"
            [[steps]]
            branch_id = "a"
            action = "http://svc/a"
            "#,
        )
        .unwrap();
        assert_eq!(workflow.steps[0].compensate, "");
    }
}

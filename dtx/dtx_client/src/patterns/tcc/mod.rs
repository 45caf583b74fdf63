//! Try-Confirm-Cancel orchestration

pub mod definition;
pub mod orchestrator;

use std::fmt;

pub use definition::{TccStep, TccWorkflow};
pub use orchestrator::TccOrchestrator;

/// The phase a TCC execution is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TccPhase {
    Try,
    Confirm,
    Cancel,
}

impl TccPhase {
    pub(crate) fn as_error_phase(self) -> crate::error::Phase {
        match self {
            Self::Try => crate::error::Phase::Try,
            Self::Confirm => crate::error::Phase::Confirm,
            Self::Cancel => crate::error::Phase::Cancel,
        }
    }
}

impl fmt::Display for TccPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_error_phase(), f)
    }
}

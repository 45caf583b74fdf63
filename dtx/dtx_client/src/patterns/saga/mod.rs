//! Saga orchestration against the coordinator

pub mod definition;
pub mod orchestrator;
pub mod types;

pub use definition::{SagaStep, SagaWorkflow};
pub use orchestrator::SagaOrchestrator;
pub use types::{compensation_handler, CompensationHandler, SagaPhase};

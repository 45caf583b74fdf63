//! Subcommand implementations for the `dtx` binary

pub mod system;
pub mod transaction;
pub mod workflow;

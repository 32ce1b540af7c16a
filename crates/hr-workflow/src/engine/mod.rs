//! Workflow execution engine
//!
//! The engine module provides the `WorkflowEngine`, which starts workflows,
//! moves instances along authorized transitions and answers which actions
//! an employee may take.

mod authorization;
mod error;
mod executor;

pub use error::EngineError;
pub use executor::{EngineConfig, WorkflowEngine};

//! Persistence layer for workflow definitions and execution state
//!
//! This module provides:
//! - [`DefinitionStore`], [`InstanceStore`] and [`RecordStore`] traits
//! - [`UnitOfWork`], the all-or-nothing change set the engine commits
//! - [`InMemoryWorkflowStore`] for dev mode and testing
//! - [`PostgresWorkflowStore`] for production

mod memory;
mod postgres;
mod store;

pub use memory::InMemoryWorkflowStore;
pub use postgres::PostgresWorkflowStore;
pub use store::{
    DefinitionStore, InstanceStore, RecordStore, StoreError, UnitOfWork, WorkflowStore,
};

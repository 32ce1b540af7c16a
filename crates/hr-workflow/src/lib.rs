//! # HR Workflow Engine
//!
//! Executes organization-defined approval workflows for HR requests
//! (leave, missions, ...).
//!
//! ## Features
//!
//! - **Definition graphs**: steps and transitions with optional approver-group guards
//! - **Group authorization**: only members of a transition's group may take it
//! - **Audit trail**: every visit to a step is recorded with actor, outcome and comment
//! - **Atomic commits**: each call persists one unit of work under optimistic concurrency
//! - **Pluggable storage**: PostgreSQL for production, in-memory for dev mode and tests
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowEngine                          │
//! │  (start, advance, available actions, approver resolution)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ UnitOfWork
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │          DefinitionStore + InstanceStore (+ RecordStore)     │
//! │  (PostgreSQL: hr_workflow_instances, step_instances, ...)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use hr_workflow::prelude::*;
//!
//! let store = InMemoryWorkflowStore::new();
//! let demo = seed_demo_data(&store).await?.unwrap();
//! let engine = WorkflowEngine::new(store);
//!
//! let instance = engine.start_workflow(demo.sample_request_id).await?;
//! engine
//!     .advance(instance.id, "approve", demo.hr_manager_id, None)
//!     .await?;
//! ```

pub mod engine;
pub mod model;
pub mod persistence;
pub mod reliability;
pub mod seed;

/// Prelude for common imports
pub mod prelude {
    pub use crate::engine::{EngineConfig, EngineError, WorkflowEngine};
    pub use crate::model::{
        ApproverGroup, Employee, Request, RequestType, Step, StepInstance, StepInstanceStatus,
        StepRole, Transition, WorkflowDefinition, WorkflowInstance, WorkflowInstanceStatus,
    };
    pub use crate::persistence::{
        DefinitionStore, InMemoryWorkflowStore, InstanceStore, PostgresWorkflowStore,
        RecordStore, StoreError, UnitOfWork, WorkflowStore,
    };
    pub use crate::reliability::RetryPolicy;
    pub use crate::seed::{seed_demo_data, DemoData};
}

// Re-export key types at crate root
pub use engine::{EngineConfig, EngineError, WorkflowEngine};
pub use persistence::{
    DefinitionStore, InMemoryWorkflowStore, InstanceStore, PostgresWorkflowStore, RecordStore,
    StoreError, UnitOfWork, WorkflowStore,
};
pub use reliability::RetryPolicy;

//! Domain model
//!
//! - [`WorkflowDefinition`], [`Step`], [`Transition`]: the definition graph
//! - [`WorkflowInstance`], [`StepInstance`]: execution state and audit trail
//! - [`Employee`], [`RequestType`], [`Request`], [`ApproverGroup`]: supporting records

mod definition;
mod instance;
mod records;

pub use definition::{DefinitionError, Step, StepRole, Transition, WorkflowDefinition};
pub use instance::{
    StepClosure, StepInstance, StepInstanceStatus, WorkflowInstance, WorkflowInstanceStatus,
};
pub use records::{ApproverGroup, Employee, Request, RequestType};

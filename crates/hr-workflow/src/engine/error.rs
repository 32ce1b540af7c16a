//! Engine error type

use uuid::Uuid;

use crate::model::WorkflowInstanceStatus;
use crate::persistence::StoreError;

/// Errors from engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No active definition for the request's type
    #[error("no active workflow definition for request type {request_type_id}")]
    DefinitionNotFound { request_type_id: Uuid },

    /// Definition is structurally unusable (missing Start, dangling references, ...)
    #[error("malformed workflow definition: {0}")]
    MalformedDefinition(String),

    #[error("request not found: {0}")]
    RequestNotFound(Uuid),

    #[error("workflow instance not found: {0}")]
    InstanceNotFound(Uuid),

    /// The request already has a workflow instance
    #[error("a workflow has already been started for request {request_id}")]
    AlreadyStarted { request_id: Uuid },

    /// Instance is not Active
    #[error("workflow instance {instance_id} is {status} and cannot be advanced")]
    NotAdvanceable {
        instance_id: Uuid,
        status: WorkflowInstanceStatus,
    },

    /// No transition from the current step carries this action
    #[error("action '{action}' is not available from step '{step}'")]
    NoSuchAction { action: String, step: String },

    /// Matching transitions exist but the actor is in none of their groups
    #[error("employee {actor} is not authorized to perform '{action}'")]
    NotAuthorized { actor: Uuid, action: String },

    /// Another writer changed the instance first; nothing was persisted
    #[error("workflow instance {instance_id} was modified concurrently")]
    ConcurrentModification { instance_id: Uuid },

    #[error("store error: {0}")]
    Store(StoreError),
}

impl EngineError {
    /// Only a lost optimistic-concurrency race is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }

    /// Stable snake_case error kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::DefinitionNotFound { .. } => "definition_not_found",
            Self::MalformedDefinition(_) => "malformed_definition",
            Self::RequestNotFound(_) => "request_not_found",
            Self::InstanceNotFound(_) => "instance_not_found",
            Self::AlreadyStarted { .. } => "already_started",
            Self::NotAdvanceable { .. } => "not_advanceable",
            Self::NoSuchAction { .. } => "no_such_action",
            Self::NotAuthorized { .. } => "not_authorized",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::Store(_) => "store_error",
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConcurrencyConflict { instance_id, .. }
            | StoreError::StepAlreadyClosed { instance_id, .. }
            | StoreError::PendingStepConflict(instance_id) => {
                Self::ConcurrentModification { instance_id }
            }
            StoreError::RequestAlreadyLinked(request_id) => Self::AlreadyStarted { request_id },
            StoreError::RequestNotFound(id) => Self::RequestNotFound(id),
            StoreError::InstanceNotFound(id) => Self::InstanceNotFound(id),
            StoreError::DefinitionNotFound(id) => {
                Self::MalformedDefinition(format!("definition {} does not exist", id))
            }
            StoreError::InvalidDefinition(e) => Self::MalformedDefinition(e.to_string()),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_become_concurrent_modification() {
        let id = Uuid::now_v7();
        let errors = [
            StoreError::ConcurrencyConflict {
                instance_id: id,
                expected: 1,
                actual: 2,
            },
            StoreError::StepAlreadyClosed {
                instance_id: id,
                step_instance_id: Uuid::now_v7(),
            },
            StoreError::PendingStepConflict(id),
        ];

        for e in errors {
            let mapped = EngineError::from(e);
            assert!(mapped.is_retryable());
            assert!(matches!(
                mapped,
                EngineError::ConcurrentModification { instance_id } if instance_id == id
            ));
        }
    }

    #[test]
    fn test_link_race_becomes_already_started() {
        let request_id = Uuid::now_v7();
        let mapped = EngineError::from(StoreError::RequestAlreadyLinked(request_id));
        assert!(!mapped.is_retryable());
        assert_eq!(mapped.code(), "already_started");
    }

    #[test]
    fn test_database_errors_pass_through() {
        let mapped = EngineError::from(StoreError::Database("connection reset".into()));
        assert!(matches!(mapped, EngineError::Store(StoreError::Database(_))));
        assert!(!mapped.is_retryable());
        assert_eq!(mapped.code(), "store_error");
    }
}

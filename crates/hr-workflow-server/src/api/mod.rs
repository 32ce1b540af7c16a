// HTTP API

pub mod workflow;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use hr_workflow::model::{StepInstanceStatus, WorkflowInstanceStatus};
use hr_workflow::EngineError;

use crate::service::{AvailableAction, InstanceView, StepVisitView};

/// Standard error response for API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message describing what went wrong.
    pub error: String,
    /// Stable, machine-readable error kind (e.g. "not_authorized").
    #[schema(example = "not_authorized")]
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Response wrapper for list endpoints.
/// All list endpoints return responses wrapped in a `data` field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListResponse<T> {
    /// Array of items returned by the list operation.
    pub data: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

/// Error returned by handlers
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    NotFound { message: String, code: &'static str },
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Engine(e) => match e {
                EngineError::RequestNotFound(_) | EngineError::InstanceNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                EngineError::NotAuthorized { .. } => StatusCode::FORBIDDEN,
                EngineError::NotAdvanceable { .. }
                | EngineError::AlreadyStarted { .. }
                | EngineError::ConcurrentModification { .. } => StatusCode::CONFLICT,
                EngineError::NoSuchAction { .. }
                | EngineError::DefinitionNotFound { .. }
                | EngineError::MalformedDefinition(_) => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::NotFound { message, code } => ErrorResponse::new(message.clone(), *code),
            Self::Engine(e) => {
                if status.is_server_error() {
                    tracing::error!(error = %e, "workflow operation failed");
                    ErrorResponse::new("internal server error", e.code())
                } else {
                    tracing::debug!(error = %e, code = e.code(), "workflow operation rejected");
                    ErrorResponse::new(e.to_string(), e.code())
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        workflow::start_workflow,
        workflow::get_request_workflow,
        workflow::get_instance,
        workflow::advance_instance,
        workflow::list_available_actions,
    ),
    components(
        schemas(
            ErrorResponse,
            InstanceView,
            StepVisitView,
            AvailableAction,
            WorkflowInstanceStatus,
            StepInstanceStatus,
            workflow::AdvanceRequest,
        )
    ),
    tags(
        (name = "workflow", description = "Start and advance HR request workflows")
    ),
    info(
        title = "HR Workflow API",
        description = "Approval workflows for HR requests",
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let id = Uuid::now_v7();
        let cases = [
            (EngineError::InstanceNotFound(id), StatusCode::NOT_FOUND),
            (EngineError::RequestNotFound(id), StatusCode::NOT_FOUND),
            (
                EngineError::NotAuthorized {
                    actor: id,
                    action: "Approve".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                EngineError::AlreadyStarted { request_id: id },
                StatusCode::CONFLICT,
            ),
            (
                EngineError::ConcurrentModification { instance_id: id },
                StatusCode::CONFLICT,
            ),
            (
                EngineError::NoSuchAction {
                    action: "Teleport".into(),
                    step: "Review".into(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                EngineError::DefinitionNotFound { request_type_id: id },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                EngineError::Store(hr_workflow::StoreError::Database("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[test]
    fn test_openapi_lists_workflow_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/requests/{request_id}/workflow"));
        assert!(doc
            .paths
            .paths
            .contains_key("/v1/workflow-instances/{instance_id}/advance"));
    }
}

// Workflow HTTP routes

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{ApiError, ErrorResponse, ListResponse};
use crate::service::{AvailableAction, InstanceView, WorkflowService};

/// Request to advance a workflow instance
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AdvanceRequest {
    /// Name of the transition to take, compared case-insensitively.
    #[schema(example = "Approve")]
    pub action: String,
    /// Employee performing the action.
    pub actor_employee_id: Uuid,
    /// Free-text comment stored on the closed step.
    #[serde(default)]
    #[schema(example = "Enjoy your holiday")]
    pub comment: Option<String>,
}

/// Query for actions available to an employee
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActorQuery {
    /// Employee whose permissions are checked
    pub actor_employee_id: Uuid,
}

/// App state for workflow routes
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WorkflowService>,
}

impl AppState {
    pub fn new(service: Arc<WorkflowService>) -> Self {
        Self { service }
    }
}

/// Create workflow routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/requests/:request_id/workflow",
            post(start_workflow).get(get_request_workflow),
        )
        .route("/v1/workflow-instances/:instance_id", get(get_instance))
        .route(
            "/v1/workflow-instances/:instance_id/advance",
            post(advance_instance),
        )
        .route(
            "/v1/workflow-instances/:instance_id/available-actions",
            get(list_available_actions),
        )
        .with_state(state)
}

/// POST /v1/requests/{request_id}/workflow - Start the workflow for a request
#[utoipa::path(
    post,
    path = "/v1/requests/{request_id}/workflow",
    params(("request_id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 201, description = "Workflow started", body = InstanceView),
        (status = 404, description = "Request not found", body = ErrorResponse),
        (status = 409, description = "Workflow already started", body = ErrorResponse),
        (status = 422, description = "No usable workflow definition", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "workflow"
)]
pub async fn start_workflow(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<(StatusCode, Json<InstanceView>), ApiError> {
    let view = state.service.start(request_id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /v1/requests/{request_id}/workflow - Workflow instance of a request
#[utoipa::path(
    get,
    path = "/v1/requests/{request_id}/workflow",
    params(("request_id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Workflow instance", body = InstanceView),
        (status = 404, description = "Request not found or workflow not started", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "workflow"
)]
pub async fn get_request_workflow(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<InstanceView>, ApiError> {
    state
        .service
        .get_for_request(request_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound {
            message: format!("no workflow has been started for request {request_id}"),
            code: "workflow_not_started",
        })
}

/// GET /v1/workflow-instances/{instance_id} - Instance with its step history
#[utoipa::path(
    get,
    path = "/v1/workflow-instances/{instance_id}",
    params(("instance_id" = Uuid, Path, description = "Workflow instance ID")),
    responses(
        (status = 200, description = "Workflow instance", body = InstanceView),
        (status = 404, description = "Instance not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "workflow"
)]
pub async fn get_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<Uuid>,
) -> Result<Json<InstanceView>, ApiError> {
    Ok(Json(state.service.get(instance_id).await?))
}

/// POST /v1/workflow-instances/{instance_id}/advance - Take an action
#[utoipa::path(
    post,
    path = "/v1/workflow-instances/{instance_id}/advance",
    params(("instance_id" = Uuid, Path, description = "Workflow instance ID")),
    request_body = AdvanceRequest,
    responses(
        (status = 200, description = "Instance after the action", body = InstanceView),
        (status = 403, description = "Actor may not take this action", body = ErrorResponse),
        (status = 404, description = "Instance not found", body = ErrorResponse),
        (status = 409, description = "Instance not active or modified concurrently", body = ErrorResponse),
        (status = 422, description = "Action not available from the current step", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "workflow"
)]
pub async fn advance_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<Uuid>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<InstanceView>, ApiError> {
    let view = state
        .service
        .advance(instance_id, &req.action, req.actor_employee_id, req.comment)
        .await?;
    Ok(Json(view))
}

/// GET /v1/workflow-instances/{instance_id}/available-actions - Actions open to an employee
#[utoipa::path(
    get,
    path = "/v1/workflow-instances/{instance_id}/available-actions",
    params(
        ("instance_id" = Uuid, Path, description = "Workflow instance ID"),
        ActorQuery
    ),
    responses(
        (status = 200, description = "Available actions", body = ListResponse<AvailableAction>),
        (status = 404, description = "Instance not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "workflow"
)]
pub async fn list_available_actions(
    State(state): State<AppState>,
    Path(instance_id): Path<Uuid>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<ListResponse<AvailableAction>>, ApiError> {
    let actions = state
        .service
        .available_actions(instance_id, query.actor_employee_id)
        .await?;
    Ok(Json(actions.into()))
}

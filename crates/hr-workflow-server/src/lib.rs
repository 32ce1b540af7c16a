// HR workflow HTTP server
// Decision: Health and OpenAPI routes are never prefixed; API_PREFIX applies to /v1 routes only

pub mod api;
pub mod config;
pub mod service;
pub mod storage;
pub mod telemetry;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api::ApiDoc;
use crate::service::WorkflowService;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    storage: &'static str,
}

/// State for health endpoint
#[derive(Clone)]
struct HealthState {
    storage: &'static str,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage: state.storage,
    })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Assemble the full application router
pub fn build_app(
    service: Arc<WorkflowService>,
    api_prefix: &str,
    cors_allowed_origins: &[String],
) -> Router {
    let health_state = HealthState {
        storage: service.storage().mode(),
    };

    let workflow_routes = api::workflow::routes(api::workflow::AppState::new(service));

    let app = Router::new()
        .route("/health", get(health).with_state(health_state))
        .route("/api-doc/openapi.json", get(openapi_json))
        .merge(with_api_prefix(workflow_routes, api_prefix));

    let cors_origins: Vec<HeaderValue> = cors_allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    // Add CORS layer only if origins are configured
    let app = if cors_origins.is_empty() {
        app
    } else {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN]),
        )
    };

    app.layer(TraceLayer::new_for_http())
}

/// Mount the versioned workflow routes under `api_prefix` ("" mounts at root)
fn with_api_prefix(workflow_routes: Router, api_prefix: &str) -> Router {
    match api_prefix {
        "" => workflow_routes,
        prefix => Router::new().nest(prefix, workflow_routes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use hr_workflow::{RetryPolicy, WorkflowEngine};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::storage::StorageBackend;

    fn app(api_prefix: &str) -> Router {
        let engine = WorkflowEngine::new(StorageBackend::in_memory());
        let service = Arc::new(WorkflowService::new(engine, RetryPolicy::no_retry()));
        build_app(service, api_prefix, &[])
    }

    /// Status and error code; the code is `None` when no route matched
    async fn get_code(app: &Router, uri: &str) -> (StatusCode, Option<String>) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let code = serde_json::from_slice::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["code"].as_str().map(str::to_string));
        (status, code)
    }

    #[tokio::test]
    async fn test_api_prefix_empty() {
        let app = app("");
        let uri = format!("/v1/workflow-instances/{}", Uuid::now_v7());

        // Reaches the handler, which reports the missing instance
        let (status, code) = get_code(&app, &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code.as_deref(), Some("instance_not_found"));
    }

    #[tokio::test]
    async fn test_api_prefix_nests_workflow_routes() {
        let app = app("/api");
        let id = Uuid::now_v7();

        let (status, code) = get_code(&app, &format!("/api/v1/workflow-instances/{id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code.as_deref(), Some("instance_not_found"));

        let (status, code) = get_code(&app, &format!("/v1/workflow-instances/{id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, None);

        // Health is never prefixed
        let (status, _) = get_code(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
    }
}

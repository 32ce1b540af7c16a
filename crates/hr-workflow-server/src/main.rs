// HR workflow API server

use std::sync::Arc;

use anyhow::{Context, Result};

use hr_workflow::seed::seed_demo_data;
use hr_workflow::{EngineConfig, RetryPolicy, WorkflowEngine};
use hr_workflow_server::config::ServerConfig;
use hr_workflow_server::service::WorkflowService;
use hr_workflow_server::storage::StorageBackend;
use hr_workflow_server::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    init_telemetry(&TelemetryConfig::from_env());
    tracing::info!("hr-workflow-server starting...");

    let config = ServerConfig::from_env().context("Invalid server configuration")?;

    let storage = match &config.database_url {
        Some(url) => {
            let storage = StorageBackend::postgres(url).await?;
            tracing::info!("Connected to database");
            if config.run_migrations {
                storage.migrate().await.context("Failed to run migrations")?;
                tracing::info!("Migrations applied");
            }
            storage
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set, using in-memory storage (data is lost on restart)"
            );
            StorageBackend::in_memory()
        }
    };

    if config.seed_demo_data {
        match seed_demo_data(&storage)
            .await
            .context("Failed to seed demo data")?
        {
            Some(demo) => tracing::info!(
                sample_request_id = %demo.sample_request_id,
                hr_manager_id = %demo.hr_manager_id,
                "Seeded demo data"
            ),
            None => tracing::info!("Employees already present, skipping demo data"),
        }
    }

    let retry = RetryPolicy::conflict().with_max_attempts(config.advance_retry_attempts);
    let engine = WorkflowEngine::with_config(storage, EngineConfig::default());
    let service = Arc::new(WorkflowService::new(engine, retry));

    if !config.api_prefix.is_empty() {
        tracing::info!(prefix = %config.api_prefix, "API prefix configured");
    }
    if config.cors_allowed_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?config.cors_allowed_origins, "CORS origins configured");
    }

    let app = hr_workflow_server::build_app(
        service,
        &config.api_prefix,
        &config.cors_allowed_origins,
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

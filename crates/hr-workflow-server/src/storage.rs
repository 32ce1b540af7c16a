// Storage backend abstraction
// Decision: Use enum dispatch over the two stores instead of trait objects
//
// PostgreSQL in production, in-memory when DATABASE_URL is unset.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use hr_workflow::model::{
    ApproverGroup, Employee, Request, RequestType, StepInstance, WorkflowDefinition,
    WorkflowInstance,
};
use hr_workflow::{
    DefinitionStore, InMemoryWorkflowStore, InstanceStore, PostgresWorkflowStore, RecordStore,
    StoreError, UnitOfWork,
};

/// Storage backend that can be either PostgreSQL or in-memory
#[derive(Clone)]
pub enum StorageBackend {
    /// PostgreSQL database (production)
    Postgres(PostgresWorkflowStore),
    /// In-memory store (dev mode)
    InMemory(Arc<InMemoryWorkflowStore>),
}

impl StorageBackend {
    /// Connect to PostgreSQL
    pub async fn postgres(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::Postgres(PostgresWorkflowStore::new(pool)))
    }

    /// Create an in-memory storage backend
    pub fn in_memory() -> Self {
        Self::InMemory(Arc::new(InMemoryWorkflowStore::new()))
    }

    /// Check if this is dev mode (in-memory)
    pub fn is_dev_mode(&self) -> bool {
        matches!(self, Self::InMemory(_))
    }

    /// Human-readable storage mode for the health endpoint
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::InMemory(_) => "in_memory",
        }
    }

    /// Apply bundled migrations. No-op in dev mode.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.migrate().await,
            Self::InMemory(_) => Ok(()),
        }
    }
}

// ============================================
// Definitions
// ============================================

#[async_trait]
impl DefinitionStore for StorageBackend {
    async fn active_definition(
        &self,
        request_type_id: Uuid,
    ) -> Result<Option<WorkflowDefinition>, StoreError> {
        match self {
            Self::Postgres(store) => store.active_definition(request_type_id).await,
            Self::InMemory(store) => store.active_definition(request_type_id).await,
        }
    }

    async fn get_definition(&self, definition_id: Uuid) -> Result<WorkflowDefinition, StoreError> {
        match self {
            Self::Postgres(store) => store.get_definition(definition_id).await,
            Self::InMemory(store) => store.get_definition(definition_id).await,
        }
    }

    async fn is_group_member(&self, group_id: Uuid, employee_id: Uuid) -> Result<bool, StoreError> {
        match self {
            Self::Postgres(store) => store.is_group_member(group_id, employee_id).await,
            Self::InMemory(store) => store.is_group_member(group_id, employee_id).await,
        }
    }
}

// ============================================
// Instances
// ============================================

#[async_trait]
impl InstanceStore for StorageBackend {
    async fn get_request(&self, request_id: Uuid) -> Result<Request, StoreError> {
        match self {
            Self::Postgres(store) => store.get_request(request_id).await,
            Self::InMemory(store) => store.get_request(request_id).await,
        }
    }

    async fn get_instance(&self, instance_id: Uuid) -> Result<WorkflowInstance, StoreError> {
        match self {
            Self::Postgres(store) => store.get_instance(instance_id).await,
            Self::InMemory(store) => store.get_instance(instance_id).await,
        }
    }

    async fn find_instance_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<WorkflowInstance>, StoreError> {
        match self {
            Self::Postgres(store) => store.find_instance_for_request(request_id).await,
            Self::InMemory(store) => store.find_instance_for_request(request_id).await,
        }
    }

    async fn list_step_instances(
        &self,
        instance_id: Uuid,
    ) -> Result<Vec<StepInstance>, StoreError> {
        match self {
            Self::Postgres(store) => store.list_step_instances(instance_id).await,
            Self::InMemory(store) => store.list_step_instances(instance_id).await,
        }
    }

    async fn pending_step_instance(
        &self,
        instance_id: Uuid,
        step_id: Uuid,
    ) -> Result<Option<StepInstance>, StoreError> {
        match self {
            Self::Postgres(store) => store.pending_step_instance(instance_id, step_id).await,
            Self::InMemory(store) => store.pending_step_instance(instance_id, step_id).await,
        }
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<WorkflowInstance, StoreError> {
        match self {
            Self::Postgres(store) => store.commit(unit).await,
            Self::InMemory(store) => store.commit(unit).await,
        }
    }
}

// ============================================
// Records
// ============================================

#[async_trait]
impl RecordStore for StorageBackend {
    async fn save_employee(&self, employee: &Employee) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.save_employee(employee).await,
            Self::InMemory(store) => store.save_employee(employee).await,
        }
    }

    async fn save_request_type(&self, request_type: &RequestType) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.save_request_type(request_type).await,
            Self::InMemory(store) => store.save_request_type(request_type).await,
        }
    }

    async fn save_request(&self, request: &Request) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.save_request(request).await,
            Self::InMemory(store) => store.save_request(request).await,
        }
    }

    async fn save_approver_group(&self, group: &ApproverGroup) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.save_approver_group(group).await,
            Self::InMemory(store) => store.save_approver_group(group).await,
        }
    }

    async fn save_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.save_definition(definition).await,
            Self::InMemory(store) => store.save_definition(definition).await,
        }
    }

    async fn count_employees(&self) -> Result<usize, StoreError> {
        match self {
            Self::Postgres(store) => store.count_employees().await,
            Self::InMemory(store) => store.count_employees().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_is_dev_mode() {
        let backend = StorageBackend::in_memory();
        assert!(backend.is_dev_mode());
        assert_eq!(backend.mode(), "in_memory");
    }

    #[tokio::test]
    async fn test_in_memory_migrate_is_noop() {
        let backend = StorageBackend::in_memory();
        assert!(backend.migrate().await.is_ok());
        assert_eq!(backend.count_employees().await.unwrap(), 0);
    }
}

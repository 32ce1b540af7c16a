// Workflow service: engine calls plus the read models the API returns

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use hr_workflow::model::{
    StepInstance, StepInstanceStatus, WorkflowDefinition, WorkflowInstance, WorkflowInstanceStatus,
};
use hr_workflow::{DefinitionStore, EngineError, InstanceStore, RetryPolicy, WorkflowEngine};

use crate::storage::StorageBackend;

/// A workflow instance with its step history
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InstanceView {
    pub id: Uuid,
    pub request_id: Uuid,
    pub definition_id: Uuid,
    pub definition_name: String,
    pub status: WorkflowInstanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step_name: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub version: i32,
    /// Step visits in the order they were recorded
    pub steps: Vec<StepVisitView>,
}

/// One recorded visit to a step
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StepVisitView {
    pub id: Uuid,
    pub step_id: Uuid,
    pub step_name: String,
    pub status: StepInstanceStatus,
    pub entered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exited_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_group_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_employee_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// An action the caller may take from the current step
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AvailableAction {
    pub transition_id: Uuid,
    pub action_name: String,
    pub to_step_id: Uuid,
    pub to_step_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_group_id: Option<Uuid>,
}

pub struct WorkflowService {
    engine: WorkflowEngine<StorageBackend>,
    retry: RetryPolicy,
}

impl WorkflowService {
    pub fn new(engine: WorkflowEngine<StorageBackend>, retry: RetryPolicy) -> Self {
        Self { engine, retry }
    }

    pub fn storage(&self) -> &StorageBackend {
        self.engine.store()
    }

    #[instrument(skip(self))]
    pub async fn start(&self, request_id: Uuid) -> Result<InstanceView, EngineError> {
        let instance = self.engine.start_workflow(request_id).await?;
        self.view(instance).await
    }

    #[instrument(skip(self, comment))]
    pub async fn advance(
        &self,
        instance_id: Uuid,
        action: &str,
        actor_employee_id: Uuid,
        comment: Option<String>,
    ) -> Result<InstanceView, EngineError> {
        let instance = self
            .engine
            .advance_with_retry(&self.retry, instance_id, action, actor_employee_id, comment)
            .await?;
        self.view(instance).await
    }

    pub async fn get(&self, instance_id: Uuid) -> Result<InstanceView, EngineError> {
        let instance = self.storage().get_instance(instance_id).await?;
        self.view(instance).await
    }

    /// Instance linked to a request; `None` when no workflow was started
    pub async fn get_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<InstanceView>, EngineError> {
        // Surface an unknown request as RequestNotFound
        self.storage().get_request(request_id).await?;

        match self.storage().find_instance_for_request(request_id).await? {
            Some(instance) => Ok(Some(self.view(instance).await?)),
            None => Ok(None),
        }
    }

    pub async fn available_actions(
        &self,
        instance_id: Uuid,
        actor_employee_id: Uuid,
    ) -> Result<Vec<AvailableAction>, EngineError> {
        let transitions = self
            .engine
            .available_actions(instance_id, actor_employee_id)
            .await?;
        if transitions.is_empty() {
            return Ok(Vec::new());
        }

        let definition = self
            .storage()
            .get_definition(transitions[0].definition_id)
            .await?;
        Ok(transitions
            .into_iter()
            .map(|t| AvailableAction {
                transition_id: t.id,
                to_step_name: step_name(&definition, t.to_step_id),
                action_name: t.action_name,
                to_step_id: t.to_step_id,
                approver_group_id: t.approver_group_id,
            })
            .collect())
    }

    async fn view(&self, instance: WorkflowInstance) -> Result<InstanceView, EngineError> {
        let definition = self.storage().get_definition(instance.definition_id).await?;
        let steps = self.storage().list_step_instances(instance.id).await?;
        Ok(build_view(&definition, instance, steps))
    }
}

fn build_view(
    definition: &WorkflowDefinition,
    instance: WorkflowInstance,
    steps: Vec<StepInstance>,
) -> InstanceView {
    InstanceView {
        id: instance.id,
        request_id: instance.request_id,
        definition_id: definition.id,
        definition_name: definition.name.clone(),
        status: instance.status,
        current_step_id: instance.current_step_id,
        current_step_name: instance
            .current_step_id
            .map(|id| step_name(definition, id)),
        started_at: instance.started_at,
        completed_at: instance.completed_at,
        version: instance.version,
        steps: steps
            .into_iter()
            .map(|s| StepVisitView {
                id: s.id,
                step_name: step_name(definition, s.step_id),
                step_id: s.step_id,
                status: s.status,
                entered_at: s.entered_at,
                exited_at: s.exited_at,
                assigned_group_id: s.assigned_group_id,
                actor_employee_id: s.actor_employee_id,
                comment: s.comment,
            })
            .collect(),
    }
}

fn step_name(definition: &WorkflowDefinition, step_id: Uuid) -> String {
    definition
        .step(step_id)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| step_id.to_string())
}

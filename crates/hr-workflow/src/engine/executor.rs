//! Workflow engine
//!
//! The `WorkflowEngine` is responsible for:
//! - Starting a workflow for a request
//! - Advancing an instance along a transition chosen by action name
//! - Listing the actions an employee may take on an instance
//!
//! Every mutating call reads a snapshot and commits a single
//! [`UnitOfWork`]; the store rejects it if the instance changed meanwhile.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::model::{
    StepClosure, StepInstance, StepInstanceStatus, Transition, WorkflowDefinition,
    WorkflowInstance,
};
use crate::persistence::{UnitOfWork, WorkflowStore};
use crate::reliability::RetryPolicy;

use super::authorization::ApproverResolver;
use super::error::EngineError;

/// Configuration for the workflow engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Run full graph validation on the definition before starting an
    /// instance. When disabled only the Start step and transition endpoints
    /// are checked.
    pub validate_definitions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validate_definitions: true,
        }
    }
}

/// Workflow engine
///
/// Stateless apart from its store handle; safe to share across tasks.
///
/// # Example
///
/// ```ignore
/// use hr_workflow::prelude::*;
///
/// let engine = WorkflowEngine::new(InMemoryWorkflowStore::new());
///
/// let instance = engine.start_workflow(request_id).await?;
/// let actions = engine.available_actions(instance.id, manager_id).await?;
/// let instance = engine
///     .advance(instance.id, "Approve", manager_id, Some("Enjoy".into()))
///     .await?;
/// ```
pub struct WorkflowEngine<S: WorkflowStore + ?Sized> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: WorkflowStore> WorkflowEngine<S> {
    /// Create a new engine with the given store
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Create a new engine with custom config
    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }
}

impl<S: WorkflowStore + ?Sized> WorkflowEngine<S> {
    /// Create an engine over a store shared with other components
    pub fn from_arc(store: Arc<S>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Get a reference to the store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Start
    // =========================================================================

    /// Start the workflow for a request using the active definition of its type
    #[instrument(skip(self))]
    pub async fn start_workflow(&self, request_id: Uuid) -> Result<WorkflowInstance, EngineError> {
        let request = self.store.get_request(request_id).await?;
        if request.workflow_instance_id.is_some() {
            return Err(EngineError::AlreadyStarted { request_id });
        }

        let definition = self
            .store
            .active_definition(request.request_type_id)
            .await?
            .ok_or(EngineError::DefinitionNotFound {
                request_type_id: request.request_type_id,
            })?;
        self.check_definition(&definition)?;

        let start = definition
            .start_step()
            .ok_or_else(|| malformed("definition has no start step"))?;
        let initial = definition.initial_step().map_err(malformed)?;
        let now = Utc::now();

        let unit = if initial.is_end() {
            // Start leads straight to End: nothing to approve
            let mut instance = WorkflowInstance::active(definition.id, request.id, start.id, now);
            instance.complete(now);

            let visit = StepInstance::pending(
                instance.id,
                start.id,
                definition.assigned_group_for(start),
                now,
            );
            let closure = StepClosure {
                step_instance_id: visit.id,
                status: StepInstanceStatus::Skipped,
                exited_at: now,
                actor_employee_id: None,
                comment: None,
            };

            let mut unit = UnitOfWork::create(instance);
            unit.append_step(visit.closed(&closure));
            unit
        } else {
            let instance = WorkflowInstance::active(definition.id, request.id, initial.id, now);
            let visit = StepInstance::pending(
                instance.id,
                initial.id,
                definition.assigned_group_for(initial),
                now,
            );

            let mut unit = UnitOfWork::create(instance);
            unit.append_step(visit);
            unit
        };

        let instance = self.store.commit(unit).await?;

        info!(
            instance_id = %instance.id,
            definition_id = %definition.id,
            status = %instance.status,
            initial_step = %initial.name,
            "started workflow"
        );
        Ok(instance)
    }

    // =========================================================================
    // Advance
    // =========================================================================

    /// Take the transition named `action` from the instance's current step
    #[instrument(skip(self, comment))]
    pub async fn advance(
        &self,
        instance_id: Uuid,
        action: &str,
        actor_employee_id: Uuid,
        comment: Option<String>,
    ) -> Result<WorkflowInstance, EngineError> {
        let instance = self.store.get_instance(instance_id).await?;
        self.advance_from(instance, action, actor_employee_id, comment)
            .await
    }

    /// [`advance`](Self::advance), re-run under `policy` after a
    /// concurrent-modification conflict.
    ///
    /// A retry only happens while the pending visit the first attempt acted
    /// on is still pending. Once another writer has closed it, even by
    /// looping back to the same step, the conflict is returned to the caller.
    #[instrument(skip(self, policy, comment))]
    pub async fn advance_with_retry(
        &self,
        policy: &RetryPolicy,
        instance_id: Uuid,
        action: &str,
        actor_employee_id: Uuid,
        comment: Option<String>,
    ) -> Result<WorkflowInstance, EngineError> {
        let mut snapshot = self.store.get_instance(instance_id).await?;
        let acted_on = self.open_visit(&snapshot).await?;
        let mut attempt = 1;

        loop {
            let result = self
                .advance_from(snapshot, action, actor_employee_id, comment.clone())
                .await;

            let err = match result {
                Err(e) if e.is_retryable() && policy.has_attempts_remaining(attempt) => e,
                other => return other,
            };

            snapshot = self.store.get_instance(instance_id).await?;
            let open = self.open_visit(&snapshot).await?;
            if acted_on.is_none() || open != acted_on {
                debug!(%instance_id, "visit already closed by another writer; not retrying");
                return Err(err);
            }

            attempt += 1;
            let delay = policy.delay_for_attempt(attempt);
            warn!(%instance_id, attempt, ?delay, "retrying advance after conflict");
            tokio::time::sleep(delay).await;
        }
    }

    /// Id of the pending visit on the instance's current step, if any
    async fn open_visit(&self, instance: &WorkflowInstance) -> Result<Option<Uuid>, EngineError> {
        match instance.current_step_id {
            Some(step_id) if instance.is_active() => Ok(self
                .store
                .pending_step_instance(instance.id, step_id)
                .await?
                .map(|visit| visit.id)),
            _ => Ok(None),
        }
    }

    async fn advance_from(
        &self,
        instance: WorkflowInstance,
        action: &str,
        actor_employee_id: Uuid,
        comment: Option<String>,
    ) -> Result<WorkflowInstance, EngineError> {
        let instance_id = instance.id;
        let current_step_id = match instance.current_step_id {
            Some(step_id) if instance.is_active() => step_id,
            _ => {
                return Err(EngineError::NotAdvanceable {
                    instance_id,
                    status: instance.status,
                })
            }
        };

        let definition = self.store.get_definition(instance.definition_id).await?;
        let step = definition.step(current_step_id).ok_or_else(|| {
            malformed(format!(
                "current step {} is not part of definition {}",
                current_step_id, definition.id
            ))
        })?;

        let candidates = definition.transitions_for_action(step.id, action);
        if candidates.is_empty() {
            return Err(EngineError::NoSuchAction {
                action: action.to_string(),
                step: step.name.clone(),
            });
        }

        let mut resolver = ApproverResolver::new(self.store.as_ref(), actor_employee_id);
        let transition = resolver
            .select(&candidates)
            .await?
            .ok_or_else(|| EngineError::NotAuthorized {
                actor: actor_employee_id,
                action: action.to_string(),
            })?;

        let next = definition.step(transition.to_step_id).ok_or_else(|| {
            malformed(format!(
                "transition {} targets unknown step {}",
                transition.id, transition.to_step_id
            ))
        })?;

        let now = Utc::now();
        let status = StepInstanceStatus::from_action(&transition.action_name);
        let mut unit = UnitOfWork::update(instance);

        match self.store.pending_step_instance(instance_id, step.id).await? {
            Some(open) => unit.close_step(StepClosure {
                step_instance_id: open.id,
                status,
                exited_at: now,
                actor_employee_id: Some(actor_employee_id),
                comment,
            }),
            None => {
                warn!(
                    %instance_id,
                    step = %step.name,
                    "no pending step instance; recording synthetic visit"
                );
                let visit = StepInstance::pending(
                    instance_id,
                    step.id,
                    definition.assigned_group_for(step),
                    now,
                );
                let closure = StepClosure {
                    step_instance_id: visit.id,
                    status,
                    exited_at: now,
                    actor_employee_id: Some(actor_employee_id),
                    comment,
                };
                unit.append_step(visit.closed(&closure));
            }
        }

        if next.is_end() {
            unit.instance.complete(now);
        } else {
            unit.instance.move_to(next.id);
            unit.append_step(StepInstance::pending(
                instance_id,
                next.id,
                definition.assigned_group_for(next),
                now,
            ));
        }

        let committed = self.store.commit(unit).await?;

        info!(
            %instance_id,
            from = %step.name,
            to = %next.name,
            action = %transition.action_name,
            outcome = %status,
            status = %committed.status,
            "advanced workflow"
        );
        Ok(committed)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Transitions from the current step the employee may take, in
    /// definition order. Empty once the instance has left its last step.
    #[instrument(skip(self))]
    pub async fn available_actions(
        &self,
        instance_id: Uuid,
        actor_employee_id: Uuid,
    ) -> Result<Vec<Transition>, EngineError> {
        let instance = self.store.get_instance(instance_id).await?;
        let step_id = match instance.current_step_id {
            Some(step_id) if instance.is_active() => step_id,
            _ => return Ok(Vec::new()),
        };

        let definition = self.store.get_definition(instance.definition_id).await?;
        let mut resolver = ApproverResolver::new(self.store.as_ref(), actor_employee_id);
        let actions = resolver.permitted(definition.outgoing(step_id)).await?;

        debug!(%instance_id, count = actions.len(), "resolved available actions");
        Ok(actions)
    }

    fn check_definition(&self, definition: &WorkflowDefinition) -> Result<(), EngineError> {
        if self.config.validate_definitions {
            definition.validate().map_err(malformed)
        } else {
            definition.check_references().map_err(malformed)
        }
    }
}

fn malformed(reason: impl ToString) -> EngineError {
    EngineError::MalformedDefinition(reason.to_string())
}

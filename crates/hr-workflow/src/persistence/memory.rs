//! In-memory implementation of the workflow stores for dev mode and testing

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::store::*;
use crate::model::{
    ApproverGroup, Employee, Request, RequestType, StepInstance, WorkflowDefinition,
    WorkflowInstance,
};

/// Definitions and organisation data
#[derive(Default)]
struct Directory {
    employees: HashMap<Uuid, Employee>,
    request_types: HashMap<Uuid, RequestType>,
    groups: HashMap<Uuid, ApproverGroup>,
    definitions: HashMap<Uuid, WorkflowDefinition>,
}

/// Requests and everything a unit of work touches
#[derive(Default)]
struct Ledger {
    requests: HashMap<Uuid, Request>,
    instances: HashMap<Uuid, WorkflowInstance>,
    /// Append order is the recorded order
    step_instances: Vec<StepInstance>,
}

/// In-memory implementation of the workflow stores
///
/// Provides the same commit semantics as the PostgreSQL implementation:
/// a unit of work is checked and applied under one write lock, so it either
/// lands completely or not at all.
///
/// # Example
///
/// ```
/// use hr_workflow::InMemoryWorkflowStore;
///
/// let store = InMemoryWorkflowStore::new();
/// assert_eq!(store.instance_count(), 0);
/// ```
pub struct InMemoryWorkflowStore {
    directory: RwLock<Directory>,
    ledger: RwLock<Ledger>,
}

impl InMemoryWorkflowStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            directory: RwLock::new(Directory::default()),
            ledger: RwLock::new(Ledger::default()),
        }
    }

    /// Get the number of workflow instances
    pub fn instance_count(&self) -> usize {
        self.ledger.read().instances.len()
    }

    /// Get the number of pending step instances for an instance
    pub fn pending_step_count(&self, instance_id: Uuid) -> usize {
        self.ledger
            .read()
            .step_instances
            .iter()
            .filter(|s| s.instance_id == instance_id && s.is_pending())
            .count()
    }

    /// Replace an instance as-is, bypassing unit-of-work checks (for testing)
    pub fn put_instance(&self, instance: WorkflowInstance) {
        self.ledger.write().instances.insert(instance.id, instance);
    }
}

impl Default for InMemoryWorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Run every check of a unit of work without mutating anything
    fn check(&self, unit: &UnitOfWork) -> Result<(), StoreError> {
        let instance_id = unit.instance.id;

        match unit.expected_version {
            None => {
                let request_id = unit.instance.request_id;
                let request = self
                    .requests
                    .get(&request_id)
                    .ok_or(StoreError::RequestNotFound(request_id))?;
                let already_linked = request.workflow_instance_id.is_some()
                    || self.instances.values().any(|i| i.request_id == request_id);
                if already_linked {
                    return Err(StoreError::RequestAlreadyLinked(request_id));
                }
            }
            Some(expected) => {
                let current = self
                    .instances
                    .get(&instance_id)
                    .ok_or(StoreError::InstanceNotFound(instance_id))?;
                if current.version != expected {
                    return Err(StoreError::ConcurrencyConflict {
                        instance_id,
                        expected,
                        actual: current.version,
                    });
                }
            }
        }

        for closure in &unit.closures {
            let open = self.step_instances.iter().any(|s| {
                s.id == closure.step_instance_id && s.instance_id == instance_id && s.is_pending()
            });
            if !open {
                return Err(StoreError::StepAlreadyClosed {
                    instance_id,
                    step_instance_id: closure.step_instance_id,
                });
            }
        }

        let still_pending = self
            .step_instances
            .iter()
            .filter(|s| s.instance_id == instance_id && s.is_pending())
            .filter(|s| !unit.closures.iter().any(|c| c.step_instance_id == s.id))
            .count();
        let opened = unit.new_steps.iter().filter(|s| s.is_pending()).count();
        if still_pending + opened > 1 {
            return Err(StoreError::PendingStepConflict(instance_id));
        }

        Ok(())
    }

    fn apply(&mut self, unit: UnitOfWork) -> WorkflowInstance {
        for closure in &unit.closures {
            if let Some(open) = self
                .step_instances
                .iter_mut()
                .find(|s| s.id == closure.step_instance_id)
            {
                *open = open.clone().closed(closure);
            }
        }

        self.step_instances.extend(unit.new_steps);

        if unit.expected_version.is_none() {
            if let Some(request) = self.requests.get_mut(&unit.instance.request_id) {
                request.workflow_instance_id = Some(unit.instance.id);
            }
        }

        self.instances.insert(unit.instance.id, unit.instance.clone());
        unit.instance
    }
}

#[async_trait]
impl DefinitionStore for InMemoryWorkflowStore {
    async fn active_definition(
        &self,
        request_type_id: Uuid,
    ) -> Result<Option<WorkflowDefinition>, StoreError> {
        let directory = self.directory.read();
        let mut active = directory
            .definitions
            .values()
            .filter(|d| d.request_type_id == request_type_id && d.is_active);

        match (active.next(), active.next()) {
            (Some(definition), None) => Ok(Some(definition.clone())),
            _ => Ok(None),
        }
    }

    async fn get_definition(&self, definition_id: Uuid) -> Result<WorkflowDefinition, StoreError> {
        self.directory
            .read()
            .definitions
            .get(&definition_id)
            .cloned()
            .ok_or(StoreError::DefinitionNotFound(definition_id))
    }

    async fn is_group_member(&self, group_id: Uuid, employee_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .directory
            .read()
            .groups
            .get(&group_id)
            .map(|g| g.contains(employee_id))
            .unwrap_or(false))
    }
}

#[async_trait]
impl InstanceStore for InMemoryWorkflowStore {
    async fn get_request(&self, request_id: Uuid) -> Result<Request, StoreError> {
        self.ledger
            .read()
            .requests
            .get(&request_id)
            .cloned()
            .ok_or(StoreError::RequestNotFound(request_id))
    }

    async fn get_instance(&self, instance_id: Uuid) -> Result<WorkflowInstance, StoreError> {
        self.ledger
            .read()
            .instances
            .get(&instance_id)
            .cloned()
            .ok_or(StoreError::InstanceNotFound(instance_id))
    }

    async fn find_instance_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<WorkflowInstance>, StoreError> {
        Ok(self
            .ledger
            .read()
            .instances
            .values()
            .find(|i| i.request_id == request_id)
            .cloned())
    }

    async fn list_step_instances(
        &self,
        instance_id: Uuid,
    ) -> Result<Vec<StepInstance>, StoreError> {
        let ledger = self.ledger.read();
        if !ledger.instances.contains_key(&instance_id) {
            return Err(StoreError::InstanceNotFound(instance_id));
        }

        Ok(ledger
            .step_instances
            .iter()
            .filter(|s| s.instance_id == instance_id)
            .cloned()
            .collect())
    }

    async fn pending_step_instance(
        &self,
        instance_id: Uuid,
        step_id: Uuid,
    ) -> Result<Option<StepInstance>, StoreError> {
        Ok(self
            .ledger
            .read()
            .step_instances
            .iter()
            .rev()
            .find(|s| s.instance_id == instance_id && s.step_id == step_id && s.is_pending())
            .cloned())
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<WorkflowInstance, StoreError> {
        let mut ledger = self.ledger.write();
        ledger.check(&unit)?;
        Ok(ledger.apply(unit))
    }
}

#[async_trait]
impl RecordStore for InMemoryWorkflowStore {
    async fn save_employee(&self, employee: &Employee) -> Result<(), StoreError> {
        self.directory
            .write()
            .employees
            .insert(employee.id, employee.clone());
        Ok(())
    }

    async fn save_request_type(&self, request_type: &RequestType) -> Result<(), StoreError> {
        self.directory
            .write()
            .request_types
            .insert(request_type.id, request_type.clone());
        Ok(())
    }

    async fn save_request(&self, request: &Request) -> Result<(), StoreError> {
        let mut ledger = self.ledger.write();
        // The workflow link is owned by commit; keep whatever is stored.
        let link = ledger
            .requests
            .get(&request.id)
            .and_then(|r| r.workflow_instance_id);
        let mut request = request.clone();
        request.workflow_instance_id = link;
        ledger.requests.insert(request.id, request);
        Ok(())
    }

    async fn save_approver_group(&self, group: &ApproverGroup) -> Result<(), StoreError> {
        self.directory
            .write()
            .groups
            .insert(group.id, group.clone());
        Ok(())
    }

    async fn save_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        definition.validate()?;

        let mut directory = self.directory.write();
        if directory.definitions.contains_key(&definition.id) {
            return Err(StoreError::Database(format!(
                "workflow definition {} already exists",
                definition.id
            )));
        }

        if definition.is_active {
            for other in directory.definitions.values_mut() {
                if other.request_type_id == definition.request_type_id {
                    other.is_active = false;
                }
            }
        }

        directory
            .definitions
            .insert(definition.id, definition.clone());
        Ok(())
    }

    async fn count_employees(&self) -> Result<usize, StoreError> {
        Ok(self.directory.read().employees.len())
    }
}

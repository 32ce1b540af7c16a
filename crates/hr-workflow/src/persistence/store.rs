//! Store traits and the unit of work committed by the engine

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{
    ApproverGroup, DefinitionError, Employee, Request, RequestType, StepClosure, StepInstance,
    WorkflowDefinition, WorkflowInstance,
};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Request not found
    #[error("request not found: {0}")]
    RequestNotFound(Uuid),

    /// Workflow instance not found
    #[error("workflow instance not found: {0}")]
    InstanceNotFound(Uuid),

    /// Workflow definition not found
    #[error("workflow definition not found: {0}")]
    DefinitionNotFound(Uuid),

    /// Concurrency conflict (optimistic locking failed)
    #[error("concurrency conflict on instance {instance_id}: expected version {expected}, got {actual}")]
    ConcurrencyConflict {
        instance_id: Uuid,
        expected: i32,
        actual: i32,
    },

    /// A step instance the unit of work meant to close was already closed
    #[error("step instance {step_instance_id} of instance {instance_id} is no longer pending")]
    StepAlreadyClosed {
        instance_id: Uuid,
        step_instance_id: Uuid,
    },

    /// Committing would leave more than one pending step instance
    #[error("instance {0} already has a pending step instance")]
    PendingStepConflict(Uuid),

    /// The request already has a workflow instance
    #[error("request {0} is already linked to a workflow instance")]
    RequestAlreadyLinked(Uuid),

    /// Definition rejected on save
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(#[from] DefinitionError),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether this error means another writer got there first
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. }
                | Self::StepAlreadyClosed { .. }
                | Self::PendingStepConflict(_)
        )
    }
}

/// All mutations produced by one engine call.
///
/// A store applies a unit of work all-or-nothing. For updates the store
/// checks that the persisted instance still has `expected_version`; every
/// closure must target a step instance that is still pending. Any failed
/// check or persistence error leaves the store unchanged.
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    /// Instance state after commit
    pub instance: WorkflowInstance,

    /// Version the instance must have in the store; `None` inserts a new
    /// instance and links it to its request
    pub expected_version: Option<i32>,

    /// Pending step instances to close
    pub closures: Vec<StepClosure>,

    /// Step instances to append (pending or already closed)
    pub new_steps: Vec<StepInstance>,
}

impl UnitOfWork {
    /// Insert a new instance and link it to its request
    pub fn create(instance: WorkflowInstance) -> Self {
        Self {
            instance,
            expected_version: None,
            closures: Vec::new(),
            new_steps: Vec::new(),
        }
    }

    /// Update an instance read at `instance.version`; the committed
    /// instance carries the next version
    pub fn update(mut instance: WorkflowInstance) -> Self {
        let expected = instance.version;
        instance.version = expected + 1;
        Self {
            instance,
            expected_version: Some(expected),
            closures: Vec::new(),
            new_steps: Vec::new(),
        }
    }

    pub fn close_step(&mut self, closure: StepClosure) {
        self.closures.push(closure);
    }

    pub fn append_step(&mut self, step: StepInstance) {
        self.new_steps.push(step);
    }

    pub fn is_create(&self) -> bool {
        self.expected_version.is_none()
    }
}

/// Read access to workflow definitions and approver-group membership
#[async_trait]
pub trait DefinitionStore: Send + Sync + 'static {
    /// The active definition for a request type, if exactly one exists
    async fn active_definition(
        &self,
        request_type_id: Uuid,
    ) -> Result<Option<WorkflowDefinition>, StoreError>;

    /// Definition by id, with steps and transitions in stored order
    async fn get_definition(&self, definition_id: Uuid) -> Result<WorkflowDefinition, StoreError>;

    /// Whether `employee_id` is a member of `group_id`
    async fn is_group_member(&self, group_id: Uuid, employee_id: Uuid) -> Result<bool, StoreError>;
}

/// Durable storage for requests, workflow instances and step instances
///
/// Implementations must be thread-safe and support concurrent access.
/// Writes go exclusively through [`InstanceStore::commit`].
#[async_trait]
pub trait InstanceStore: Send + Sync + 'static {
    async fn get_request(&self, request_id: Uuid) -> Result<Request, StoreError>;

    async fn get_instance(&self, instance_id: Uuid) -> Result<WorkflowInstance, StoreError>;

    async fn find_instance_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<WorkflowInstance>, StoreError>;

    /// Step instances of an instance in the order they were recorded
    async fn list_step_instances(&self, instance_id: Uuid) -> Result<Vec<StepInstance>, StoreError>;

    /// Most recent pending step instance for (instance, step)
    async fn pending_step_instance(
        &self,
        instance_id: Uuid,
        step_id: Uuid,
    ) -> Result<Option<StepInstance>, StoreError>;

    /// Apply a unit of work atomically and return the committed instance
    async fn commit(&self, unit: UnitOfWork) -> Result<WorkflowInstance, StoreError>;
}

/// Write access to supporting records and definitions.
///
/// Used by seeding and tests; record management proper belongs to the
/// surrounding application.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    async fn save_employee(&self, employee: &Employee) -> Result<(), StoreError>;

    async fn save_request_type(&self, request_type: &RequestType) -> Result<(), StoreError>;

    async fn save_request(&self, request: &Request) -> Result<(), StoreError>;

    async fn save_approver_group(&self, group: &ApproverGroup) -> Result<(), StoreError>;

    /// Validate and insert a definition. Saving an active definition
    /// deactivates any other active definition for the same request type.
    async fn save_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError>;

    async fn count_employees(&self) -> Result<usize, StoreError>;
}

/// Everything the engine needs from storage
pub trait WorkflowStore: DefinitionStore + InstanceStore {}

impl<T: DefinitionStore + InstanceStore> WorkflowStore for T {}

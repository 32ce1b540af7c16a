//! Execution-time state: workflow instances and their step audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Workflow instance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum WorkflowInstanceStatus {
    /// Waiting on the current step
    Active,

    /// Reached an End step
    Completed,

    /// Stopped before completion
    Cancelled,
}

impl std::fmt::Display for WorkflowInstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome recorded on a step visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum StepInstanceStatus {
    Pending,
    Approved,
    Rejected,
    Returned,
    Skipped,
}

impl StepInstanceStatus {
    /// Map an action name to the status that closes a step.
    ///
    /// "approve", "reject" and "return" (any case) have dedicated statuses;
    /// every other action, e.g. "Submit" or "Escalate", closes as `Skipped`.
    pub fn from_action(action_name: &str) -> Self {
        match action_name.to_lowercase().as_str() {
            "approve" => Self::Approved,
            "reject" => Self::Rejected,
            "return" => Self::Returned,
            _ => Self::Skipped,
        }
    }

    pub fn is_pending(&self) -> bool {
        *self == Self::Pending
    }
}

impl std::fmt::Display for StepInstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Returned => write!(f, "returned"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// One execution of a definition, bound to one request.
///
/// Invariants: `Active` implies a current step that is not an End step;
/// `Completed` implies no current step and a completion timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkflowInstance {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub request_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub current_step_id: Option<Uuid>,
    pub status: WorkflowInstanceStatus,
    /// Optimistic concurrency counter, bumped on every committed change
    pub version: i32,
}

impl WorkflowInstance {
    /// New active instance positioned on `step_id`
    pub fn active(
        definition_id: Uuid,
        request_id: Uuid,
        step_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            definition_id,
            request_id,
            started_at: now,
            completed_at: None,
            current_step_id: Some(step_id),
            status: WorkflowInstanceStatus::Active,
            version: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkflowInstanceStatus::Active
    }

    /// Move to a non-End step
    pub fn move_to(&mut self, step_id: Uuid) {
        self.current_step_id = Some(step_id);
    }

    /// Mark as completed at `now`
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.current_step_id = None;
        self.status = WorkflowInstanceStatus::Completed;
        self.completed_at = Some(now);
    }
}

/// Audit record of one visit to one step.
///
/// Created `Pending` when the step is entered and closed exactly once when
/// the instance moves past it; never changed after that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StepInstance {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub step_id: Uuid,
    pub entered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exited_at: Option<DateTime<Utc>>,
    pub status: StepInstanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_group_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_employee_id: Option<Uuid>,
}

impl StepInstance {
    /// Open a pending visit
    pub fn pending(
        instance_id: Uuid,
        step_id: Uuid,
        assigned_group_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            instance_id,
            step_id,
            entered_at: now,
            exited_at: None,
            status: StepInstanceStatus::Pending,
            assigned_group_id,
            comment: None,
            actor_employee_id: None,
        }
    }

    /// Close this visit with the given outcome
    pub fn closed(mut self, closure: &StepClosure) -> Self {
        self.status = closure.status;
        self.exited_at = Some(closure.exited_at);
        self.actor_employee_id = closure.actor_employee_id;
        self.comment = closure.comment.clone();
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }
}

/// Outcome applied to a pending [`StepInstance`] when the instance leaves it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepClosure {
    pub step_instance_id: Uuid,
    pub status: StepInstanceStatus,
    pub exited_at: DateTime<Utc>,
    pub actor_employee_id: Option<Uuid>,
    pub comment: Option<String>,
}

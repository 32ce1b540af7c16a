// Supporting HR records
//
// Employees, request types, requests and approver groups are managed by the
// surrounding application. The engine only reads them (and links a request to
// its workflow instance), so these stay plain data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Employee {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    pub is_active: bool,
}

impl Employee {
    pub fn new(full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            full_name: full_name.into(),
            email: email.into(),
            department: None,
            position: None,
            is_active: true,
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RequestType {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RequestType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A typed request submitted by an employee.
/// `workflow_instance_id` is written only when a workflow is started for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Request {
    pub id: Uuid,
    pub request_type_id: Uuid,
    pub requester_employee_id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_instance_id: Option<Uuid>,
}

impl Request {
    pub fn new(
        request_type_id: Uuid,
        requester_employee_id: Uuid,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            request_type_id,
            requester_employee_id,
            title: title.into(),
            content: None,
            created_at: Utc::now(),
            workflow_instance_id: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Named set of employees allowed to take guarded transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ApproverGroup {
    pub id: Uuid,
    pub name: String,
    pub members: Vec<Uuid>,
}

impl ApproverGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn with_member(mut self, employee_id: Uuid) -> Self {
        if !self.members.contains(&employee_id) {
            self.members.push(employee_id);
        }
        self
    }

    pub fn contains(&self, employee_id: Uuid) -> bool {
        self.members.contains(&employee_id)
    }
}

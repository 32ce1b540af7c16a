//! Demo data for dev mode
//!
//! Mirrors a fresh installation: a handful of employees, two approver
//! groups, "Leave" and "Mission" request types, an active leave workflow
//! and one sample leave request waiting to be started.

use tracing::{info, instrument};
use uuid::Uuid;

use crate::model::{
    ApproverGroup, Employee, Request, RequestType, Step, StepRole, Transition, WorkflowDefinition,
};
use crate::persistence::{RecordStore, StoreError};

/// Identities of the seeded records that callers usually need next
#[derive(Debug, Clone)]
pub struct DemoData {
    pub admin_id: Uuid,
    pub hr_manager_id: Uuid,
    pub employee_id: Uuid,
    pub hr_managers_group_id: Uuid,
    pub leave_type_id: Uuid,
    pub mission_type_id: Uuid,
    pub leave_definition_id: Uuid,
    pub sample_request_id: Uuid,
}

/// Seed the demo data set. Does nothing and returns `None` when the store
/// already has employees.
#[instrument(skip(store))]
pub async fn seed_demo_data<S: RecordStore + ?Sized>(
    store: &S,
) -> Result<Option<DemoData>, StoreError> {
    if store.count_employees().await? > 0 {
        info!("store already has employees; skipping demo seed");
        return Ok(None);
    }

    let admin = Employee::new("System Admin", "admin@example.com")
        .with_department("IT")
        .with_position("Administrator");
    let hr_manager = Employee::new("HR Manager", "hr.manager@example.com")
        .with_department("HR")
        .with_position("Manager");
    let employee = Employee::new("Sample Employee", "employee@example.com")
        .with_department("Sales")
        .with_position("Sales Representative");
    for e in [&admin, &hr_manager, &employee] {
        store.save_employee(e).await?;
    }

    let hr_managers = ApproverGroup::new("HR Managers").with_member(hr_manager.id);
    let it_admins = ApproverGroup::new("IT Admins").with_member(admin.id);
    store.save_approver_group(&hr_managers).await?;
    store.save_approver_group(&it_admins).await?;

    let leave = RequestType::new("Leave").with_description("Time off from work");
    let mission = RequestType::new("Mission").with_description("Business travel");
    store.save_request_type(&leave).await?;
    store.save_request_type(&mission).await?;

    let definition = leave_workflow(leave.id, hr_managers.id);
    store.save_definition(&definition).await?;

    let request = Request::new(leave.id, employee.id, "Annual leave")
        .with_content("Requesting five days of annual leave.");
    store.save_request(&request).await?;

    info!(
        employees = 3,
        definition_id = %definition.id,
        sample_request_id = %request.id,
        "seeded demo data"
    );

    Ok(Some(DemoData {
        admin_id: admin.id,
        hr_manager_id: hr_manager.id,
        employee_id: employee.id,
        hr_managers_group_id: hr_managers.id,
        leave_type_id: leave.id,
        mission_type_id: mission.id,
        leave_definition_id: definition.id,
        sample_request_id: request.id,
    }))
}

/// Start --Submit--> HR Manager Approval --Approve/Reject [HR Managers]--> End
pub fn leave_workflow(leave_type_id: Uuid, hr_managers_group_id: Uuid) -> WorkflowDefinition {
    let mut definition = WorkflowDefinition::new("Leave Workflow", leave_type_id);

    let start = definition.add_step(Step::new("Start", StepRole::Start));
    let approval = definition.add_step(
        Step::new("HR Manager Approval", StepRole::Task)
            .with_description("An HR manager reviews the leave request")
            .with_approver_group(hr_managers_group_id),
    );
    let end = definition.add_step(Step::new("End", StepRole::End));

    definition.add_transition(Transition::new(start, approval, "Submit"));
    definition.add_transition(
        Transition::new(approval, end, "Approve").with_approver_group(hr_managers_group_id),
    );
    definition.add_transition(
        Transition::new(approval, end, "Reject").with_approver_group(hr_managers_group_id),
    );

    definition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{DefinitionStore, InMemoryWorkflowStore, InstanceStore};

    #[test]
    fn test_leave_workflow_is_valid() {
        let definition = leave_workflow(Uuid::now_v7(), Uuid::now_v7());
        assert!(definition.validate().is_ok());
        assert_eq!(definition.initial_step().unwrap().name, "HR Manager Approval");
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = InMemoryWorkflowStore::new();

        let seeded = seed_demo_data(&store).await.unwrap().unwrap();
        assert_eq!(store.count_employees().await.unwrap(), 3);
        assert!(store
            .is_group_member(seeded.hr_managers_group_id, seeded.hr_manager_id)
            .await
            .unwrap());

        let active = store
            .active_definition(seeded.leave_type_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, seeded.leave_definition_id);
        assert!(store
            .active_definition(seeded.mission_type_id)
            .await
            .unwrap()
            .is_none());

        let request = store.get_request(seeded.sample_request_id).await.unwrap();
        assert_eq!(request.requester_employee_id, seeded.employee_id);
        assert!(request.workflow_instance_id.is_none());

        assert!(seed_demo_data(&store).await.unwrap().is_none());
        assert_eq!(store.count_employees().await.unwrap(), 3);
    }
}

//! PostgreSQL implementation of the workflow stores
//!
//! - Units of work commit in a single transaction
//! - Optimistic concurrency via the instance `version` column
//! - Partial unique indexes back the "one active definition per request
//!   type" and "one pending step instance per instance" rules

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::store::*;
use crate::model::{
    ApproverGroup, Employee, Request, RequestType, Step, StepInstance, StepInstanceStatus,
    StepRole, Transition, WorkflowDefinition, WorkflowInstance, WorkflowInstanceStatus,
};

/// PostgreSQL implementation of the workflow stores
///
/// # Example
///
/// ```ignore
/// use hr_workflow::PostgresWorkflowStore;
/// use sqlx::PgPool;
///
/// let pool = PgPool::connect("postgres://localhost/hr").await?;
/// let store = PostgresWorkflowStore::new(pool);
/// store.migrate().await?;
/// ```
#[derive(Clone)]
pub struct PostgresWorkflowStore {
    pool: PgPool,
}

impl PostgresWorkflowStore {
    /// Create a new PostgreSQL store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        info!("hr workflow migrations applied");
        Ok(())
    }

    async fn load_definition(&self, definition_id: Uuid) -> Result<WorkflowDefinition, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, request_type_id, is_active
            FROM hr_workflow_definitions
            WHERE id = $1
            "#,
        )
        .bind(definition_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(StoreError::DefinitionNotFound(definition_id))?;

        let steps = sqlx::query(
            r#"
            SELECT id, name, role, description, approver_group_id
            FROM hr_workflow_steps
            WHERE definition_id = $1
            ORDER BY position
            "#,
        )
        .bind(definition_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let transitions = sqlx::query(
            r#"
            SELECT id, definition_id, from_step_id, to_step_id, action_name,
                   condition_expression, approver_group_id
            FROM hr_workflow_transitions
            WHERE definition_id = $1
            ORDER BY position
            "#,
        )
        .bind(definition_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(WorkflowDefinition {
            id: row.get("id"),
            name: row.get("name"),
            request_type_id: row.get("request_type_id"),
            is_active: row.get("is_active"),
            steps: steps
                .iter()
                .map(step_from_row)
                .collect::<Result<Vec<_>, _>>()?,
            transitions: transitions.iter().map(transition_from_row).collect(),
        })
    }
}

#[async_trait]
impl DefinitionStore for PostgresWorkflowStore {
    #[instrument(skip(self))]
    async fn active_definition(
        &self,
        request_type_id: Uuid,
    ) -> Result<Option<WorkflowDefinition>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM hr_workflow_definitions
            WHERE request_type_id = $1 AND is_active
            "#,
        )
        .bind(request_type_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        match rows.as_slice() {
            [row] => self.load_definition(row.get("id")).await.map(Some),
            [] => Ok(None),
            many => {
                warn!(%request_type_id, count = many.len(), "multiple active workflow definitions");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_definition(&self, definition_id: Uuid) -> Result<WorkflowDefinition, StoreError> {
        self.load_definition(definition_id).await
    }

    #[instrument(skip(self))]
    async fn is_group_member(&self, group_id: Uuid, employee_id: Uuid) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM hr_approver_group_members
                WHERE group_id = $1 AND employee_id = $2
            ) AS is_member
            "#,
        )
        .bind(group_id)
        .bind(employee_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.get("is_member"))
    }
}

#[async_trait]
impl InstanceStore for PostgresWorkflowStore {
    #[instrument(skip(self))]
    async fn get_request(&self, request_id: Uuid) -> Result<Request, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, request_type_id, requester_employee_id, title, content,
                   created_at, workflow_instance_id
            FROM hr_requests
            WHERE id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(StoreError::RequestNotFound(request_id))?;

        Ok(Request {
            id: row.get("id"),
            request_type_id: row.get("request_type_id"),
            requester_employee_id: row.get("requester_employee_id"),
            title: row.get("title"),
            content: row.get("content"),
            created_at: row.get("created_at"),
            workflow_instance_id: row.get("workflow_instance_id"),
        })
    }

    #[instrument(skip(self))]
    async fn get_instance(&self, instance_id: Uuid) -> Result<WorkflowInstance, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, definition_id, request_id, started_at, completed_at,
                   current_step_id, status, version
            FROM hr_workflow_instances
            WHERE id = $1
            "#,
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(StoreError::InstanceNotFound(instance_id))?;

        instance_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn find_instance_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<WorkflowInstance>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, definition_id, request_id, started_at, completed_at,
                   current_step_id, status, version
            FROM hr_workflow_instances
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(instance_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn list_step_instances(
        &self,
        instance_id: Uuid,
    ) -> Result<Vec<StepInstance>, StoreError> {
        // Distinguish "no history" from "no instance"
        self.get_instance(instance_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT id, instance_id, step_id, entered_at, exited_at, status,
                   assigned_group_id, comment, actor_employee_id
            FROM hr_workflow_step_instances
            WHERE instance_id = $1
            ORDER BY recorded_seq
            "#,
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(step_instance_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn pending_step_instance(
        &self,
        instance_id: Uuid,
        step_id: Uuid,
    ) -> Result<Option<StepInstance>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, instance_id, step_id, entered_at, exited_at, status,
                   assigned_group_id, comment, actor_employee_id
            FROM hr_workflow_step_instances
            WHERE instance_id = $1 AND step_id = $2 AND status = 'pending'
            ORDER BY recorded_seq DESC
            LIMIT 1
            "#,
        )
        .bind(instance_id)
        .bind(step_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(step_instance_from_row).transpose()
    }

    #[instrument(
        skip(self, unit),
        fields(instance_id = %unit.instance.id, create = unit.is_create())
    )]
    async fn commit(&self, unit: UnitOfWork) -> Result<WorkflowInstance, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let instance = &unit.instance;

        match unit.expected_version {
            None => insert_instance(&mut tx, instance).await?,
            Some(expected) => update_instance(&mut tx, instance, expected).await?,
        }

        for closure in &unit.closures {
            let result = sqlx::query(
                r#"
                UPDATE hr_workflow_step_instances
                SET status = $3, exited_at = $4, actor_employee_id = $5, comment = $6
                WHERE id = $1 AND instance_id = $2 AND status = 'pending'
                "#,
            )
            .bind(closure.step_instance_id)
            .bind(instance.id)
            .bind(closure.status.to_string())
            .bind(closure.exited_at)
            .bind(closure.actor_employee_id)
            .bind(&closure.comment)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

            if result.rows_affected() == 0 {
                return Err(StoreError::StepAlreadyClosed {
                    instance_id: instance.id,
                    step_instance_id: closure.step_instance_id,
                });
            }
        }

        for step in &unit.new_steps {
            sqlx::query(
                r#"
                INSERT INTO hr_workflow_step_instances
                    (id, instance_id, step_id, entered_at, exited_at, status,
                     assigned_group_id, comment, actor_employee_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(step.id)
            .bind(step.instance_id)
            .bind(step.step_id)
            .bind(step.entered_at)
            .bind(step.exited_at)
            .bind(step.status.to_string())
            .bind(step.assigned_group_id)
            .bind(&step.comment)
            .bind(step.actor_employee_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::PendingStepConflict(instance.id)
                } else {
                    db_error(e)
                }
            })?;
        }

        tx.commit().await.map_err(db_error)?;

        debug!(
            version = instance.version,
            closed = unit.closures.len(),
            appended = unit.new_steps.len(),
            "committed unit of work"
        );
        Ok(unit.instance)
    }
}

#[async_trait]
impl RecordStore for PostgresWorkflowStore {
    #[instrument(skip(self, employee), fields(employee_id = %employee.id))]
    async fn save_employee(&self, employee: &Employee) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO hr_employees (id, full_name, email, department, position, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                full_name = EXCLUDED.full_name,
                email = EXCLUDED.email,
                department = EXCLUDED.department,
                position = EXCLUDED.position,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(employee.id)
        .bind(&employee.full_name)
        .bind(&employee.email)
        .bind(&employee.department)
        .bind(&employee.position)
        .bind(employee.is_active)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, request_type), fields(request_type_id = %request_type.id))]
    async fn save_request_type(&self, request_type: &RequestType) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO hr_request_types (id, name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description
            "#,
        )
        .bind(request_type.id)
        .bind(&request_type.name)
        .bind(&request_type.description)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(request_id = %request.id))]
    async fn save_request(&self, request: &Request) -> Result<(), StoreError> {
        // workflow_instance_id is written only by commit
        sqlx::query(
            r#"
            INSERT INTO hr_requests
                (id, request_type_id, requester_employee_id, title, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                content = EXCLUDED.content
            "#,
        )
        .bind(request.id)
        .bind(request.request_type_id)
        .bind(request.requester_employee_id)
        .bind(&request.title)
        .bind(&request.content)
        .bind(request.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, group), fields(group_id = %group.id))]
    async fn save_approver_group(&self, group: &ApproverGroup) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(
            r#"
            INSERT INTO hr_approver_groups (id, name)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(group.id)
        .bind(&group.name)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query("DELETE FROM hr_approver_group_members WHERE group_id = $1")
            .bind(group.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        for employee_id in &group.members {
            sqlx::query(
                "INSERT INTO hr_approver_group_members (group_id, employee_id) VALUES ($1, $2)",
            )
            .bind(group.id)
            .bind(employee_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, definition), fields(definition_id = %definition.id))]
    async fn save_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        definition.validate()?;

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        if definition.is_active {
            sqlx::query(
                r#"
                UPDATE hr_workflow_definitions SET is_active = FALSE
                WHERE request_type_id = $1 AND is_active
                "#,
            )
            .bind(definition.request_type_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        sqlx::query(
            r#"
            INSERT INTO hr_workflow_definitions (id, name, request_type_id, is_active)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(definition.id)
        .bind(&definition.name)
        .bind(definition.request_type_id)
        .bind(definition.is_active)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        for (position, step) in definition.steps.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO hr_workflow_steps
                    (id, definition_id, position, name, role, description, approver_group_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(step.id)
            .bind(definition.id)
            .bind(position as i32)
            .bind(&step.name)
            .bind(step.role.to_string())
            .bind(&step.description)
            .bind(step.approver_group_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        for (position, transition) in definition.transitions.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO hr_workflow_transitions
                    (id, definition_id, position, from_step_id, to_step_id, action_name,
                     condition_expression, approver_group_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(transition.id)
            .bind(definition.id)
            .bind(position as i32)
            .bind(transition.from_step_id)
            .bind(transition.to_step_id)
            .bind(&transition.action_name)
            .bind(&transition.condition_expression)
            .bind(transition.approver_group_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;

        debug!(
            steps = definition.steps.len(),
            transitions = definition.transitions.len(),
            "saved workflow definition"
        );
        Ok(())
    }

    async fn count_employees(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM hr_employees")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(row.get::<i64, _>("count") as usize)
    }
}

// ============================================
// Unit of work helpers
// ============================================

async fn insert_instance(
    tx: &mut Transaction<'_, Postgres>,
    instance: &WorkflowInstance,
) -> Result<(), StoreError> {
    let request_id = instance.request_id;

    // Lock the request row so concurrent starts serialize here
    let row = sqlx::query("SELECT workflow_instance_id FROM hr_requests WHERE id = $1 FOR UPDATE")
        .bind(request_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error)?
        .ok_or(StoreError::RequestNotFound(request_id))?;

    let linked: Option<Uuid> = row.get("workflow_instance_id");
    if linked.is_some() {
        return Err(StoreError::RequestAlreadyLinked(request_id));
    }

    sqlx::query(
        r#"
        INSERT INTO hr_workflow_instances
            (id, definition_id, request_id, started_at, completed_at, current_step_id, status, version)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(instance.id)
    .bind(instance.definition_id)
    .bind(request_id)
    .bind(instance.started_at)
    .bind(instance.completed_at)
    .bind(instance.current_step_id)
    .bind(instance.status.to_string())
    .bind(instance.version)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::RequestAlreadyLinked(request_id)
        } else {
            db_error(e)
        }
    })?;

    sqlx::query("UPDATE hr_requests SET workflow_instance_id = $2 WHERE id = $1")
        .bind(request_id)
        .bind(instance.id)
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;

    Ok(())
}

async fn update_instance(
    tx: &mut Transaction<'_, Postgres>,
    instance: &WorkflowInstance,
    expected: i32,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE hr_workflow_instances
        SET current_step_id = $3, status = $4, completed_at = $5, version = $6
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(instance.id)
    .bind(expected)
    .bind(instance.current_step_id)
    .bind(instance.status.to_string())
    .bind(instance.completed_at)
    .bind(instance.version)
    .execute(&mut **tx)
    .await
    .map_err(db_error)?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let row = sqlx::query("SELECT version FROM hr_workflow_instances WHERE id = $1")
        .bind(instance.id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error)?
        .ok_or(StoreError::InstanceNotFound(instance.id))?;

    Err(StoreError::ConcurrencyConflict {
        instance_id: instance.id,
        expected,
        actual: row.get("version"),
    })
}

// ============================================
// Row mapping
// ============================================

fn db_error(e: sqlx::Error) -> StoreError {
    error!("database error: {}", e);
    StoreError::Database(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

fn step_from_row(row: &PgRow) -> Result<Step, StoreError> {
    let role: String = row.get("role");
    Ok(Step {
        id: row.get("id"),
        name: row.get("name"),
        role: parse_step_role(&role)?,
        description: row.get("description"),
        approver_group_id: row.get("approver_group_id"),
    })
}

fn transition_from_row(row: &PgRow) -> Transition {
    Transition {
        id: row.get("id"),
        definition_id: row.get("definition_id"),
        from_step_id: row.get("from_step_id"),
        to_step_id: row.get("to_step_id"),
        action_name: row.get("action_name"),
        condition_expression: row.get("condition_expression"),
        approver_group_id: row.get("approver_group_id"),
    }
}

fn instance_from_row(row: &PgRow) -> Result<WorkflowInstance, StoreError> {
    let status: String = row.get("status");
    Ok(WorkflowInstance {
        id: row.get("id"),
        definition_id: row.get("definition_id"),
        request_id: row.get("request_id"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        current_step_id: row.get("current_step_id"),
        status: parse_instance_status(&status)?,
        version: row.get("version"),
    })
}

fn step_instance_from_row(row: &PgRow) -> Result<StepInstance, StoreError> {
    let status: String = row.get("status");
    Ok(StepInstance {
        id: row.get("id"),
        instance_id: row.get("instance_id"),
        step_id: row.get("step_id"),
        entered_at: row.get("entered_at"),
        exited_at: row.get("exited_at"),
        status: parse_step_instance_status(&status)?,
        assigned_group_id: row.get("assigned_group_id"),
        comment: row.get("comment"),
        actor_employee_id: row.get("actor_employee_id"),
    })
}

fn parse_step_role(role: &str) -> Result<StepRole, StoreError> {
    match role {
        "start" => Ok(StepRole::Start),
        "task" => Ok(StepRole::Task),
        "decision" => Ok(StepRole::Decision),
        "end" => Ok(StepRole::End),
        _ => Err(StoreError::Database(format!("Unknown step role: {}", role))),
    }
}

fn parse_instance_status(status: &str) -> Result<WorkflowInstanceStatus, StoreError> {
    match status {
        "active" => Ok(WorkflowInstanceStatus::Active),
        "completed" => Ok(WorkflowInstanceStatus::Completed),
        "cancelled" => Ok(WorkflowInstanceStatus::Cancelled),
        _ => Err(StoreError::Database(format!(
            "Unknown workflow instance status: {}",
            status
        ))),
    }
}

fn parse_step_instance_status(status: &str) -> Result<StepInstanceStatus, StoreError> {
    match status {
        "pending" => Ok(StepInstanceStatus::Pending),
        "approved" => Ok(StepInstanceStatus::Approved),
        "rejected" => Ok(StepInstanceStatus::Rejected),
        "returned" => Ok(StepInstanceStatus::Returned),
        "skipped" => Ok(StepInstanceStatus::Skipped),
        _ => Err(StoreError::Database(format!(
            "Unknown step instance status: {}",
            status
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_display() {
        for role in [StepRole::Start, StepRole::Task, StepRole::Decision, StepRole::End] {
            assert_eq!(parse_step_role(&role.to_string()).unwrap(), role);
        }
        for status in [
            WorkflowInstanceStatus::Active,
            WorkflowInstanceStatus::Completed,
            WorkflowInstanceStatus::Cancelled,
        ] {
            assert_eq!(parse_instance_status(&status.to_string()).unwrap(), status);
        }
        for status in [
            StepInstanceStatus::Pending,
            StepInstanceStatus::Approved,
            StepInstanceStatus::Rejected,
            StepInstanceStatus::Returned,
            StepInstanceStatus::Skipped,
        ] {
            assert_eq!(parse_step_instance_status(&status.to_string()).unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_values_are_database_errors() {
        assert!(matches!(parse_step_role("gateway"), Err(StoreError::Database(_))));
        assert!(matches!(parse_instance_status("paused"), Err(StoreError::Database(_))));
        assert!(matches!(parse_step_instance_status("done"), Err(StoreError::Database(_))));
    }
}

//! Task CRUD with central invariant enforcement.
//!
//! Every write validates the model invariants from the data contract:
//! percent/status/completion coupling, date ordering and assignee
//! uniqueness. Mutations honor the lock contract (no lock, or a live lock
//! held by the acting user) and refresh the plan fingerprint in the same
//! transaction.

use jiff::Timestamp;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{DatabaseResultExt, PlannerError, Result};
use crate::models::{Task, TaskStatus, UpdateTaskRequest};

use super::utils::{
    parse_enum, parse_string_list, parse_timestamp, parse_timestamp_opt, to_json_list,
};

const TASK_COLUMNS: &str = "plan_id, task_id, title, bucket_id, status, percent_complete, start_date, due_date, completed_date, priority, assignees, assignee_names, applied_categories, description, order_hint, created_at, last_modified_at, created_by, completed_by";

const INSERT_TASK_SQL: &str = "INSERT INTO tasks (plan_id, task_id, title, bucket_id, status, percent_complete, start_date, due_date, completed_date, priority, assignees, assignee_names, applied_categories, description, order_hint, created_at, last_modified_at, created_by, completed_by) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)";
const UPDATE_TASK_SQL: &str = "UPDATE tasks SET title = ?3, bucket_id = ?4, status = ?5, percent_complete = ?6, start_date = ?7, due_date = ?8, completed_date = ?9, priority = ?10, assignees = ?11, assignee_names = ?12, applied_categories = ?13, description = ?14, order_hint = ?15, last_modified_at = ?16, completed_by = ?17 WHERE plan_id = ?1 AND task_id = ?2";
const DELETE_TASK_SQL: &str = "DELETE FROM tasks WHERE plan_id = ?1 AND task_id = ?2";
const CHECK_BUCKET_SQL: &str =
    "SELECT EXISTS(SELECT 1 FROM buckets WHERE plan_id = ?1 AND bucket_id = ?2)";
const MAX_ORDER_HINT_SQL: &str =
    "SELECT MAX(order_hint) FROM tasks WHERE plan_id = ?1 AND bucket_id = ?2";

fn task_from_row(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    Ok(Task {
        plan_id: row.get(0)?,
        task_id: row.get(1)?,
        title: row.get(2)?,
        bucket_id: row.get(3)?,
        status: parse_enum::<TaskStatus>(4, row.get(4)?)?,
        percent_complete: row.get::<_, i64>(5)?.clamp(0, 100) as u8,
        start_date: parse_timestamp_opt(6, row.get(6)?)?,
        due_date: parse_timestamp_opt(7, row.get(7)?)?,
        completed_date: parse_timestamp_opt(8, row.get(8)?)?,
        priority: row.get::<_, i64>(9)?.clamp(0, 10) as u8,
        assignees: parse_string_list(row.get(10)?),
        assignee_names: parse_string_list(row.get(11)?),
        applied_categories: parse_string_list(row.get(12)?),
        description: row.get(13)?,
        order_hint: row.get(14)?,
        created_at: parse_timestamp(15, row.get(15)?)?,
        last_modified_at: parse_timestamp(16, row.get(16)?)?,
        created_by: row.get(17)?,
        completed_by: row.get(18)?,
    })
}

/// Validates the cross-field task invariants. Called on every write.
pub(super) fn validate_task(task: &Task) -> Result<()> {
    if task.title.trim().is_empty() {
        return Err(PlannerError::invalid_input("title", "must not be empty"));
    }
    if task.percent_complete > 100 {
        return Err(PlannerError::invalid_input(
            "percent_complete",
            "must be between 0 and 100",
        ));
    }
    if task.priority > 10 {
        return Err(PlannerError::invalid_input(
            "priority",
            "must be between 0 and 10",
        ));
    }
    match task.status {
        TaskStatus::NotStarted if task.percent_complete != 0 => {
            return Err(PlannerError::invalid_input(
                "percent_complete",
                "must be 0 while the task is not started",
            ));
        }
        TaskStatus::Completed if task.percent_complete != 100 => {
            return Err(PlannerError::invalid_input(
                "percent_complete",
                "must be 100 when the task is completed",
            ));
        }
        _ => {}
    }
    if task.percent_complete == 100 && task.status != TaskStatus::Completed {
        return Err(PlannerError::invalid_input(
            "percent_complete",
            "100 percent requires completed status",
        ));
    }
    if (task.status == TaskStatus::Completed) != task.completed_date.is_some() {
        return Err(PlannerError::invalid_input(
            "completed_date",
            "must be present exactly when status is completed",
        ));
    }
    if let (Some(start), Some(due)) = (task.start_date, task.due_date) {
        if start > due {
            return Err(PlannerError::invalid_input(
                "start_date",
                "must not be after the due date",
            ));
        }
    }
    let mut seen = std::collections::HashSet::new();
    for assignee in &task.assignees {
        if !seen.insert(assignee.as_str()) {
            return Err(PlannerError::invalid_input(
                "assignees",
                "duplicate assignees are not allowed",
            ));
        }
    }
    Ok(())
}

pub(super) fn require_bucket(conn: &Connection, plan_id: &str, bucket_id: &str) -> Result<()> {
    let exists: bool = conn
        .query_row(CHECK_BUCKET_SQL, params![plan_id, bucket_id], |row| {
            row.get(0)
        })
        .db_context("Failed to check bucket existence")?;
    if exists {
        Ok(())
    } else {
        Err(PlannerError::invalid_input(
            "bucket_id",
            &format!("unknown bucket '{bucket_id}'"),
        ))
    }
}

pub(super) fn load_tasks(conn: &Connection, plan_id: &str) -> Result<Vec<Task>> {
    let sql =
        format!("SELECT {TASK_COLUMNS} FROM tasks WHERE plan_id = ?1 ORDER BY order_hint, task_id");
    let mut stmt = conn.prepare(&sql).db_context("Failed to prepare task query")?;
    let tasks = stmt
        .query_map(params![plan_id], task_from_row)
        .db_context("Failed to query tasks")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .db_context("Failed to fetch tasks")?;
    Ok(tasks)
}

pub(super) fn load_task(
    conn: &Connection,
    plan_id: &str,
    task_id: &str,
) -> Result<Option<Task>> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE plan_id = ?1 AND task_id = ?2");
    conn.query_row(&sql, params![plan_id, task_id], task_from_row)
        .optional()
        .db_context("Failed to query task")
}

pub(super) fn require_task(conn: &Connection, plan_id: &str, task_id: &str) -> Result<Task> {
    load_task(conn, plan_id, task_id)?
        .ok_or_else(|| PlannerError::task_not_found(plan_id, task_id))
}

pub(super) fn insert_task(conn: &Connection, task: &Task) -> Result<()> {
    validate_task(task)?;
    require_bucket(conn, &task.plan_id, &task.bucket_id)?;
    conn.execute(
        INSERT_TASK_SQL,
        params![
            task.plan_id,
            task.task_id,
            task.title,
            task.bucket_id,
            task.status.as_str(),
            i64::from(task.percent_complete),
            task.start_date.map(|d| d.to_string()),
            task.due_date.map(|d| d.to_string()),
            task.completed_date.map(|d| d.to_string()),
            i64::from(task.priority),
            to_json_list(&task.assignees),
            to_json_list(&task.assignee_names),
            to_json_list(&task.applied_categories),
            task.description,
            task.order_hint,
            task.created_at.to_string(),
            task.last_modified_at.to_string(),
            task.created_by,
            task.completed_by
        ],
    )
    .db_context("Failed to insert task")?;
    Ok(())
}

pub(super) fn persist_task(conn: &Connection, task: &Task) -> Result<()> {
    validate_task(task)?;
    conn.execute(
        UPDATE_TASK_SQL,
        params![
            task.plan_id,
            task.task_id,
            task.title,
            task.bucket_id,
            task.status.as_str(),
            i64::from(task.percent_complete),
            task.start_date.map(|d| d.to_string()),
            task.due_date.map(|d| d.to_string()),
            task.completed_date.map(|d| d.to_string()),
            i64::from(task.priority),
            to_json_list(&task.assignees),
            to_json_list(&task.assignee_names),
            to_json_list(&task.applied_categories),
            task.description,
            task.order_hint,
            task.last_modified_at.to_string(),
            task.completed_by
        ],
    )
    .db_context("Failed to update task")?;
    Ok(())
}

/// Applies a partial update to an owned task value, enforcing percent
/// monotonicity and the status/completion coupling.
pub(super) fn apply_update(
    task: &mut Task,
    update: &UpdateTaskRequest,
    now: Timestamp,
) -> Result<()> {
    if let Some(title) = &update.title {
        task.title = title.clone();
    }
    if let Some(bucket_id) = &update.bucket_id {
        task.bucket_id = bucket_id.clone();
    }
    if let Some(percent) = update.percent_complete {
        if percent < task.percent_complete {
            return Err(PlannerError::invalid_input(
                "percent_complete",
                "must be monotone non-decreasing",
            ));
        }
        task.percent_complete = percent;
    }
    if let Some(status) = update.status {
        task.status = status;
        match status {
            TaskStatus::Completed => {
                task.percent_complete = 100;
                if task.completed_date.is_none() {
                    task.completed_date = Some(now);
                }
                if task.completed_by.is_none() {
                    task.completed_by = update.acting_user.clone();
                }
            }
            _ => {
                task.completed_date = None;
                task.completed_by = None;
            }
        }
    } else if update.percent_complete == Some(100) {
        task.status = TaskStatus::Completed;
        task.completed_date = Some(now);
        task.completed_by = update.acting_user.clone();
    }
    if let Some(start) = update.start_date {
        task.start_date = start;
    }
    if let Some(due) = update.due_date {
        task.due_date = due;
    }
    if let Some(priority) = update.priority {
        task.priority = priority;
    }
    if let Some(assignees) = &update.assignees {
        task.assignees = assignees.clone();
    }
    if let Some(names) = &update.assignee_names {
        task.assignee_names = names.clone();
    }
    if let Some(categories) = &update.applied_categories {
        task.applied_categories = categories.clone();
    }
    if let Some(description) = &update.description {
        task.description = description.clone();
    }
    if let Some(order_hint) = &update.order_hint {
        task.order_hint = order_hint.clone();
    }
    task.last_modified_at = now;
    Ok(())
}

impl super::Database {
    /// Creates a task. The order hint, when empty, is generated to sort
    /// after every existing task in the bucket.
    pub fn create_task(
        &mut self,
        mut task: Task,
        acting_user: Option<&str>,
        now: Timestamp,
    ) -> Result<Task> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        super::plan_queries::require_plan(&tx, &task.plan_id)?;
        if load_task(&tx, &task.plan_id, &task.task_id)?.is_some() {
            return Err(PlannerError::invalid_input(
                "task_id",
                "a task with this id already exists in the plan",
            ));
        }
        super::lock_queries::ensure_writable(&tx, &task.plan_id, &task.task_id, acting_user, now)?;

        if task.order_hint.is_empty() {
            let max_hint: Option<String> = tx
                .query_row(
                    MAX_ORDER_HINT_SQL,
                    params![task.plan_id, task.bucket_id],
                    |row| row.get(0),
                )
                .db_context("Failed to read max order hint")?;
            task.order_hint = crate::order_hint::last(max_hint.as_deref());
        }
        task.created_at = now;
        task.last_modified_at = now;
        if task.created_by.is_none() {
            task.created_by = acting_user.map(str::to_string);
        }

        insert_task(&tx, &task)?;
        super::plan_queries::touch_plan(&tx, &task.plan_id, now)?;
        super::sync_queries::refresh_fingerprint(&tx, &task.plan_id)?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(task)
    }

    /// Retrieves a task.
    pub fn get_task(&self, plan_id: &str, task_id: &str) -> Result<Option<Task>> {
        load_task(&self.connection, plan_id, task_id)
    }

    /// All tasks of a plan in order-hint order.
    pub fn get_tasks(&self, plan_id: &str) -> Result<Vec<Task>> {
        super::plan_queries::require_plan(&self.connection, plan_id)?;
        load_tasks(&self.connection, plan_id)
    }

    /// Applies a partial update to a task.
    pub fn update_task(
        &mut self,
        plan_id: &str,
        task_id: &str,
        update: &UpdateTaskRequest,
        now: Timestamp,
    ) -> Result<Task> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        let mut task = require_task(&tx, plan_id, task_id)?;
        super::lock_queries::ensure_writable(
            &tx,
            plan_id,
            task_id,
            update.acting_user.as_deref(),
            now,
        )?;
        if let Some(bucket_id) = &update.bucket_id {
            require_bucket(&tx, plan_id, bucket_id)?;
        }
        apply_update(&mut task, update, now)?;
        persist_task(&tx, &task)?;
        super::plan_queries::touch_plan(&tx, plan_id, now)?;
        super::sync_queries::refresh_fingerprint(&tx, plan_id)?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(task)
    }

    /// Deletes a task, its subtasks and its dependency edges.
    pub fn delete_task(
        &mut self,
        plan_id: &str,
        task_id: &str,
        acting_user: Option<&str>,
        now: Timestamp,
    ) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        require_task(&tx, plan_id, task_id)?;
        super::lock_queries::ensure_writable(&tx, plan_id, task_id, acting_user, now)?;

        tx.execute(
            "DELETE FROM dependencies WHERE plan_id = ?1 AND (predecessor_id = ?2 OR successor_id = ?2)",
            params![plan_id, task_id],
        )
        .db_context("Failed to delete task dependencies")?;
        tx.execute(
            "DELETE FROM task_locks WHERE plan_id = ?1 AND task_id = ?2",
            params![plan_id, task_id],
        )
        .db_context("Failed to delete task lock")?;
        // Subtasks cascade via the composite foreign key.
        tx.execute(DELETE_TASK_SQL, params![plan_id, task_id])
            .db_context("Failed to delete task")?;

        super::plan_queries::touch_plan(&tx, plan_id, now)?;
        super::sync_queries::refresh_fingerprint(&tx, plan_id)?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(())
    }
}

//! Checklist item (subtask) operations.

use jiff::Timestamp;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{DatabaseResultExt, PlannerError, Result};
use crate::models::{Subtask, UpdateSubtaskRequest};

use super::utils::parse_timestamp;

const INSERT_SUBTASK_SQL: &str = "INSERT INTO subtasks (plan_id, task_id, subtask_id, title, is_checked, order_hint, last_modified_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";
const UPDATE_SUBTASK_SQL: &str = "UPDATE subtasks SET title = ?4, is_checked = ?5, order_hint = ?6, last_modified_at = ?7 WHERE plan_id = ?1 AND task_id = ?2 AND subtask_id = ?3";
const DELETE_SUBTASK_SQL: &str =
    "DELETE FROM subtasks WHERE plan_id = ?1 AND task_id = ?2 AND subtask_id = ?3";
const SELECT_SUBTASKS_SQL: &str = "SELECT subtask_id, title, is_checked, order_hint, last_modified_at FROM subtasks WHERE plan_id = ?1 AND task_id = ?2 ORDER BY order_hint, subtask_id";
const SELECT_SUBTASK_SQL: &str = "SELECT subtask_id, title, is_checked, order_hint, last_modified_at FROM subtasks WHERE plan_id = ?1 AND task_id = ?2 AND subtask_id = ?3";
const MAX_SUBTASK_HINT_SQL: &str =
    "SELECT MAX(order_hint) FROM subtasks WHERE plan_id = ?1 AND task_id = ?2";

fn subtask_from_row(row: &rusqlite::Row) -> rusqlite::Result<Subtask> {
    Ok(Subtask {
        subtask_id: row.get(0)?,
        title: row.get(1)?,
        is_checked: row.get(2)?,
        order_hint: row.get(3)?,
        last_modified_at: parse_timestamp(4, row.get(4)?)?,
    })
}

pub(super) fn load_subtasks(
    conn: &Connection,
    plan_id: &str,
    task_id: &str,
) -> Result<Vec<Subtask>> {
    let mut stmt = conn
        .prepare(SELECT_SUBTASKS_SQL)
        .db_context("Failed to prepare subtask query")?;
    let subtasks = stmt
        .query_map(params![plan_id, task_id], subtask_from_row)
        .db_context("Failed to query subtasks")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .db_context("Failed to fetch subtasks")?;
    Ok(subtasks)
}

pub(super) fn insert_subtask(
    conn: &Connection,
    plan_id: &str,
    task_id: &str,
    subtask: &Subtask,
) -> Result<()> {
    conn.execute(
        INSERT_SUBTASK_SQL,
        params![
            plan_id,
            task_id,
            subtask.subtask_id,
            subtask.title,
            subtask.is_checked,
            subtask.order_hint,
            subtask.last_modified_at.to_string()
        ],
    )
    .db_context("Failed to insert subtask")?;
    Ok(())
}

impl super::Database {
    /// Adds a checklist item to a task.
    #[allow(clippy::too_many_arguments)]
    pub fn add_subtask(
        &mut self,
        plan_id: &str,
        task_id: &str,
        subtask_id: &str,
        title: &str,
        acting_user: Option<&str>,
        now: Timestamp,
    ) -> Result<Subtask> {
        if title.trim().is_empty() {
            return Err(PlannerError::invalid_input("title", "must not be empty"));
        }
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        super::task_queries::require_task(&tx, plan_id, task_id)?;
        super::lock_queries::ensure_writable(&tx, plan_id, task_id, acting_user, now)?;

        let max_hint: Option<String> = tx
            .query_row(MAX_SUBTASK_HINT_SQL, params![plan_id, task_id], |row| {
                row.get(0)
            })
            .db_context("Failed to read max subtask order hint")?;
        let subtask = Subtask {
            subtask_id: subtask_id.to_string(),
            title: title.to_string(),
            is_checked: false,
            order_hint: crate::order_hint::last(max_hint.as_deref()),
            last_modified_at: now,
        };
        insert_subtask(&tx, plan_id, task_id, &subtask)?;
        super::plan_queries::touch_plan(&tx, plan_id, now)?;
        super::sync_queries::refresh_fingerprint(&tx, plan_id)?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(subtask)
    }

    /// Applies a partial update to a checklist item.
    #[allow(clippy::too_many_arguments)]
    pub fn update_subtask(
        &mut self,
        plan_id: &str,
        task_id: &str,
        subtask_id: &str,
        update: &UpdateSubtaskRequest,
        acting_user: Option<&str>,
        now: Timestamp,
    ) -> Result<Subtask> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        super::lock_queries::ensure_writable(&tx, plan_id, task_id, acting_user, now)?;
        let mut subtask = tx
            .query_row(
                SELECT_SUBTASK_SQL,
                params![plan_id, task_id, subtask_id],
                subtask_from_row,
            )
            .optional()
            .db_context("Failed to query subtask")?
            .ok_or_else(|| PlannerError::SubtaskNotFound {
                task_id: task_id.to_string(),
                subtask_id: subtask_id.to_string(),
            })?;

        if let Some(title) = &update.title {
            subtask.title = title.clone();
        }
        if let Some(is_checked) = update.is_checked {
            subtask.is_checked = is_checked;
        }
        if let Some(order_hint) = &update.order_hint {
            subtask.order_hint = order_hint.clone();
        }
        subtask.last_modified_at = now;

        tx.execute(
            UPDATE_SUBTASK_SQL,
            params![
                plan_id,
                task_id,
                subtask_id,
                subtask.title,
                subtask.is_checked,
                subtask.order_hint,
                subtask.last_modified_at.to_string()
            ],
        )
        .db_context("Failed to update subtask")?;
        super::plan_queries::touch_plan(&tx, plan_id, now)?;
        super::sync_queries::refresh_fingerprint(&tx, plan_id)?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(subtask)
    }

    /// Removes a checklist item.
    pub fn delete_subtask(
        &mut self,
        plan_id: &str,
        task_id: &str,
        subtask_id: &str,
        acting_user: Option<&str>,
        now: Timestamp,
    ) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        super::lock_queries::ensure_writable(&tx, plan_id, task_id, acting_user, now)?;
        let deleted = tx
            .execute(DELETE_SUBTASK_SQL, params![plan_id, task_id, subtask_id])
            .db_context("Failed to delete subtask")?;
        if deleted == 0 {
            return Err(PlannerError::SubtaskNotFound {
                task_id: task_id.to_string(),
                subtask_id: subtask_id.to_string(),
            });
        }
        super::plan_queries::touch_plan(&tx, plan_id, now)?;
        super::sync_queries::refresh_fingerprint(&tx, plan_id)?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(())
    }

    /// Checklist items of a task in order-hint order.
    pub fn get_subtasks(&self, plan_id: &str, task_id: &str) -> Result<Vec<Subtask>> {
        super::task_queries::require_task(&self.connection, plan_id, task_id)?;
        load_subtasks(&self.connection, plan_id, task_id)
    }
}

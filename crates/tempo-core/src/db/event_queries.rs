//! External events and proposed actions, including the approve-and-apply
//! transaction of the human-in-the-loop workflow.

use jiff::Timestamp;
use rusqlite::{params, Connection, OptionalExtension};

use crate::dates::add_days;
use crate::error::{DatabaseResultExt, PlannerError, Result};
use crate::models::{ActionStatus, ExternalEvent, ProposedAction, Severity};
use crate::workflow::{self, ActionDraft};

use super::utils::{
    parse_enum, parse_json_map, parse_string_list, parse_timestamp, parse_timestamp_opt,
    to_json_list, to_json_map,
};

const INSERT_EVENT_SQL: &str = "INSERT INTO external_events (plan_id, event_type, title, description, severity, affected_task_ids, payload, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
const SELECT_EVENT_COLUMNS: &str = "id, plan_id, event_type, title, description, severity, affected_task_ids, payload, created_at, acknowledged_at";
const INSERT_ACTION_SQL: &str = "INSERT INTO proposed_actions (plan_id, external_event_id, task_id, action_type, title, description, payload, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
const SELECT_ACTION_COLUMNS: &str = "id, plan_id, external_event_id, task_id, action_type, title, description, payload, status, created_at, decided_at, decided_by";
const UPDATE_ACTION_STATUS_SQL: &str = "UPDATE proposed_actions SET status = ?3, decided_at = ?4, decided_by = ?5 WHERE plan_id = ?1 AND id = ?2";

fn event_from_row(row: &rusqlite::Row) -> rusqlite::Result<ExternalEvent> {
    Ok(ExternalEvent {
        id: row.get(0)?,
        plan_id: row.get(1)?,
        event_type: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        severity: parse_enum::<Severity>(5, row.get(5)?)?,
        affected_task_ids: parse_string_list(row.get(6)?),
        payload: parse_json_map(row.get(7)?),
        created_at: parse_timestamp(8, row.get(8)?)?,
        acknowledged_at: parse_timestamp_opt(9, row.get(9)?)?,
    })
}

fn action_from_row(row: &rusqlite::Row) -> rusqlite::Result<ProposedAction> {
    Ok(ProposedAction {
        id: row.get(0)?,
        plan_id: row.get(1)?,
        external_event_id: row.get(2)?,
        task_id: row.get(3)?,
        action_type: row.get(4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        payload: parse_json_map(row.get(7)?),
        status: parse_enum::<ActionStatus>(8, row.get(8)?)?,
        created_at: parse_timestamp(9, row.get(9)?)?,
        decided_at: parse_timestamp_opt(10, row.get(10)?)?,
        decided_by: row.get(11)?,
    })
}

fn load_action(conn: &Connection, plan_id: &str, action_id: i64) -> Result<Option<ProposedAction>> {
    let sql =
        format!("SELECT {SELECT_ACTION_COLUMNS} FROM proposed_actions WHERE plan_id = ?1 AND id = ?2");
    conn.query_row(&sql, params![plan_id, action_id], action_from_row)
        .optional()
        .db_context("Failed to query proposed action")
}

fn insert_action_draft(
    conn: &Connection,
    plan_id: &str,
    event_id: i64,
    draft: &ActionDraft,
    now: Timestamp,
) -> Result<ProposedAction> {
    conn.execute(
        INSERT_ACTION_SQL,
        params![
            plan_id,
            event_id,
            draft.task_id,
            draft.action_type,
            draft.title,
            draft.description,
            to_json_map(&draft.payload),
            ActionStatus::Pending.as_str(),
            now.to_string()
        ],
    )
    .db_context("Failed to insert proposed action")?;
    let id = conn.last_insert_rowid();
    Ok(ProposedAction {
        id,
        plan_id: plan_id.to_string(),
        external_event_id: Some(event_id),
        task_id: draft.task_id.clone(),
        action_type: draft.action_type.clone(),
        title: draft.title.clone(),
        description: Some(draft.description.clone()),
        payload: draft.payload.clone(),
        status: ActionStatus::Pending,
        created_at: now,
        decided_at: None,
        decided_by: None,
    })
}

impl super::Database {
    /// Persists an external event and derives its proposed actions from the
    /// rule table, all in one transaction.
    #[allow(clippy::too_many_arguments)]
    pub fn ingest_event(
        &mut self,
        plan_id: &str,
        event_type: &str,
        title: Option<&str>,
        description: Option<&str>,
        severity: Severity,
        affected_task_ids: &[String],
        payload: serde_json::Map<String, serde_json::Value>,
        now: Timestamp,
    ) -> Result<(ExternalEvent, Vec<ProposedAction>)> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        super::plan_queries::require_plan(&tx, plan_id)?;

        let title = match title {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => workflow::default_event_title(event_type),
        };

        tx.execute(
            INSERT_EVENT_SQL,
            params![
                plan_id,
                event_type,
                title,
                description,
                severity.as_str(),
                to_json_list(affected_task_ids),
                to_json_map(&payload),
                now.to_string()
            ],
        )
        .db_context("Failed to insert external event")?;
        let event_id = tx.last_insert_rowid();

        let event = ExternalEvent {
            id: event_id,
            plan_id: plan_id.to_string(),
            event_type: event_type.to_string(),
            title,
            description: description.map(str::to_string),
            severity,
            affected_task_ids: affected_task_ids.to_vec(),
            payload,
            created_at: now,
            acknowledged_at: None,
        };

        // Resolve affected tasks; with none named, fall back to in-flight
        // tasks so known event types still yield a reviewable proposal.
        let tasks = super::task_queries::load_tasks(&tx, plan_id)?;
        let targets: Vec<&crate::models::Task> = if affected_task_ids.is_empty() {
            tasks
                .iter()
                .filter(|t| workflow::is_proposal_candidate(t))
                .take(2)
                .collect()
        } else {
            tasks
                .iter()
                .filter(|t| affected_task_ids.contains(&t.task_id))
                .collect()
        };

        let mut actions = Vec::new();
        for draft in workflow::propose_actions(&event, &targets) {
            actions.push(insert_action_draft(&tx, plan_id, event_id, &draft, now)?);
        }

        tx.commit().db_context("Failed to commit transaction")?;
        Ok((event, actions))
    }

    /// Events of a plan, newest first.
    pub fn list_events(&self, plan_id: &str, limit: usize) -> Result<Vec<ExternalEvent>> {
        let sql = format!(
            "SELECT {SELECT_EVENT_COLUMNS} FROM external_events WHERE plan_id = ?1 ORDER BY id DESC LIMIT ?2"
        );
        let mut stmt = self
            .connection
            .prepare(&sql)
            .db_context("Failed to prepare event query")?;
        let events = stmt
            .query_map(params![plan_id, limit as i64], event_from_row)
            .db_context("Failed to query events")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch events")?;
        Ok(events)
    }

    /// Deletes an event and every proposed action derived from it.
    pub fn delete_event(&mut self, plan_id: &str, event_id: i64) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        let deleted = tx
            .execute(
                "DELETE FROM external_events WHERE plan_id = ?1 AND id = ?2",
                params![plan_id, event_id],
            )
            .db_context("Failed to delete event")?;
        if deleted == 0 {
            return Err(PlannerError::EventNotFound { id: event_id });
        }
        tx.execute(
            "DELETE FROM proposed_actions WHERE plan_id = ?1 AND external_event_id = ?2",
            params![plan_id, event_id],
        )
        .db_context("Failed to delete event actions")?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(())
    }

    /// Proposed actions of a plan, optionally filtered by status.
    pub fn list_actions(
        &self,
        plan_id: &str,
        status: Option<ActionStatus>,
        limit: usize,
    ) -> Result<Vec<ProposedAction>> {
        let mut sql =
            format!("SELECT {SELECT_ACTION_COLUMNS} FROM proposed_actions WHERE plan_id = ?1");
        if status.is_some() {
            sql.push_str(" AND status = ?3");
        }
        sql.push_str(" ORDER BY id DESC LIMIT ?2");
        let mut stmt = self
            .connection
            .prepare(&sql)
            .db_context("Failed to prepare action query")?;
        let rows = match status {
            Some(status) => stmt.query_map(
                params![plan_id, limit as i64, status.as_str()],
                action_from_row,
            ),
            None => stmt.query_map(params![plan_id, limit as i64], action_from_row),
        }
        .db_context("Failed to query proposed actions")?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch proposed actions")
    }

    /// Approves a pending action and applies its mutation in the same
    /// transaction. Idempotent on already-approved actions.
    pub fn approve_action(
        &mut self,
        plan_id: &str,
        action_id: i64,
        decided_by: &str,
        now: Timestamp,
    ) -> Result<ProposedAction> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        let mut action = load_action(&tx, plan_id, action_id)?
            .ok_or(PlannerError::ActionNotFound { id: action_id })?;

        match action.status {
            ActionStatus::Approved => {
                // Idempotent: the mutation already landed with the first
                // approval.
                return Ok(action);
            }
            ActionStatus::Rejected => {
                return Err(PlannerError::ActionAlreadyDecided {
                    id: action_id,
                    status: action.status.as_str().to_string(),
                });
            }
            ActionStatus::Pending => {}
        }

        // Apply the implied mutation on the target task.
        let mutation = workflow::mutation_for(&action.action_type, &action.payload);
        let mut task = super::task_queries::require_task(&tx, plan_id, &action.task_id)?;
        super::lock_queries::ensure_writable(&tx, plan_id, &task.task_id, Some(decided_by), now)?;
        if mutation.shift_days != 0 {
            task.due_date = task
                .due_date
                .map(|d| add_days(d, mutation.shift_days as f64));
            task.start_date = task
                .start_date
                .map(|d| add_days(d, mutation.shift_days as f64));
        }
        if let Some(assignees) = mutation.assignees {
            task.assignee_names.clear();
            task.assignees = assignees;
        }
        task.last_modified_at = now;
        super::task_queries::persist_task(&tx, &task)?;

        action.status = ActionStatus::Approved;
        action.decided_at = Some(now);
        action.decided_by = Some(decided_by.to_string());
        tx.execute(
            UPDATE_ACTION_STATUS_SQL,
            params![
                plan_id,
                action_id,
                action.status.as_str(),
                now.to_string(),
                decided_by
            ],
        )
        .db_context("Failed to update action status")?;

        super::plan_queries::touch_plan(&tx, plan_id, now)?;
        super::sync_queries::refresh_fingerprint(&tx, plan_id)?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(action)
    }

    /// Rejects a pending action. No task mutation happens.
    pub fn reject_action(
        &mut self,
        plan_id: &str,
        action_id: i64,
        decided_by: &str,
        now: Timestamp,
    ) -> Result<ProposedAction> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        let mut action = load_action(&tx, plan_id, action_id)?
            .ok_or(PlannerError::ActionNotFound { id: action_id })?;
        match action.status {
            ActionStatus::Rejected => return Ok(action),
            ActionStatus::Approved => {
                return Err(PlannerError::ActionAlreadyDecided {
                    id: action_id,
                    status: action.status.as_str().to_string(),
                });
            }
            ActionStatus::Pending => {}
        }
        action.status = ActionStatus::Rejected;
        action.decided_at = Some(now);
        action.decided_by = Some(decided_by.to_string());
        tx.execute(
            UPDATE_ACTION_STATUS_SQL,
            params![
                plan_id,
                action_id,
                action.status.as_str(),
                now.to_string(),
                decided_by
            ],
        )
        .db_context("Failed to update action status")?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(action)
    }

    /// Deletes a proposed action row outright (distinct from rejecting).
    pub fn delete_action(&mut self, plan_id: &str, action_id: i64) -> Result<()> {
        let deleted = self
            .connection
            .execute(
                "DELETE FROM proposed_actions WHERE plan_id = ?1 AND id = ?2",
                params![plan_id, action_id],
            )
            .db_context("Failed to delete proposed action")?;
        if deleted == 0 {
            return Err(PlannerError::ActionNotFound { id: action_id });
        }
        Ok(())
    }
}

//! Plan and bucket operations, snapshot loads and template cloning.

use std::collections::HashMap;

use jiff::Timestamp;
use rusqlite::{params, Connection, OptionalExtension};

use crate::dates::{add_days, days_between};
use crate::error::{DatabaseResultExt, PlannerError, Result};
use crate::models::{Bucket, Plan, Subtask, Task, TaskStatus};
use crate::snapshot::PlanSnapshot;

use super::utils::{parse_timestamp, parse_timestamp_opt};

const INSERT_PLAN_SQL: &str = "INSERT INTO plans (plan_id, name, event_date, source_plan_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
const SELECT_PLAN_SQL: &str = "SELECT plan_id, name, event_date, source_plan_id, created_at, updated_at FROM plans WHERE plan_id = ?1";
const SELECT_ALL_PLANS_SQL: &str = "SELECT plan_id, name, event_date, source_plan_id, created_at, updated_at FROM plans ORDER BY created_at DESC, plan_id";
const CHECK_PLAN_EXISTS_SQL: &str = "SELECT EXISTS(SELECT 1 FROM plans WHERE plan_id = ?1)";
const TOUCH_PLAN_SQL: &str = "UPDATE plans SET updated_at = ?1 WHERE plan_id = ?2";
const DELETE_PLAN_SQL: &str = "DELETE FROM plans WHERE plan_id = ?1";
const UPSERT_BUCKET_SQL: &str = "INSERT INTO buckets (plan_id, bucket_id, name, order_hint) VALUES (?1, ?2, ?3, ?4) ON CONFLICT (plan_id, bucket_id) DO UPDATE SET name = excluded.name, order_hint = excluded.order_hint";
const SELECT_BUCKETS_SQL: &str =
    "SELECT bucket_id, name, order_hint FROM buckets WHERE plan_id = ?1 ORDER BY order_hint, bucket_id";

fn plan_from_row(row: &rusqlite::Row) -> rusqlite::Result<Plan> {
    Ok(Plan {
        plan_id: row.get(0)?,
        name: row.get(1)?,
        event_date: parse_timestamp_opt(2, row.get(2)?)?,
        source_plan_id: row.get(3)?,
        created_at: parse_timestamp(4, row.get(4)?)?,
        updated_at: parse_timestamp(5, row.get(5)?)?,
    })
}

pub(super) fn plan_exists(conn: &Connection, plan_id: &str) -> Result<bool> {
    conn.query_row(CHECK_PLAN_EXISTS_SQL, params![plan_id], |row| row.get(0))
        .db_context("Failed to check plan existence")
}

pub(super) fn require_plan(conn: &Connection, plan_id: &str) -> Result<()> {
    if plan_exists(conn, plan_id)? {
        Ok(())
    } else {
        Err(PlannerError::PlanNotFound {
            id: plan_id.to_string(),
        })
    }
}

pub(super) fn touch_plan(conn: &Connection, plan_id: &str, now: Timestamp) -> Result<()> {
    conn.execute(TOUCH_PLAN_SQL, params![now.to_string(), plan_id])
        .db_context("Failed to update plan timestamp")?;
    Ok(())
}

pub(super) fn load_buckets(conn: &Connection, plan_id: &str) -> Result<Vec<Bucket>> {
    let mut stmt = conn
        .prepare(SELECT_BUCKETS_SQL)
        .db_context("Failed to prepare bucket query")?;
    let buckets = stmt
        .query_map(params![plan_id], |row| {
            Ok(Bucket {
                bucket_id: row.get(0)?,
                name: row.get(1)?,
                order_hint: row.get(2)?,
            })
        })
        .db_context("Failed to query buckets")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .db_context("Failed to fetch buckets")?;
    Ok(buckets)
}

pub(super) fn load_snapshot(conn: &Connection, plan_id: &str) -> Result<Option<PlanSnapshot>> {
    let plan = conn
        .query_row(SELECT_PLAN_SQL, params![plan_id], plan_from_row)
        .optional()
        .db_context("Failed to query plan")?;
    let Some(plan) = plan else {
        return Ok(None);
    };

    let buckets = load_buckets(conn, plan_id)?;
    let tasks = super::task_queries::load_tasks(conn, plan_id)?;
    let mut subtasks: HashMap<String, Vec<Subtask>> = HashMap::new();
    for task in &tasks {
        let items = super::subtask_queries::load_subtasks(conn, plan_id, &task.task_id)?;
        if !items.is_empty() {
            subtasks.insert(task.task_id.clone(), items);
        }
    }
    let dependencies = super::dependency_queries::load_dependencies(conn, plan_id)?;

    Ok(Some(PlanSnapshot {
        plan,
        buckets,
        tasks,
        subtasks,
        dependencies,
    }))
}

impl super::Database {
    /// Creates a new empty plan.
    pub fn create_plan(
        &mut self,
        plan_id: &str,
        name: &str,
        event_date: Option<Timestamp>,
        now: Timestamp,
    ) -> Result<Plan> {
        if plan_id.trim().is_empty() {
            return Err(PlannerError::invalid_input("plan_id", "must not be empty"));
        }
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        if plan_exists(&tx, plan_id)? {
            return Err(PlannerError::invalid_input(
                "plan_id",
                "a plan with this id already exists",
            ));
        }
        tx.execute(
            INSERT_PLAN_SQL,
            params![
                plan_id,
                name,
                event_date.map(|d| d.to_string()),
                None::<String>,
                now.to_string(),
                now.to_string()
            ],
        )
        .db_context("Failed to insert plan")?;
        tx.commit().db_context("Failed to commit transaction")?;

        Ok(Plan {
            plan_id: plan_id.to_string(),
            name: name.to_string(),
            event_date,
            source_plan_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Retrieves a plan by its ID.
    pub fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
        self.connection
            .query_row(SELECT_PLAN_SQL, params![plan_id], plan_from_row)
            .optional()
            .db_context("Failed to query plan")
    }

    /// Lists all plans, most recently created first.
    pub fn list_plans(&self) -> Result<Vec<Plan>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_ALL_PLANS_SQL)
            .db_context("Failed to prepare plan list query")?;
        let plans = stmt
            .query_map([], plan_from_row)
            .db_context("Failed to query plans")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch plans")?;
        Ok(plans)
    }

    /// Permanently deletes a plan and everything it owns.
    pub fn delete_plan(&mut self, plan_id: &str) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        require_plan(&tx, plan_id)?;
        // Cascades cover buckets/tasks/subtasks/dependencies; the
        // plan-scoped side tables are cleared explicitly.
        for sql in [
            "DELETE FROM task_locks WHERE plan_id = ?1",
            "DELETE FROM proposed_actions WHERE plan_id = ?1",
            "DELETE FROM external_events WHERE plan_id = ?1",
            "DELETE FROM plan_sync_state WHERE plan_id = ?1",
        ] {
            tx.execute(sql, params![plan_id])
                .db_context("Failed to delete plan side tables")?;
        }
        tx.execute(DELETE_PLAN_SQL, params![plan_id])
            .db_context("Failed to delete plan")?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(())
    }

    /// Creates or updates a bucket.
    pub fn upsert_bucket(
        &mut self,
        plan_id: &str,
        bucket: &Bucket,
        now: Timestamp,
    ) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        require_plan(&tx, plan_id)?;
        tx.execute(
            UPSERT_BUCKET_SQL,
            params![plan_id, bucket.bucket_id, bucket.name, bucket.order_hint],
        )
        .db_context("Failed to upsert bucket")?;
        touch_plan(&tx, plan_id, now)?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(())
    }

    /// Buckets of a plan in order-hint order.
    pub fn get_buckets(&self, plan_id: &str) -> Result<Vec<Bucket>> {
        require_plan(&self.connection, plan_id)?;
        load_buckets(&self.connection, plan_id)
    }

    /// Loads a consistent snapshot of a plan and everything it owns.
    pub fn get_snapshot(&mut self, plan_id: &str) -> Result<PlanSnapshot> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        let snapshot = load_snapshot(&tx, plan_id)?;
        tx.commit().db_context("Failed to commit transaction")?;
        snapshot.ok_or_else(|| PlannerError::PlanNotFound {
            id: plan_id.to_string(),
        })
    }

    /// Loads snapshots for several plans in one read transaction. Missing
    /// plans are skipped.
    pub fn get_snapshots(&mut self, plan_ids: &[String]) -> Result<Vec<PlanSnapshot>> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        let mut snapshots = Vec::new();
        for plan_id in plan_ids {
            if let Some(snapshot) = load_snapshot(&tx, plan_id)? {
                snapshots.push(snapshot);
            }
        }
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(snapshots)
    }

    /// Clones a template plan into a new plan.
    ///
    /// Copies buckets, tasks, subtasks and dependencies. All date fields
    /// shift by one constant delta chosen so the latest source due date
    /// lands on the target event date. Status, percent and completion
    /// fields reset. Task ids are preserved when `preserve_task_ids` is
    /// set, else regenerated as `<target>-task-NNN` in source order.
    pub fn clone_plan(
        &mut self,
        source_plan_id: &str,
        target_plan_id: &str,
        target_event_date: Timestamp,
        target_name: Option<&str>,
        preserve_task_ids: bool,
        now: Timestamp,
    ) -> Result<Plan> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let source = load_snapshot(&tx, source_plan_id)?.ok_or_else(|| {
            PlannerError::PlanNotFound {
                id: source_plan_id.to_string(),
            }
        })?;
        if plan_exists(&tx, target_plan_id)? {
            return Err(PlannerError::invalid_input(
                "target_plan_id",
                "a plan with this id already exists",
            ));
        }

        let latest_due = source.tasks.iter().filter_map(|t| t.due_date).max();
        let shift_days = match latest_due {
            Some(due) => days_between(due, target_event_date),
            None => 0.0,
        };

        let name = target_name.unwrap_or(target_plan_id);
        tx.execute(
            INSERT_PLAN_SQL,
            params![
                target_plan_id,
                name,
                Some(target_event_date.to_string()),
                Some(source_plan_id),
                now.to_string(),
                now.to_string()
            ],
        )
        .db_context("Failed to insert cloned plan")?;

        for bucket in &source.buckets {
            tx.execute(
                UPSERT_BUCKET_SQL,
                params![
                    target_plan_id,
                    bucket.bucket_id,
                    bucket.name,
                    bucket.order_hint
                ],
            )
            .db_context("Failed to clone bucket")?;
        }

        let mut id_map: HashMap<&str, String> = HashMap::new();
        for (index, task) in source.tasks.iter().enumerate() {
            let new_id = if preserve_task_ids {
                task.task_id.clone()
            } else {
                format!("{}-task-{:03}", target_plan_id, index + 1)
            };
            id_map.insert(task.task_id.as_str(), new_id);
        }

        for task in &source.tasks {
            let cloned = Task {
                plan_id: target_plan_id.to_string(),
                task_id: id_map[task.task_id.as_str()].clone(),
                status: TaskStatus::NotStarted,
                percent_complete: 0,
                start_date: task.start_date.map(|d| add_days(d, shift_days)),
                due_date: task.due_date.map(|d| add_days(d, shift_days)),
                completed_date: None,
                created_at: now,
                last_modified_at: now,
                completed_by: None,
                ..task.clone()
            };
            super::task_queries::insert_task(&tx, &cloned)?;

            if let Some(items) = source.subtasks.get(&task.task_id) {
                for item in items {
                    let reset = Subtask {
                        is_checked: false,
                        last_modified_at: now,
                        ..item.clone()
                    };
                    super::subtask_queries::insert_subtask(
                        &tx,
                        target_plan_id,
                        &cloned.task_id,
                        &reset,
                    )?;
                }
            }
        }

        for dep in &source.dependencies {
            let (Some(pred), Some(succ)) = (
                id_map.get(dep.predecessor_id.as_str()),
                id_map.get(dep.successor_id.as_str()),
            ) else {
                continue;
            };
            super::dependency_queries::insert_dependency(
                &tx,
                target_plan_id,
                pred,
                succ,
                dep.dep_type,
            )?;
        }

        super::sync_queries::refresh_fingerprint(&tx, target_plan_id)?;
        tx.commit().db_context("Failed to commit transaction")?;

        Ok(Plan {
            plan_id: target_plan_id.to_string(),
            name: name.to_string(),
            event_date: Some(target_event_date),
            source_plan_id: Some(source_plan_id.to_string()),
            created_at: now,
            updated_at: now,
        })
    }
}

//! Advisory task locks with lazy expiry.
//!
//! `Unlocked -> Locked(holder, t0, ttl)`. Acquire renews for the same
//! holder and fails with `LockedByOther` for anyone else while the lock is
//! live; expiry is evaluated on every acquire/release/read, so no
//! background sweeper exists.

use jiff::Timestamp;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{DatabaseResultExt, PlannerError, Result};
use crate::models::TaskLock;

use super::utils::parse_timestamp;

const SELECT_LOCK_SQL: &str = "SELECT plan_id, task_id, user_id, acquired_at, ttl_seconds FROM task_locks WHERE plan_id = ?1 AND task_id = ?2";
const UPSERT_LOCK_SQL: &str = "INSERT INTO task_locks (plan_id, task_id, user_id, acquired_at, ttl_seconds) VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT (plan_id, task_id) DO UPDATE SET user_id = excluded.user_id, acquired_at = excluded.acquired_at, ttl_seconds = excluded.ttl_seconds";
const DELETE_LOCK_SQL: &str = "DELETE FROM task_locks WHERE plan_id = ?1 AND task_id = ?2";

fn lock_from_row(row: &rusqlite::Row) -> rusqlite::Result<TaskLock> {
    Ok(TaskLock {
        plan_id: row.get(0)?,
        task_id: row.get(1)?,
        user_id: row.get(2)?,
        acquired_at: parse_timestamp(3, row.get(3)?)?,
        ttl_seconds: row.get(4)?,
    })
}

// Reads the live lock, deleting an expired row on the way (lazy expiry).
pub(super) fn live_lock(
    conn: &Connection,
    plan_id: &str,
    task_id: &str,
    now: Timestamp,
) -> Result<Option<TaskLock>> {
    let lock = conn
        .query_row(SELECT_LOCK_SQL, params![plan_id, task_id], lock_from_row)
        .optional()
        .db_context("Failed to query task lock")?;
    match lock {
        Some(lock) if lock.is_expired(now) => {
            conn.execute(DELETE_LOCK_SQL, params![plan_id, task_id])
                .db_context("Failed to clear expired lock")?;
            Ok(None)
        }
        other => Ok(other),
    }
}

/// The mutation contract: a task is writable when it carries no live lock,
/// or when the live lock is held by the acting user.
pub(super) fn ensure_writable(
    conn: &Connection,
    plan_id: &str,
    task_id: &str,
    acting_user: Option<&str>,
    now: Timestamp,
) -> Result<()> {
    match live_lock(conn, plan_id, task_id, now)? {
        Some(lock) if Some(lock.user_id.as_str()) != acting_user => {
            Err(PlannerError::LockedByOther {
                holder: lock.user_id,
                acquired_at: lock.acquired_at,
            })
        }
        _ => Ok(()),
    }
}

impl super::Database {
    /// Acquires or renews the lock on a task.
    pub fn acquire_lock(
        &mut self,
        plan_id: &str,
        task_id: &str,
        user_id: &str,
        ttl_seconds: i64,
        now: Timestamp,
    ) -> Result<TaskLock> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        super::task_queries::require_task(&tx, plan_id, task_id)?;

        if let Some(existing) = live_lock(&tx, plan_id, task_id, now)? {
            if existing.user_id != user_id {
                return Err(PlannerError::LockedByOther {
                    holder: existing.user_id,
                    acquired_at: existing.acquired_at,
                });
            }
        }
        let lock = TaskLock {
            plan_id: plan_id.to_string(),
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
            acquired_at: now,
            ttl_seconds: ttl_seconds.max(1),
        };
        tx.execute(
            UPSERT_LOCK_SQL,
            params![
                lock.plan_id,
                lock.task_id,
                lock.user_id,
                lock.acquired_at.to_string(),
                lock.ttl_seconds
            ],
        )
        .db_context("Failed to write task lock")?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(lock)
    }

    /// Releases a lock held by `user_id`.
    pub fn release_lock(
        &mut self,
        plan_id: &str,
        task_id: &str,
        user_id: &str,
        now: Timestamp,
    ) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        match live_lock(&tx, plan_id, task_id, now)? {
            Some(lock) if lock.user_id == user_id => {
                tx.execute(DELETE_LOCK_SQL, params![plan_id, task_id])
                    .db_context("Failed to delete task lock")?;
                tx.commit().db_context("Failed to commit transaction")?;
                Ok(())
            }
            _ => Err(PlannerError::NotHolder {
                task_id: task_id.to_string(),
                user_id: user_id.to_string(),
            }),
        }
    }

    /// The live lock on a task, if any.
    pub fn get_lock(
        &mut self,
        plan_id: &str,
        task_id: &str,
        now: Timestamp,
    ) -> Result<Option<TaskLock>> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        let lock = live_lock(&tx, plan_id, task_id, now)?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(lock)
    }
}

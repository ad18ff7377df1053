//! Advisory lock operations.

use jiff::Timestamp;

use super::Planner;
use crate::error::Result;
use crate::models::{TaskLock, DEFAULT_LOCK_TTL_SECONDS};
use crate::params::{AcquireLock, ReleaseLock, TaskRef};

impl Planner {
    /// Acquires or renews the lock on a task.
    pub async fn acquire_lock(&self, params: &AcquireLock) -> Result<TaskLock> {
        let plan_id = params.plan_id.clone();
        let task_id = params.task_id.clone();
        let user_id = params.user_id.clone();
        let ttl_seconds = params
            .ttl_minutes
            .map(|minutes| minutes.max(1) * 60)
            .unwrap_or(DEFAULT_LOCK_TTL_SECONDS);
        self.with_db(move |db| {
            db.acquire_lock(&plan_id, &task_id, &user_id, ttl_seconds, Timestamp::now())
        })
        .await
    }

    /// Releases a lock held by the given user.
    pub async fn release_lock(&self, params: &ReleaseLock) -> Result<()> {
        let plan_id = params.plan_id.clone();
        let task_id = params.task_id.clone();
        let user_id = params.user_id.clone();
        self.with_db(move |db| db.release_lock(&plan_id, &task_id, &user_id, Timestamp::now()))
            .await
    }

    /// The live lock on a task, if any.
    pub async fn get_lock(&self, params: &TaskRef) -> Result<Option<TaskLock>> {
        let plan_id = params.plan_id.clone();
        let task_id = params.task_id.clone();
        self.with_db(move |db| db.get_lock(&plan_id, &task_id, Timestamp::now()))
            .await
    }
}

//! Advisory task lock model.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Default lock time-to-live: 15 minutes.
pub const DEFAULT_LOCK_TTL_SECONDS: i64 = 15 * 60;

/// Advisory per-task edit lock.
///
/// At most one lock exists per (plan, task). Expiry is evaluated lazily on
/// every acquire/release/read; there is no background sweeper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskLock {
    /// ID of the owning plan
    pub plan_id: String,

    /// Locked task
    pub task_id: String,

    /// User holding the lock
    pub user_id: String,

    /// When the lock was acquired or last renewed (UTC)
    pub acquired_at: Timestamp,

    /// Time-to-live in seconds from `acquired_at`
    pub ttl_seconds: i64,
}

impl TaskLock {
    /// Whether the lock has outlived its TTL at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        let expires = self.acquired_at.as_second() + self.ttl_seconds;
        now.as_second() > expires
    }
}

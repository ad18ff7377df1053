//! Task and subtask model definitions.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::TaskStatus;

/// Represents an individual task within a plan.
///
/// Invariants enforced by the repository write path:
/// - `percent_complete` is 0 when `NotStarted` and 100 when `Completed`
/// - `completed_date` is present iff status is `Completed`
/// - `start_date <= due_date` when both are present
/// - `assignees` contains no duplicates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// ID of the owning plan
    pub plan_id: String,

    /// Identifier stable within the plan
    pub task_id: String,

    /// Brief title of the task
    pub title: String,

    /// Bucket (workstream) this task belongs to
    pub bucket_id: String,

    /// Current status
    pub status: TaskStatus,

    /// Completion percentage, 0-100, monotone non-decreasing
    pub percent_complete: u8,

    /// Scheduled start (UTC)
    pub start_date: Option<Timestamp>,

    /// Due date (UTC)
    pub due_date: Option<Timestamp>,

    /// Completion instant; present iff status is `Completed`
    pub completed_date: Option<Timestamp>,

    /// Priority 0-10; lower numbers are more urgent
    pub priority: u8,

    /// Assigned user identifiers, ordered, no duplicates
    #[serde(default)]
    pub assignees: Vec<String>,

    /// Display names parallel to `assignees`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignee_names: Vec<String>,

    /// Applied category labels
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_categories: Vec<String>,

    /// Detailed multi-line description
    pub description: Option<String>,

    /// Lexicographic ordering hint within the bucket
    #[serde(default)]
    pub order_hint: String,

    /// Timestamp when the task was created (UTC)
    pub created_at: Timestamp,

    /// Timestamp when the task was last modified (UTC)
    pub last_modified_at: Timestamp,

    /// User that created the task
    pub created_by: Option<String>,

    /// User that completed the task; only meaningful when `Completed`
    pub completed_by: Option<String>,
}

impl Task {
    /// Planned duration in fractional days, when both endpoints are known.
    pub fn planned_duration_days(&self) -> Option<f64> {
        match (self.start_date, self.due_date) {
            (Some(start), Some(due)) => Some(crate::dates::days_between(start, due)),
            _ => None,
        }
    }

    /// Actual duration in fractional days for completed tasks.
    pub fn actual_duration_days(&self) -> Option<f64> {
        match (self.start_date, self.completed_date) {
            (Some(start), Some(done)) => Some(crate::dates::days_between(start, done)),
            _ => None,
        }
    }

    /// Whether the task is past due and not in a terminal state.
    pub fn is_overdue(&self, now: Timestamp) -> bool {
        match self.due_date {
            Some(due) => due < now && !self.status.is_terminal(),
            None => false,
        }
    }
}

/// A checklist item owned by a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subtask {
    /// Identifier unique within the parent task
    pub subtask_id: String,

    /// Title of the checklist item
    pub title: String,

    /// Whether the item is checked off
    pub is_checked: bool,

    /// Lexicographic ordering hint
    #[serde(default)]
    pub order_hint: String,

    /// Timestamp of the last modification (UTC)
    pub last_modified_at: Timestamp,
}

//! Partial-update request structures used by the mutation core.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::TaskStatus;

/// Partial update for a task. `None` fields are left untouched.
///
/// Date fields use a two-level option so callers can distinguish "leave as
/// is" (`None`) from "clear the value" (`Some(None)`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub bucket_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub percent_complete: Option<u8>,
    pub start_date: Option<Option<Timestamp>>,
    pub due_date: Option<Option<Timestamp>>,
    pub priority: Option<u8>,
    pub assignees: Option<Vec<String>>,
    pub assignee_names: Option<Vec<String>>,
    pub applied_categories: Option<Vec<String>>,
    pub description: Option<Option<String>>,
    pub order_hint: Option<String>,
    /// User recorded as `completed_by` when the update completes the task
    pub acting_user: Option<String>,
}

impl UpdateTaskRequest {
    /// Whether the request carries any change at all.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.bucket_id.is_none()
            && self.status.is_none()
            && self.percent_complete.is_none()
            && self.start_date.is_none()
            && self.due_date.is_none()
            && self.priority.is_none()
            && self.assignees.is_none()
            && self.assignee_names.is_none()
            && self.applied_categories.is_none()
            && self.description.is_none()
            && self.order_hint.is_none()
    }
}

/// Partial update for a subtask.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSubtaskRequest {
    pub title: Option<String>,
    pub is_checked: Option<bool>,
    pub order_hint: Option<String>,
}

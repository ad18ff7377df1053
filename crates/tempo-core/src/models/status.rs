//! Status and type enumerations for tasks, dependencies, events and actions.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Type-safe enumeration of task statuses.
///
/// Serialized in the camelCase wire form (`notStarted`, `inProgress`, ...)
/// used by the task API and the database.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// No work has happened yet
    #[default]
    NotStarted,

    /// Work is underway
    InProgress,

    /// Progress is stalled on something external
    Blocked,

    /// Finished work awaiting sign-off
    UnderReview,

    /// Done; `completed_date` must be set
    Completed,

    /// Abandoned; terminal like `Completed`
    Cancelled,
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notStarted" | "not_started" => Ok(TaskStatus::NotStarted),
            "inProgress" | "in_progress" => Ok(TaskStatus::InProgress),
            "blocked" => Ok(TaskStatus::Blocked),
            "underReview" | "under_review" => Ok(TaskStatus::UnderReview),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

impl TaskStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "notStarted",
            TaskStatus::InProgress => "inProgress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::UnderReview => "underReview",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// `Completed` and `Cancelled` admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    /// All statuses in canonical order. The order is load-bearing for the
    /// Markov transition matrix, where the two terminal states come last.
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::NotStarted,
        TaskStatus::InProgress,
        TaskStatus::Blocked,
        TaskStatus::UnderReview,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
    ];

    /// Get status with consistent icon formatting for display.
    pub fn with_icon(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "○ Not Started",
            TaskStatus::InProgress => "➤ In Progress",
            TaskStatus::Blocked => "■ Blocked",
            TaskStatus::UnderReview => "◆ Under Review",
            TaskStatus::Completed => "✓ Completed",
            TaskStatus::Cancelled => "✗ Cancelled",
        }
    }
}

/// Classical scheduling dependency types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum DependencyType {
    /// Finish-to-start: successor starts after predecessor finishes
    #[serde(rename = "FS")]
    #[default]
    FinishToStart,

    /// Start-to-start: successor starts after predecessor starts
    #[serde(rename = "SS")]
    StartToStart,

    /// Finish-to-finish: successor finishes after predecessor finishes
    #[serde(rename = "FF")]
    FinishToFinish,

    /// Start-to-finish: treated as finish-to-start for schedule arithmetic
    #[serde(rename = "SF")]
    StartToFinish,
}

impl FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FS" => Ok(DependencyType::FinishToStart),
            "SS" => Ok(DependencyType::StartToStart),
            "FF" => Ok(DependencyType::FinishToFinish),
            "SF" => Ok(DependencyType::StartToFinish),
            _ => Err(format!("Invalid dependency type: {s}")),
        }
    }
}

impl DependencyType {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "FS",
            DependencyType::StartToStart => "SS",
            DependencyType::FinishToFinish => "FF",
            DependencyType::StartToFinish => "SF",
        }
    }
}

/// Severity attached to an external event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("Invalid severity: {s}")),
        }
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Lifecycle status of a proposed action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Awaiting a human decision
    #[default]
    Pending,
    /// Approved and applied
    Approved,
    /// Rejected without side effects
    Rejected,
}

impl FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ActionStatus::Pending),
            "approved" => Ok(ActionStatus::Approved),
            "rejected" => Ok(ActionStatus::Rejected),
            _ => Err(format!("Invalid action status: {s}")),
        }
    }
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Approved => "approved",
            ActionStatus::Rejected => "rejected",
        }
    }
}

//! Error types for the planner engine.

use jiff::Timestamp;
use thiserror::Error;

/// Comprehensive error type for all planner operations.
#[derive(Error, Debug)]
pub enum PlannerError {
    /// Database connection or query errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Plan not found for the given ID
    #[error("Plan '{id}' not found")]
    PlanNotFound { id: String },

    /// Task not found within a plan
    #[error("Task '{task_id}' not found in plan '{plan_id}'")]
    TaskNotFound { plan_id: String, task_id: String },

    /// Subtask not found on a task
    #[error("Subtask '{subtask_id}' not found on task '{task_id}'")]
    SubtaskNotFound { task_id: String, subtask_id: String },

    /// Dependency edge not found
    #[error("Dependency {predecessor_id} -> {successor_id} not found")]
    DependencyNotFound {
        predecessor_id: String,
        successor_id: String,
    },

    /// The (predecessor, successor) pair is already recorded
    #[error("Dependency {predecessor_id} -> {successor_id} already exists")]
    DuplicateDependency {
        predecessor_id: String,
        successor_id: String,
    },

    /// A dependency mutation or load observed a directed cycle
    #[error("Dependency cycle detected involving tasks: {}", node_ids.join(", "))]
    CycleDetected { node_ids: Vec<String> },

    /// External event not found
    #[error("External event {id} not found")]
    EventNotFound { id: i64 },

    /// Proposed action not found
    #[error("Proposed action {id} not found")]
    ActionNotFound { id: i64 },

    /// The action already reached a terminal decision incompatible with the request
    #[error("Proposed action {id} was already decided ({status})")]
    ActionAlreadyDecided { id: i64, status: String },

    /// The task is locked by a different user
    #[error("Task is locked by '{holder}' since {acquired_at}")]
    LockedByOther {
        holder: String,
        acquired_at: Timestamp,
    },

    /// A lock release was attempted by a user that does not hold the lock
    #[error("Lock on task '{task_id}' is not held by '{user_id}'")]
    NotHolder { task_id: String, user_id: String },

    /// Monte Carlo calibration is missing for a bucket and no fallback was given
    #[error("No PERT calibration for bucket '{bucket}' and no default prior provided")]
    InsufficientCalibration { bucket: String },

    /// Cooperative cancellation was observed
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),

    /// Anything unclassified
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlannerError {
    /// Creates a new database error with additional context
    pub fn database_error(message: &str, source: rusqlite::Error) -> Self {
        Self::Database {
            message: message.to_string(),
            source,
        }
    }

    /// Creates a new input validation error
    pub fn invalid_input(field: &str, reason: &str) -> Self {
        Self::InvalidInput {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates a task-not-found error
    pub fn task_not_found(plan_id: &str, task_id: &str) -> Self {
        Self::TaskNotFound {
            plan_id: plan_id.to_string(),
            task_id: task_id.to_string(),
        }
    }

    /// Stable machine-readable kind name, used by the CLI exit-code mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database { .. } => "database",
            Self::PlanNotFound { .. }
            | Self::TaskNotFound { .. }
            | Self::SubtaskNotFound { .. }
            | Self::DependencyNotFound { .. }
            | Self::EventNotFound { .. }
            | Self::ActionNotFound { .. } => "not_found",
            Self::DuplicateDependency { .. }
            | Self::LockedByOther { .. }
            | Self::NotHolder { .. }
            | Self::ActionAlreadyDecided { .. } => "conflict",
            Self::CycleDetected { .. } => "cycle_detected",
            Self::InsufficientCalibration { .. } => "insufficient_calibration",
            Self::Cancelled => "cancelled",
            Self::InvalidInput { .. } => "validation",
            Self::Serialization { .. } => "serialization",
            Self::Configuration { .. } | Self::FileSystem { .. } | Self::XdgDirectory(_) => {
                "configuration"
            }
            Self::Internal { .. } => "internal",
        }
    }
}

/// Extension trait for rusqlite results to provide concise error mapping
pub trait DatabaseResultExt<T> {
    /// Map database errors with a message
    fn db_context(self, message: &str) -> Result<T>;
}

impl<T> DatabaseResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, message: &str) -> Result<T> {
        self.map_err(|e| PlannerError::database_error(message, e))
    }
}

/// Result type alias for planner operations
pub type Result<T> = std::result::Result<T, PlannerError>;

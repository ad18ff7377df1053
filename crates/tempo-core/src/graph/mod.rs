//! Dependency graph construction and critical-path analysis.

pub mod builder;
pub mod critical_path;

pub use builder::TaskGraph;
pub use critical_path::{
    compute as compute_critical_path, compute_with_durations, task_duration_days, CriticalPath,
    ScheduleEntry, CP_SLACK_EPSILON, DEFAULT_TASK_DURATION_DAYS,
};

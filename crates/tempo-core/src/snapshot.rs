//! Immutable plan snapshots consumed by the analytical engines.
//!
//! A snapshot is loaded in one read transaction and never mutated; every
//! analytical computation (critical path, simulation, attention, impact,
//! intelligence) is a pure function of a snapshot, which keeps those engines
//! independent of the storage backend.

use std::collections::HashMap;

use crate::models::{Bucket, Dependency, Plan, Subtask, Task};

/// A consistent view of one plan and everything it owns.
#[derive(Debug, Clone)]
pub struct PlanSnapshot {
    pub plan: Plan,
    pub buckets: Vec<Bucket>,
    pub tasks: Vec<Task>,
    /// Subtasks keyed by owning task id, in order-hint order
    pub subtasks: HashMap<String, Vec<Subtask>>,
    pub dependencies: Vec<Dependency>,
}

impl PlanSnapshot {
    /// Look up a task by id.
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    /// Tasks indexed by id for repeated lookups.
    pub fn task_index(&self) -> HashMap<&str, &Task> {
        self.tasks
            .iter()
            .map(|t| (t.task_id.as_str(), t))
            .collect()
    }

    /// Display name for a bucket id, falling back to the id itself.
    pub fn bucket_name<'a>(&'a self, bucket_id: &'a str) -> &'a str {
        self.buckets
            .iter()
            .find(|b| b.bucket_id == bucket_id)
            .map(|b| b.name.as_str())
            .unwrap_or(bucket_id)
    }

    /// All distinct assignees appearing in the plan, in first-seen order.
    pub fn all_assignees(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for task in &self.tasks {
            for assignee in &task.assignees {
                if !seen.contains(&assignee.as_str()) {
                    seen.push(assignee.as_str());
                }
            }
        }
        seen
    }
}

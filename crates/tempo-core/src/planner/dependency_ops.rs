//! Dependency mutations and the dependency lens for one task.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::Planner;
use crate::analytics::attention::TaskDigest;
use crate::error::{PlannerError, Result};
use crate::graph::TaskGraph;
use crate::models::Dependency;
use crate::params::{AddDependency, RemoveDependency, TaskRef};

/// Upstream/downstream view of one task with a human-readable impact
/// statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDependencies {
    pub plan_id: String,
    pub task_id: String,
    /// Tasks that must finish before this one
    pub upstream: Vec<TaskDigest>,
    /// Tasks impacted if this one slips
    pub downstream: Vec<TaskDigest>,
    pub impact_statement: String,
}

impl Planner {
    /// Adds a dependency edge, refusing duplicates and cycles.
    pub async fn add_dependency(&self, params: &AddDependency) -> Result<Dependency> {
        let dep_type = params.dependency_type()?;
        let plan_id = params.plan_id.clone();
        let predecessor = params.predecessor_id.clone();
        let successor = params.successor_id.clone();
        let acting_user = params.acting_user.clone();
        let result = self
            .with_db(move |db| {
                db.add_dependency(
                    &plan_id,
                    &predecessor,
                    &successor,
                    dep_type,
                    acting_user.as_deref(),
                    Timestamp::now(),
                )
            })
            .await;
        if result.is_ok() {
            self.invalidate(&params.plan_id);
        }
        result
    }

    /// Removes a dependency edge.
    pub async fn remove_dependency(&self, params: &RemoveDependency) -> Result<()> {
        let plan_id = params.plan_id.clone();
        let predecessor = params.predecessor_id.clone();
        let successor = params.successor_id.clone();
        let acting_user = params.acting_user.clone();
        let result = self
            .with_db(move |db| {
                db.remove_dependency(
                    &plan_id,
                    &predecessor,
                    &successor,
                    acting_user.as_deref(),
                    Timestamp::now(),
                )
            })
            .await;
        if result.is_ok() {
            self.invalidate(&params.plan_id);
        }
        result
    }

    /// Direct upstream and downstream neighbors of a task, with the impact
    /// statement used by the dependency lens.
    pub async fn get_task_dependencies(&self, params: &TaskRef) -> Result<TaskDependencies> {
        let plan_id = params.plan_id.clone();
        let task_id = params.task_id.clone();
        self.with_db(move |db| {
            let snapshot = db.get_snapshot(&plan_id)?;
            let task = snapshot
                .task(&task_id)
                .ok_or_else(|| PlannerError::task_not_found(&plan_id, &task_id))?;
            let graph = TaskGraph::build_lenient(&snapshot.tasks, &snapshot.dependencies);

            let digest = |id: &String| {
                snapshot.task(id).map(|t| TaskDigest {
                    task_id: t.task_id.clone(),
                    title: t.title.clone(),
                    status: t.status,
                    due_date: t.due_date,
                    assignee_names: if t.assignee_names.is_empty() {
                        t.assignees.clone()
                    } else {
                        t.assignee_names.clone()
                    },
                })
            };
            let upstream: Vec<TaskDigest> = graph
                .predecessors(&task_id)
                .iter()
                .filter_map(digest)
                .collect();
            let downstream: Vec<TaskDigest> = graph
                .successors(&task_id)
                .iter()
                .filter_map(digest)
                .collect();

            let impact_statement = if downstream.is_empty() {
                "No downstream dependencies.".to_string()
            } else {
                let titles: Vec<&str> = downstream.iter().take(5).map(|d| d.title.as_str()).collect();
                format!(
                    "If '{}' slips 3 days, {} downstream task(s) may move: {}{}",
                    task.title,
                    downstream.len(),
                    titles.join(", "),
                    if downstream.len() > titles.len() { ", …" } else { "" }
                )
            };

            Ok(TaskDependencies {
                plan_id,
                task_id,
                upstream,
                downstream,
                impact_statement,
            })
        })
        .await
    }
}

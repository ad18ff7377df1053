//! Shared fixtures for unit tests.

use jiff::Timestamp;

use crate::models::{Bucket, Dependency, DependencyType, Plan, Task, TaskStatus};
use crate::snapshot::PlanSnapshot;

pub fn now_fixture() -> Timestamp {
    "2026-03-01T00:00:00Z".parse().unwrap()
}

pub fn task(task_id: &str) -> Task {
    Task {
        plan_id: "plan-1".into(),
        task_id: task_id.into(),
        title: format!("Task {task_id}"),
        bucket_id: "bucket-1".into(),
        status: TaskStatus::NotStarted,
        percent_complete: 0,
        start_date: None,
        due_date: None,
        completed_date: None,
        priority: 5,
        assignees: Vec::new(),
        assignee_names: Vec::new(),
        applied_categories: Vec::new(),
        description: None,
        order_hint: String::new(),
        created_at: now_fixture(),
        last_modified_at: now_fixture(),
        created_by: None,
        completed_by: None,
    }
}

pub fn dep(predecessor: &str, successor: &str) -> Dependency {
    Dependency {
        plan_id: "plan-1".into(),
        predecessor_id: predecessor.into(),
        successor_id: successor.into(),
        dep_type: DependencyType::FinishToStart,
    }
}

pub fn dep_typed(predecessor: &str, successor: &str, dep_type: DependencyType) -> Dependency {
    Dependency {
        dep_type,
        ..dep(predecessor, successor)
    }
}

pub fn snapshot(tasks: Vec<Task>, dependencies: Vec<Dependency>) -> PlanSnapshot {
    PlanSnapshot {
        plan: Plan {
            plan_id: "plan-1".into(),
            name: "Fixture Plan".into(),
            event_date: None,
            source_plan_id: None,
            created_at: now_fixture(),
            updated_at: now_fixture(),
        },
        buckets: vec![Bucket {
            bucket_id: "bucket-1".into(),
            name: "Registration".into(),
            order_hint: String::new(),
        }],
        tasks,
        subtasks: Default::default(),
        dependencies,
    }
}

//! Attention dashboard: blockers, overdue, due-soon, CP-due-soon and
//! recently-changed views, plus the milestone (event-date) analysis.
//!
//! Pure derivations over a plan snapshot; every view returns a count and a
//! bounded list sorted by due date ascending, ties broken by task id.

use std::collections::HashSet;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::dates::{add_days, days_between};
use crate::graph::{CriticalPath, TaskGraph};
use crate::models::{Task, TaskStatus};
use crate::snapshot::PlanSnapshot;

/// Default cap on the task list carried by each view.
pub const DEFAULT_VIEW_LIMIT: usize = 20;

/// The due-soon window in days.
pub const DUE_SOON_WINDOW_DAYS: f64 = 7.0;

/// Fallback recently-changed window when the plan has no sync state.
pub const RECENT_FALLBACK_HOURS: f64 = 24.0;

/// A compact task reference carried by attention views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDigest {
    pub task_id: String,
    pub title: String,
    pub status: TaskStatus,
    pub due_date: Option<Timestamp>,
    pub assignee_names: Vec<String>,
}

impl TaskDigest {
    fn of(task: &Task) -> Self {
        Self {
            task_id: task.task_id.clone(),
            title: task.title.clone(),
            status: task.status,
            due_date: task.due_date,
            assignee_names: if task.assignee_names.is_empty() {
                task.assignees.clone()
            } else {
                task.assignee_names.clone()
            },
        }
    }
}

/// One bounded, sorted attention view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttentionView {
    pub count: usize,
    pub tasks: Vec<TaskDigest>,
}

impl AttentionView {
    fn build(mut tasks: Vec<&Task>, limit: usize) -> Self {
        tasks.sort_by(|a, b| {
            let due_a = a.due_date.map(|d| d.as_second()).unwrap_or(i64::MAX);
            let due_b = b.due_date.map(|d| d.as_second()).unwrap_or(i64::MAX);
            due_a.cmp(&due_b).then_with(|| a.task_id.cmp(&b.task_id))
        });
        Self {
            count: tasks.len(),
            tasks: tasks.into_iter().take(limit).map(TaskDigest::of).collect(),
        }
    }
}

/// The attention dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionDashboard {
    pub plan_id: String,
    pub blockers: AttentionView,
    pub overdue: AttentionView,
    pub due_next_7_days: AttentionView,
    pub critical_path_due_next: AttentionView,
    pub recently_changed: AttentionView,
}

/// Derives the attention dashboard from a snapshot.
///
/// `previous_sync_at` bounds the recently-changed window; without sync
/// state the window falls back to the trailing 24 hours.
pub fn dashboard(
    snapshot: &PlanSnapshot,
    graph: &TaskGraph,
    critical_path: &CriticalPath,
    now: Timestamp,
    previous_sync_at: Option<Timestamp>,
    limit: usize,
) -> AttentionDashboard {
    let task_index = snapshot.task_index();
    let window_end = add_days(now, DUE_SOON_WINDOW_DAYS);
    let recent_start =
        previous_sync_at.unwrap_or_else(|| add_days(now, -RECENT_FALLBACK_HOURS / 24.0));

    let mut blockers = Vec::new();
    let mut overdue = Vec::new();
    let mut due_soon = Vec::new();
    let mut cp_due_soon = Vec::new();
    let mut recently_changed = Vec::new();

    for task in &snapshot.tasks {
        let incomplete_upstream = graph.predecessors(&task.task_id).iter().any(|pred| {
            task_index
                .get(pred.as_str())
                .is_some_and(|t| t.status != TaskStatus::Completed)
        });

        // Blocked: explicitly blocked, or not started behind an incomplete
        // predecessor.
        if task.status == TaskStatus::Blocked
            || (task.status == TaskStatus::NotStarted && incomplete_upstream)
        {
            blockers.push(task);
        }

        if let Some(due) = task.due_date {
            if !task.status.is_terminal() {
                if due < now {
                    overdue.push(task);
                } else if due <= window_end {
                    due_soon.push(task);
                    if critical_path.is_on_path(&task.task_id) {
                        cp_due_soon.push(task);
                    }
                }
            }
        }

        if task.last_modified_at >= recent_start && task.last_modified_at < now {
            recently_changed.push(task);
        }
    }

    AttentionDashboard {
        plan_id: snapshot.plan.plan_id.clone(),
        blockers: AttentionView::build(blockers, limit),
        overdue: AttentionView::build(overdue, limit),
        due_next_7_days: AttentionView::build(due_soon, limit),
        critical_path_due_next: AttentionView::build(cp_due_soon, limit),
        recently_changed: AttentionView::build(recently_changed, limit),
    }
}

/// A task in the milestone at-risk lane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AtRiskTask {
    #[serde(flatten)]
    pub digest: TaskDigest,
    /// Days the due date lands after the event; `None` when the task has no
    /// due date at all
    pub days_after_event: Option<i64>,
    pub on_critical_path: bool,
}

/// Milestone (event-date) analysis: what lands before the event and what is
/// at risk of missing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneAnalysis {
    pub plan_id: String,
    pub event_date: Timestamp,
    pub before_event: Vec<TaskDigest>,
    pub at_risk: Vec<AtRiskTask>,
}

/// Tasks due at or before the event date versus incomplete tasks landing
/// after it (or carrying no due date).
pub fn milestone_analysis(
    snapshot: &PlanSnapshot,
    critical_path: &CriticalPath,
    event_date: Timestamp,
) -> MilestoneAnalysis {
    let mut before_event = Vec::new();
    let mut at_risk = Vec::new();

    for task in &snapshot.tasks {
        match task.due_date {
            Some(due) if due <= event_date => before_event.push(task),
            Some(due) => {
                if !task.status.is_terminal() {
                    at_risk.push((task, Some(days_between(event_date, due).ceil() as i64)));
                }
            }
            None => {
                if !task.status.is_terminal() {
                    at_risk.push((task, None));
                }
            }
        }
    }

    let sort_key = |task: &Task| {
        (
            task.due_date.map(|d| d.as_second()).unwrap_or(i64::MAX),
            task.task_id.clone(),
        )
    };
    before_event.sort_by_key(|t| sort_key(t));
    at_risk.sort_by_key(|(t, _)| sort_key(*t));

    MilestoneAnalysis {
        plan_id: snapshot.plan.plan_id.clone(),
        event_date,
        before_event: before_event.into_iter().map(TaskDigest::of).collect(),
        at_risk: at_risk
            .into_iter()
            .map(|(task, days_after_event)| AtRiskTask {
                digest: TaskDigest::of(task),
                days_after_event,
                on_critical_path: critical_path.is_on_path(&task.task_id),
            })
            .collect(),
    }
}

/// Risk badges and dependency counts for the execution (dependency-lens)
/// task listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionTask {
    #[serde(flatten)]
    pub digest: TaskDigest,
    pub risk_badges: Vec<String>,
    pub upstream_count: usize,
    pub downstream_count: usize,
    pub on_critical_path: bool,
}

/// Enriches every task with blocked/blocking/overdue badges and direct
/// dependency counts.
pub fn execution_tasks(
    snapshot: &PlanSnapshot,
    graph: &TaskGraph,
    critical_path: &CriticalPath,
    now: Timestamp,
) -> Vec<ExecutionTask> {
    let task_index = snapshot.task_index();

    // Blocking: incomplete tasks directly upstream of a critical-path task.
    let mut blocking: HashSet<&str> = HashSet::new();
    for task_id in critical_path.on_path_ids() {
        for pred in graph.predecessors(task_id) {
            if task_index
                .get(pred.as_str())
                .is_some_and(|t| t.status != TaskStatus::Completed)
            {
                blocking.insert(pred.as_str());
            }
        }
    }

    snapshot
        .tasks
        .iter()
        .map(|task| {
            let incomplete_upstream = graph.predecessors(&task.task_id).iter().any(|pred| {
                task_index
                    .get(pred.as_str())
                    .is_some_and(|t| t.status != TaskStatus::Completed)
            });
            let mut risk_badges = Vec::new();
            if task.status != TaskStatus::Completed && incomplete_upstream {
                risk_badges.push("blocked".to_string());
            }
            if blocking.contains(task.task_id.as_str()) {
                risk_badges.push("blocking".to_string());
            }
            if task.is_overdue(now) {
                risk_badges.push("overdue".to_string());
            }
            ExecutionTask {
                digest: TaskDigest::of(task),
                risk_badges,
                upstream_count: graph.predecessors(&task.task_id).len(),
                downstream_count: graph.successors(&task.task_id).len(),
                on_critical_path: critical_path.is_on_path(&task.task_id),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::compute_critical_path;
    use crate::testutil::{dep, now_fixture, snapshot, task};

    fn fixture() -> (PlanSnapshot, TaskGraph, CriticalPath) {
        let now = now_fixture();
        let mut snap = snapshot(
            vec![task("t1"), task("t2"), task("t3"), task("t4"), task("t5")],
            vec![dep("t1", "t2")],
        );
        // t1 incomplete predecessor of t2; t2 not started -> blocker
        snap.tasks[0].status = TaskStatus::InProgress;
        snap.tasks[0].percent_complete = 50;
        snap.tasks[0].due_date = Some(add_days(now, -2.0)); // overdue
        snap.tasks[1].due_date = Some(add_days(now, 3.0)); // due soon
        snap.tasks[2].status = TaskStatus::Blocked;
        snap.tasks[2].due_date = Some(add_days(now, 10.0)); // outside window
        snap.tasks[3].status = TaskStatus::Completed;
        snap.tasks[3].percent_complete = 100;
        snap.tasks[3].completed_date = Some(add_days(now, -1.0));
        snap.tasks[3].due_date = Some(add_days(now, -3.0)); // done: not overdue
        snap.tasks[4].due_date = Some(add_days(now, 5.0));
        for t in &mut snap.tasks {
            t.last_modified_at = add_days(now, -10.0);
        }
        snap.tasks[1].last_modified_at = add_days(now, -0.5);
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let cp = compute_critical_path(&snap, &graph, None);
        (snap, graph, cp)
    }

    #[test]
    fn views_classify_tasks() {
        let (snap, graph, cp) = fixture();
        let dashboard = dashboard(&snap, &graph, &cp, now_fixture(), None, DEFAULT_VIEW_LIMIT);

        let ids = |view: &AttentionView| -> Vec<String> {
            view.tasks.iter().map(|t| t.task_id.clone()).collect()
        };
        assert_eq!(ids(&dashboard.blockers), vec!["t2", "t3"]);
        assert_eq!(ids(&dashboard.overdue), vec!["t1"]);
        assert_eq!(ids(&dashboard.due_next_7_days), vec!["t2", "t5"]);
        assert_eq!(ids(&dashboard.recently_changed), vec!["t2"]);
    }

    #[test]
    fn overdue_and_due_soon_are_disjoint() {
        let (snap, graph, cp) = fixture();
        let dashboard = dashboard(&snap, &graph, &cp, now_fixture(), None, DEFAULT_VIEW_LIMIT);
        let overdue: HashSet<String> = dashboard
            .overdue
            .tasks
            .iter()
            .map(|t| t.task_id.clone())
            .collect();
        assert!(dashboard
            .due_next_7_days
            .tasks
            .iter()
            .all(|t| !overdue.contains(&t.task_id)));
    }

    #[test]
    fn empty_plan_has_zero_counts() {
        let snap = snapshot(vec![], vec![]);
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let cp = compute_critical_path(&snap, &graph, None);
        let dashboard = dashboard(&snap, &graph, &cp, now_fixture(), None, DEFAULT_VIEW_LIMIT);
        assert_eq!(dashboard.blockers.count, 0);
        assert_eq!(dashboard.overdue.count, 0);
        assert_eq!(dashboard.due_next_7_days.count, 0);
        assert_eq!(dashboard.critical_path_due_next.count, 0);
        assert_eq!(dashboard.recently_changed.count, 0);
    }

    #[test]
    fn views_are_bounded_and_sorted() {
        let now = now_fixture();
        let mut tasks: Vec<Task> = (0..30).map(|i| task(&format!("t{i:02}"))).collect();
        for (i, t) in tasks.iter_mut().enumerate() {
            t.due_date = Some(add_days(now, -(i as f64) - 1.0));
        }
        let snap = snapshot(tasks, vec![]);
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let cp = compute_critical_path(&snap, &graph, None);
        let dashboard = dashboard(&snap, &graph, &cp, now, None, DEFAULT_VIEW_LIMIT);
        assert_eq!(dashboard.overdue.count, 30);
        assert_eq!(dashboard.overdue.tasks.len(), DEFAULT_VIEW_LIMIT);
        // earliest due first
        assert_eq!(dashboard.overdue.tasks[0].task_id, "t29");
    }

    #[test]
    fn milestone_classifies_before_and_at_risk() {
        let now = now_fixture();
        let (snap, _, cp) = fixture();
        let event = add_days(now, 4.0);
        let analysis = milestone_analysis(&snap, &cp, event);
        let before: Vec<&str> = analysis
            .before_event
            .iter()
            .map(|t| t.task_id.as_str())
            .collect();
        assert_eq!(before, vec!["t4", "t1", "t2"]);
        let at_risk: Vec<&str> = analysis
            .at_risk
            .iter()
            .map(|t| t.digest.task_id.as_str())
            .collect();
        assert_eq!(at_risk, vec!["t5", "t3"]);
        assert_eq!(analysis.at_risk[0].days_after_event, Some(1));
    }

    #[test]
    fn execution_badges() {
        let (snap, graph, cp) = fixture();
        let tasks = execution_tasks(&snap, &graph, &cp, now_fixture());
        let by_id = |id: &str| tasks.iter().find(|t| t.digest.task_id == id).unwrap();
        assert!(by_id("t1").risk_badges.contains(&"overdue".to_string()));
        assert!(by_id("t2").risk_badges.contains(&"blocked".to_string()));
        assert_eq!(by_id("t2").upstream_count, 1);
        assert_eq!(by_id("t1").downstream_count, 1);
    }
}

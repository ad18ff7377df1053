//! Critical-path analysis over the task DAG.
//!
//! Forward/backward pass in fractional days. Dependency-type arithmetic:
//! FS and SF bind predecessor finish to successor start, SS binds the two
//! starts, FF binds the two finishes. Durations come from the PERT
//! most-likely estimate for the task's bucket when calibration is available,
//! else from the planned date range, else one working day.

use std::collections::HashMap;

use crate::models::{DependencyType, PertEstimate, Task};
use crate::snapshot::PlanSnapshot;

use super::builder::TaskGraph;

/// Slack at or below this threshold marks a task as on the critical path.
pub const CP_SLACK_EPSILON: f64 = 1e-9;

/// Default duration when a task has neither calibration nor a date range.
pub const DEFAULT_TASK_DURATION_DAYS: f64 = 1.0;

/// Per-task schedule figures, in fractional days from the schedule origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub duration_days: f64,
    pub early_start: f64,
    pub early_finish: f64,
    pub late_start: f64,
    pub late_finish: f64,
    pub slack: f64,
    pub on_critical_path: bool,
}

/// Result of a critical-path computation. Pure data; no side effects.
#[derive(Debug, Clone)]
pub struct CriticalPath {
    /// Schedule figures keyed by task id
    pub entries: HashMap<String, ScheduleEntry>,
    /// One canonical maximum-weight path, source to sink, for display
    pub canonical_path: Vec<String>,
    /// Plan end: maximum early finish over all tasks
    pub plan_end_days: f64,
    /// Edges excluded by a lenient graph load, echoed for the caller
    pub diagnostics: Vec<String>,
}

impl CriticalPath {
    /// Ids of every task on any maximum-weight path, sorted.
    pub fn on_path_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, e)| e.on_critical_path)
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_on_path(&self, task_id: &str) -> bool {
        self.entries
            .get(task_id)
            .is_some_and(|e| e.on_critical_path)
    }

    pub fn slack_days(&self, task_id: &str) -> Option<f64> {
        self.entries.get(task_id).map(|e| e.slack)
    }
}

/// Point duration estimate for one task, in days.
pub fn task_duration_days(
    task: &Task,
    bucket_name: &str,
    pert_by_bucket: Option<&HashMap<String, PertEstimate>>,
) -> f64 {
    if let Some(estimate) = pert_by_bucket.and_then(|p| p.get(bucket_name)) {
        if estimate.sample_count > 0 {
            return estimate.most_likely.max(0.0);
        }
    }
    match task.planned_duration_days() {
        Some(days) => days.max(1.0),
        None => DEFAULT_TASK_DURATION_DAYS,
    }
}

/// Computes the critical path for a snapshot with explicit per-task
/// durations (the Monte Carlo simulator reuses this with sampled values).
pub fn compute_with_durations(
    graph: &TaskGraph,
    durations: &HashMap<String, f64>,
) -> CriticalPath {
    let mut entries: HashMap<String, ScheduleEntry> = HashMap::with_capacity(durations.len());

    // Forward pass in topological order.
    for task_id in &graph.topo_order {
        let duration = durations.get(task_id).copied().unwrap_or(0.0);
        let mut early_start: f64 = 0.0;
        for pred in graph.predecessors(task_id) {
            let Some(pred_entry) = entries.get(pred) else {
                continue;
            };
            let bound = match graph.edge_type(pred, task_id) {
                DependencyType::FinishToStart | DependencyType::StartToFinish => {
                    pred_entry.early_finish
                }
                DependencyType::StartToStart => pred_entry.early_start,
                DependencyType::FinishToFinish => pred_entry.early_finish - duration,
            };
            early_start = early_start.max(bound);
        }
        entries.insert(
            task_id.clone(),
            ScheduleEntry {
                duration_days: duration,
                early_start,
                early_finish: early_start + duration,
                late_start: 0.0,
                late_finish: 0.0,
                slack: 0.0,
                on_critical_path: false,
            },
        );
    }

    let plan_end_days = entries
        .values()
        .map(|e| e.early_finish)
        .fold(0.0_f64, f64::max);

    // Backward pass in reverse topological order.
    for task_id in graph.topo_order.iter().rev() {
        let duration = entries
            .get(task_id)
            .map(|e| e.duration_days)
            .unwrap_or(0.0);
        let mut late_finish = plan_end_days;
        for succ in graph.successors(task_id) {
            let Some(succ_entry) = entries.get(succ) else {
                continue;
            };
            let bound = match graph.edge_type(task_id, succ) {
                DependencyType::FinishToStart | DependencyType::StartToFinish => {
                    succ_entry.late_start
                }
                DependencyType::StartToStart => succ_entry.late_start + duration,
                DependencyType::FinishToFinish => succ_entry.late_finish,
            };
            late_finish = late_finish.min(bound);
        }
        if let Some(entry) = entries.get_mut(task_id) {
            entry.late_finish = late_finish;
            entry.late_start = late_finish - entry.duration_days;
            entry.slack = entry.late_start - entry.early_start;
            entry.on_critical_path = entry.slack <= CP_SLACK_EPSILON;
        }
    }

    let canonical_path = canonical_path(graph, &entries, plan_end_days);

    CriticalPath {
        entries,
        canonical_path,
        plan_end_days,
        diagnostics: graph
            .excluded_edges
            .iter()
            .map(|d| {
                format!(
                    "excluded cyclic dependency {} -> {}",
                    d.predecessor_id, d.successor_id
                )
            })
            .collect(),
    }
}

/// Computes the critical path for a snapshot using the standard duration
/// source (PERT most-likely, else planned range, else the default).
pub fn compute(
    snapshot: &PlanSnapshot,
    graph: &TaskGraph,
    pert_by_bucket: Option<&HashMap<String, PertEstimate>>,
) -> CriticalPath {
    let durations: HashMap<String, f64> = snapshot
        .tasks
        .iter()
        .map(|task| {
            let bucket = snapshot.bucket_name(&task.bucket_id);
            (
                task.task_id.clone(),
                task_duration_days(task, bucket, pert_by_bucket),
            )
        })
        .collect();
    compute_with_durations(graph, &durations)
}

// Backtrack one canonical maximum path from the end of the plan. Ties are
// broken toward the lexicographically smallest task id at every hop.
fn canonical_path(
    graph: &TaskGraph,
    entries: &HashMap<String, ScheduleEntry>,
    plan_end_days: f64,
) -> Vec<String> {
    let mut end: Option<&str> = None;
    for task_id in graph.topo_order.iter() {
        let Some(entry) = entries.get(task_id) else {
            continue;
        };
        if entry.on_critical_path && (plan_end_days - entry.early_finish).abs() <= CP_SLACK_EPSILON
        {
            match end {
                Some(current) if current <= task_id.as_str() => {}
                _ => end = Some(task_id.as_str()),
            }
        }
    }

    let Some(end) = end else {
        return Vec::new();
    };

    let mut path = vec![end.to_string()];
    let mut current = end.to_string();
    loop {
        let Some(current_entry) = entries.get(&current) else {
            break;
        };
        let mut binding: Option<&str> = None;
        for pred in graph.predecessors(&current) {
            let Some(pred_entry) = entries.get(pred) else {
                continue;
            };
            if !pred_entry.on_critical_path {
                continue;
            }
            let tight = match graph.edge_type(pred, &current) {
                DependencyType::FinishToStart | DependencyType::StartToFinish => {
                    (pred_entry.early_finish - current_entry.early_start).abs()
                        <= CP_SLACK_EPSILON
                }
                DependencyType::StartToStart => {
                    (pred_entry.early_start - current_entry.early_start).abs()
                        <= CP_SLACK_EPSILON
                }
                DependencyType::FinishToFinish => {
                    (pred_entry.early_finish - current_entry.early_finish).abs()
                        <= CP_SLACK_EPSILON
                }
            };
            if tight && binding.is_none_or(|best| pred.as_str() < best) {
                binding = Some(pred.as_str());
            }
        }
        match binding {
            Some(pred) => {
                path.push(pred.to_string());
                current = pred.to_string();
            }
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DependencyType;
    use crate::testutil::{dep, dep_typed, snapshot, task};

    fn pert(bucket: &str, m: f64) -> HashMap<String, PertEstimate> {
        let mut map = HashMap::new();
        map.insert(
            bucket.to_string(),
            PertEstimate {
                optimistic: m - 1.0,
                most_likely: m,
                pessimistic: m + 1.0,
                bias_factor: 1.0,
                sample_count: 10,
            },
        );
        map
    }

    #[test]
    fn linear_chain_end_is_duration_sum() {
        // S1 shape: durations 2, 3, 4 -> end at 9 days.
        let snap = snapshot(
            vec![task("t1"), task("t2"), task("t3")],
            vec![dep("t1", "t2"), dep("t2", "t3")],
        );
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let durations: HashMap<String, f64> =
            [("t1", 2.0), ("t2", 3.0), ("t3", 4.0)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
        let cp = compute_with_durations(&graph, &durations);
        assert_eq!(cp.plan_end_days, 9.0);
        assert_eq!(cp.canonical_path, vec!["t1", "t2", "t3"]);
        assert_eq!(cp.on_path_ids(), vec!["t1", "t2", "t3"]);
        assert_eq!(cp.slack_days("t2"), Some(0.0));
    }

    #[test]
    fn parallel_branches_tie_canonical_is_lexicographic() {
        // S2 shape: diamond with equal durations. All four tasks are on a
        // maximum path; the canonical path takes t2 over t3.
        let snap = snapshot(
            vec![task("t1"), task("t2"), task("t3"), task("t4")],
            vec![
                dep("t1", "t2"),
                dep("t1", "t3"),
                dep("t2", "t4"),
                dep("t3", "t4"),
            ],
        );
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let durations: HashMap<String, f64> = snap
            .tasks
            .iter()
            .map(|t| (t.task_id.clone(), 2.0))
            .collect();
        let cp = compute_with_durations(&graph, &durations);
        assert_eq!(cp.plan_end_days, 6.0);
        assert_eq!(cp.canonical_path, vec!["t1", "t2", "t4"]);
        assert_eq!(cp.on_path_ids(), vec!["t1", "t2", "t3", "t4"]);
    }

    #[test]
    fn off_path_branch_has_slack() {
        let snap = snapshot(
            vec![task("t1"), task("t2"), task("t3")],
            vec![dep("t1", "t3"), dep("t2", "t3")],
        );
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let durations: HashMap<String, f64> =
            [("t1", 5.0), ("t2", 1.0), ("t3", 2.0)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
        let cp = compute_with_durations(&graph, &durations);
        assert_eq!(cp.plan_end_days, 7.0);
        assert!(!cp.is_on_path("t2"));
        assert_eq!(cp.slack_days("t2"), Some(4.0));
    }

    #[test]
    fn start_to_start_binds_starts() {
        let snap = snapshot(
            vec![task("t1"), task("t2")],
            vec![dep_typed("t1", "t2", DependencyType::StartToStart)],
        );
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let durations: HashMap<String, f64> = [("t1", 4.0), ("t2", 2.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let cp = compute_with_durations(&graph, &durations);
        // t2 may start with t1; the plan ends with t1.
        assert_eq!(cp.entries["t2"].early_start, 0.0);
        assert_eq!(cp.plan_end_days, 4.0);
        assert!(cp.is_on_path("t1"));
    }

    #[test]
    fn finish_to_finish_binds_finishes() {
        let snap = snapshot(
            vec![task("t1"), task("t2")],
            vec![dep_typed("t1", "t2", DependencyType::FinishToFinish)],
        );
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let durations: HashMap<String, f64> = [("t1", 4.0), ("t2", 1.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let cp = compute_with_durations(&graph, &durations);
        assert_eq!(cp.entries["t2"].early_start, 3.0);
        assert_eq!(cp.entries["t2"].early_finish, 4.0);
        assert_eq!(cp.plan_end_days, 4.0);
    }

    #[test]
    fn empty_plan_has_empty_path() {
        let snap = snapshot(vec![], vec![]);
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let cp = compute(&snap, &graph, None);
        assert_eq!(cp.plan_end_days, 0.0);
        assert!(cp.canonical_path.is_empty());
        assert!(cp.entries.is_empty());
    }

    #[test]
    fn single_task_plan_cp_is_that_task() {
        let snap = snapshot(vec![task("only")], vec![]);
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let cp = compute(&snap, &graph, None);
        assert_eq!(cp.canonical_path, vec!["only"]);
        assert!(cp.is_on_path("only"));
        assert_eq!(cp.plan_end_days, 1.0);
    }

    #[test]
    fn duration_prefers_calibration_over_dates() {
        let mut t = task("t1");
        t.start_date = Some("2026-03-01T00:00:00Z".parse().unwrap());
        t.due_date = Some("2026-03-11T00:00:00Z".parse().unwrap());
        let calibrated = pert("Registration", 3.5);
        assert_eq!(
            task_duration_days(&t, "Registration", Some(&calibrated)),
            3.5
        );
        assert_eq!(task_duration_days(&t, "Registration", None), 10.0);
        t.start_date = None;
        t.due_date = None;
        assert_eq!(task_duration_days(&t, "Registration", None), 1.0);
    }
}

//! Multi-objective plan cost: C_total = Σ wᵢ·Cᵢ over schedule, resource,
//! risk, quality and disruption components.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::dates::{add_days, days_between};
use crate::graph::TaskGraph;
use crate::snapshot::PlanSnapshot;

/// Component weights. Defaults mirror the reference weighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostWeights {
    pub schedule: f64,
    pub resource: f64,
    pub risk: f64,
    pub quality: f64,
    pub disruption: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            schedule: 1.0,
            resource: 0.8,
            risk: 1.2,
            quality: 0.5,
            disruption: 0.3,
        }
    }
}

/// The cost breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostReport {
    pub plan_id: String,
    pub total_cost: f64,
    pub breakdown: BTreeMap<String, f64>,
    pub weights: CostWeights,
}

// Schedule-cost tuning.
const TARDINESS_ALPHA: f64 = 1.0;
const EARLINESS_BETA: f64 = 0.5;
const CRITICAL_GAMMA: f64 = 3.0;

// Resource-cost tuning.
const OVERALLOC_DELTA: f64 = 1.0;
const UNDERUTIL_EPSILON: f64 = 0.5;
const CONTEXT_SWITCH_ZETA: f64 = 0.2;
const MAX_CONCURRENT_TASKS: f64 = 5.0;
const MIN_CONCURRENT_TASKS: f64 = 1.0;

// Risk-cost tuning.
const RISK_ETA: f64 = 2.0;
const NOT_STARTED_DELAY_PROB: f64 = 0.3;

/// Computes the weighted plan cost.
pub fn compute(
    snapshot: &PlanSnapshot,
    graph: &TaskGraph,
    weights: &CostWeights,
    now: Timestamp,
) -> CostReport {
    let schedule = schedule_cost(snapshot, graph, now);
    let resource = resource_cost(snapshot);
    let risk = risk_cost(snapshot, graph, now);
    // Quality (speaker/topic fit) and disruption (replan cascades) have no
    // data source yet and contribute zero.
    let quality = 0.0;
    let disruption = 0.0;

    let total_cost = weights.schedule * schedule
        + weights.resource * resource
        + weights.risk * risk
        + weights.quality * quality
        + weights.disruption * disruption;

    let breakdown = [
        ("schedule", schedule),
        ("resource", resource),
        ("risk", risk),
        ("quality", quality),
        ("disruption", disruption),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    CostReport {
        plan_id: snapshot.plan.plan_id.clone(),
        total_cost,
        breakdown,
        weights: weights.clone(),
    }
}

// Quadratic tardiness, linear earliness credit, and a linear multiplier for
// late tasks with many dependents.
fn schedule_cost(snapshot: &PlanSnapshot, graph: &TaskGraph, now: Timestamp) -> f64 {
    let max_downstream = snapshot
        .tasks
        .iter()
        .map(|t| graph.successors(&t.task_id).len())
        .max()
        .unwrap_or(0) as f64;
    let critical_threshold = max_downstream * 0.7;

    let mut cost = 0.0;
    for task in &snapshot.tasks {
        let (Some(start), Some(due)) = (task.start_date, task.due_date) else {
            continue;
        };
        let estimated_end = match task.completed_date {
            Some(completed) => completed,
            None if task.percent_complete >= 100 => due,
            None => {
                let planned = days_between(start, due);
                let remaining = planned * (1.0 - f64::from(task.percent_complete) / 100.0);
                add_days(now, remaining)
            }
        };
        let tardiness = days_between(due, estimated_end).max(0.0);
        let earliness = days_between(estimated_end, due).max(0.0);

        cost += TARDINESS_ALPHA * tardiness * tardiness;
        cost -= EARLINESS_BETA * earliness;

        let downstream = graph.successors(&task.task_id).len() as f64;
        if downstream >= critical_threshold && max_downstream > 0.0 && tardiness > 0.0 {
            cost += CRITICAL_GAMMA * tardiness;
        }
    }
    cost
}

// Over-allocation (quadratic), under-utilization and context-switch
// penalties per assignee.
fn resource_cost(snapshot: &PlanSnapshot) -> f64 {
    let mut per_assignee: BTreeMap<&str, f64> = BTreeMap::new();
    for task in &snapshot.tasks {
        for assignee in &task.assignees {
            *per_assignee.entry(assignee.as_str()).or_default() += 1.0;
        }
    }

    let mut cost = 0.0;
    for utilization in per_assignee.values() {
        if *utilization > MAX_CONCURRENT_TASKS {
            cost += OVERALLOC_DELTA * (utilization - MAX_CONCURRENT_TASKS).powi(2);
        }
        if *utilization < MIN_CONCURRENT_TASKS {
            cost += UNDERUTIL_EPSILON * (MIN_CONCURRENT_TASKS - utilization);
        }
        if *utilization > 1.0 {
            cost += CONTEXT_SWITCH_ZETA * (utilization - 1.0);
        }
    }
    cost
}

// P(delay) estimated from progress against elapsed time, times an impact
// magnitude from priority and downstream fan-out.
fn risk_cost(snapshot: &PlanSnapshot, graph: &TaskGraph, now: Timestamp) -> f64 {
    let mut cost = 0.0;
    for task in &snapshot.tasks {
        let (Some(start), Some(due)) = (task.start_date, task.due_date) else {
            continue;
        };
        if task.completed_date.is_some() {
            continue;
        }
        let planned = days_between(start, due);
        if planned <= 0.0 {
            continue;
        }

        let progress = f64::from(task.percent_complete) / 100.0;
        let elapsed = days_between(start, now).max(0.0);
        let delay_prob = if progress > 0.0 {
            let expected_elapsed = planned * progress;
            if elapsed > expected_elapsed {
                ((elapsed - expected_elapsed) / planned).min(1.0)
            } else {
                0.0
            }
        } else {
            NOT_STARTED_DELAY_PROB
        };

        if delay_prob > 0.0 {
            let impact = (11.0 - f64::from(task.priority)) / 10.0
                + graph.successors(&task.task_id).len() as f64 * 0.1;
            cost += RISK_ETA * delay_prob * impact;
        }
    }
    cost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{dep, now_fixture, snapshot, task};

    #[test]
    fn empty_plan_costs_nothing() {
        let snap = snapshot(vec![], vec![]);
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let report = compute(&snap, &graph, &CostWeights::default(), now_fixture());
        assert_eq!(report.total_cost, 0.0);
    }

    #[test]
    fn late_completion_is_penalized_quadratically() {
        let now = now_fixture();
        let mut snap = snapshot(vec![task("t1")], vec![]);
        snap.tasks[0].start_date = Some(add_days(now, -10.0));
        snap.tasks[0].due_date = Some(add_days(now, -5.0));
        snap.tasks[0].completed_date = Some(add_days(now, -2.0));
        snap.tasks[0].assignees = vec!["alice".into()];
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let report = compute(&snap, &graph, &CostWeights::default(), now);
        // 3 days late -> quadratic tardiness 9; no dependents, no multiplier
        let schedule = report.breakdown["schedule"];
        assert!((schedule - 9.0).abs() < 1e-9, "schedule {schedule}");
    }

    #[test]
    fn overloaded_assignee_raises_resource_cost() {
        let now = now_fixture();
        let tasks: Vec<_> = (0..7)
            .map(|i| {
                let mut t = task(&format!("t{i}"));
                t.assignees = vec!["alice".into()];
                t
            })
            .collect();
        let snap = snapshot(tasks, vec![]);
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let report = compute(&snap, &graph, &CostWeights::default(), now);
        // overalloc (7-5)^2 = 4, context switches 0.2*6 = 1.2
        assert!((report.breakdown["resource"] - 5.2).abs() < 1e-9);
    }

    #[test]
    fn unstarted_tasks_carry_base_risk() {
        let now = now_fixture();
        let mut snap = snapshot(vec![task("t1"), task("t2")], vec![dep("t1", "t2")]);
        for t in &mut snap.tasks {
            t.start_date = Some(add_days(now, -1.0));
            t.due_date = Some(add_days(now, 4.0));
        }
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let report = compute(&snap, &graph, &CostWeights::default(), now);
        // t1: 0.3 * (0.6 + 0.1) * 2 ; t2: 0.3 * 0.6 * 2
        let expected = 2.0 * 0.3 * 0.7 + 2.0 * 0.3 * 0.6;
        assert!((report.breakdown["risk"] - expected).abs() < 1e-9);
        assert!(report.total_cost > 0.0);
    }
}

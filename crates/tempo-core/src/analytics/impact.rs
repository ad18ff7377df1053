//! What-if analysis: downstream closure and plan-end shift of a proposed
//! task edit. Pure preview with no persistence effects; identical inputs
//! produce identical output.

use std::collections::HashMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::dates::days_between;
use crate::error::{PlannerError, Result};
use crate::graph::{self, TaskGraph, CP_SLACK_EPSILON};
use crate::models::PertEstimate;
use crate::snapshot::PlanSnapshot;

use super::monte_carlo::{self, SimulationConfig};

/// A proposed in-memory change to one task. All fields optional; only the
/// supplied ones are applied for the preview.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposedChange {
    pub due_date: Option<Timestamp>,
    pub start_date: Option<Timestamp>,
    pub assignees: Option<Vec<String>>,
    pub percent_complete: Option<u8>,
    /// Explicit slippage in days, overriding the due-date delta
    pub slippage_days: Option<f64>,
}

/// Probabilistic deltas from an optional seeded simulation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedImpact {
    pub delta_p50_days: f64,
    pub delta_p95_days: f64,
    /// Change in probability-on-time, percentage points
    pub delta_probability_on_time: Option<f64>,
}

/// Result of an impact preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    pub plan_id: String,
    pub task_id: String,
    /// The edited task plus every transitive successor whose earliest
    /// finish moves by more than epsilon, sorted by id
    pub affected_task_ids: Vec<String>,
    /// Size of the downstream closure (excluding the task itself)
    pub downstream_count: usize,
    pub delta_plan_end_days: f64,
    pub critical_path_impact: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulated: Option<SimulatedImpact>,
    pub diagnostics: Vec<String>,
}

/// Computes the impact of `change` on `task_id` without touching storage.
///
/// The slippage (explicit `slippage_days`, else the positive due-date delta)
/// is modeled as additional duration on the target task, and the critical
/// path is recomputed against the baseline.
pub fn analyze(
    snapshot: &PlanSnapshot,
    graph: &TaskGraph,
    task_id: &str,
    change: &ProposedChange,
    pert_by_bucket: Option<&HashMap<String, PertEstimate>>,
    simulation: Option<(&HashMap<String, PertEstimate>, &SimulationConfig, Timestamp)>,
    cancel: &CancelToken,
) -> Result<ImpactReport> {
    let task = snapshot
        .task(task_id)
        .ok_or_else(|| PlannerError::task_not_found(&snapshot.plan.plan_id, task_id))?;

    let slippage_days = change.slippage_days.unwrap_or_else(|| {
        match (change.due_date, task.due_date) {
            (Some(new_due), Some(old_due)) => days_between(old_due, new_due).max(0.0),
            _ => 0.0,
        }
    });

    let baseline = graph::compute_critical_path(snapshot, graph, pert_by_bucket);

    let mut durations: HashMap<String, f64> = snapshot
        .tasks
        .iter()
        .map(|t| {
            let bucket = snapshot.bucket_name(&t.bucket_id);
            (
                t.task_id.clone(),
                graph::task_duration_days(t, bucket, pert_by_bucket),
            )
        })
        .collect();
    if let Some(duration) = durations.get_mut(task_id) {
        *duration += slippage_days;
    }
    let modified = graph::compute_with_durations(graph, &durations);

    let mut affected: Vec<String> = Vec::new();
    for (id, entry) in &modified.entries {
        let baseline_finish = baseline
            .entries
            .get(id)
            .map(|e| e.early_finish)
            .unwrap_or(0.0);
        if entry.early_finish - baseline_finish > CP_SLACK_EPSILON {
            affected.push(id.clone());
        }
    }
    affected.sort();

    let downstream = graph.downstream_closure(task_id);
    let delta_plan_end_days = modified.plan_end_days - baseline.plan_end_days;
    let critical_path_impact =
        baseline.is_on_path(task_id) || downstream.iter().any(|id| baseline.is_on_path(id));

    let message = if downstream.is_empty() {
        format!(
            "Shifting '{}' by {:.0} days moves no downstream tasks.",
            task.title, slippage_days
        )
    } else {
        let titles: Vec<&str> = downstream
            .iter()
            .take(5)
            .filter_map(|id| snapshot.task(id).map(|t| t.title.as_str()))
            .collect();
        format!(
            "If '{}' slips {:.0} days, {} downstream task(s) may move: {}{}",
            task.title,
            slippage_days,
            downstream.len(),
            titles.join(", "),
            if downstream.len() > titles.len() {
                ", …"
            } else {
                ""
            }
        )
    };

    let simulated = match simulation {
        Some((pert, config, now)) => {
            Some(simulate_delta(snapshot, graph, task_id, slippage_days, pert, config, now, cancel)?)
        }
        None => None,
    };

    Ok(ImpactReport {
        plan_id: snapshot.plan.plan_id.clone(),
        task_id: task_id.to_string(),
        affected_task_ids: affected,
        downstream_count: downstream.len(),
        delta_plan_end_days,
        critical_path_impact,
        message,
        simulated,
        diagnostics: modified.diagnostics,
    })
}

// Seeded low-iteration simulation of the before/after schedules. The same
// seed is used for both passes so the delta isolates the edit.
#[allow(clippy::too_many_arguments)]
fn simulate_delta(
    snapshot: &PlanSnapshot,
    graph: &TaskGraph,
    task_id: &str,
    slippage_days: f64,
    pert_by_bucket: &HashMap<String, PertEstimate>,
    config: &SimulationConfig,
    now: Timestamp,
    cancel: &CancelToken,
) -> Result<SimulatedImpact> {
    let seeded = SimulationConfig {
        iterations: config.iterations.min(1_000),
        seed: Some(config.seed.unwrap_or(42)),
        ..config.clone()
    };
    let before = monte_carlo::run(
        snapshot,
        graph,
        pert_by_bucket,
        Some(PertEstimate::global_prior()),
        now,
        cancel,
        &seeded,
    )?;

    let mut shifted = snapshot.clone();
    if let Some(task) = shifted.tasks.iter_mut().find(|t| t.task_id == task_id) {
        task.due_date = task
            .due_date
            .map(|due| crate::dates::add_days(due, slippage_days));
        task.start_date = task
            .start_date
            .map(|start| crate::dates::add_days(start, slippage_days));
    }
    // A pure due shift does not change sampled durations; model the slip as
    // extra most-likely time in the target task's bucket estimate.
    let target_bucket = snapshot
        .task(task_id)
        .map(|t| snapshot.bucket_name(&t.bucket_id).to_string())
        .unwrap_or_default();
    let mut shifted_pert = pert_by_bucket.clone();
    let entry = shifted_pert
        .entry(target_bucket)
        .or_insert_with(PertEstimate::global_prior);
    entry.optimistic += slippage_days;
    entry.most_likely += slippage_days;
    entry.pessimistic += slippage_days;

    let after = monte_carlo::run(
        &shifted,
        graph,
        &shifted_pert,
        Some(PertEstimate::global_prior()),
        now,
        cancel,
        &seeded,
    )?;

    Ok(SimulatedImpact {
        delta_p50_days: days_between(before.percentiles.p50, after.percentiles.p50),
        delta_p95_days: days_between(before.percentiles.p95, after.percentiles.p95),
        delta_probability_on_time: match (
            before.probability_on_time_percent,
            after.probability_on_time_percent,
        ) {
            (Some(before), Some(after)) => Some(after - before),
            _ => None,
        },
    })
}

//! Task intelligence: fuses critical-path, simulation, Markov and
//! historical signals into a risk score, dependency risks, timeline and
//! resource suggestions, and assignee recommendations.
//!
//! Sub-computations are best-effort: a failing section lands in the
//! bundle's diagnostics instead of failing the call. Only an unknown task
//! is a hard error.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::dates::{days_between, whole_days_late};
use crate::graph::{CriticalPath, TaskGraph};
use crate::models::{Task, TaskStatus};
use crate::snapshot::PlanSnapshot;

use super::historical::HistoricalInsights;
use super::markov::AbsorptionAnalysis;
use super::monte_carlo::SimulationReport;

/// Risk-score weights: 30·H + 25·T + 20·R + 15·C + 10·O, H/T/R capped.
const WEIGHT_HIGH_DEPENDENCY: f64 = 30.0;
const WEIGHT_TIMELINE: f64 = 25.0;
const WEIGHT_RESOURCE: f64 = 20.0;
const WEIGHT_CRITICAL_PATH: f64 = 15.0;
const WEIGHT_OVERDUE: f64 = 10.0;
const FACTOR_CAP: usize = 3;

/// Due-soon horizon for the "at risk" timeline heuristic, in days.
const AT_RISK_HORIZON_DAYS: f64 = 3.0;

/// Slack below this marks an on-CP task as "cp-tight", in days.
const CP_TIGHT_SLACK_DAYS: f64 = 2.0;

/// Assignees above this active-task load count as overloaded.
const OVERLOAD_ACTIVE_TASKS: usize = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Risk assessment of one upstream dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRisk {
    pub task_id: String,
    pub title: String,
    pub level: RiskLevel,
    pub status: TaskStatus,
    pub is_delayed: bool,
    pub delay_days: i64,
    pub on_critical_path: bool,
    pub suggestion: String,
}

/// A timeline or resource suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub kind: String,
    pub severity: RiskLevel,
    pub title: String,
    pub detail: String,
}

/// A scored assignee recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssigneeRecommendation {
    pub assignee: String,
    pub score: f64,
    pub active_tasks: usize,
    pub overdue_tasks: usize,
    pub historical_completion_rate: f64,
    pub currently_assigned: bool,
    pub reason: String,
}

/// Monte Carlo digest for the task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub p50_finish: Timestamp,
    pub p95_finish: Timestamp,
    pub cp_probability: f64,
}

/// Markov digest for the task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkovSummary {
    pub current_state: TaskStatus,
    /// NaN propagates as null through serialization when the chain was
    /// near-singular
    pub expected_days_to_absorption: f64,
    pub variance_days2: f64,
}

/// The full intelligence bundle for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskIntelligence {
    pub plan_id: String,
    pub task_id: String,
    /// 0-100
    pub risk_score: u32,
    pub risk_factors: Vec<String>,
    pub dependency_risks: Vec<DependencyRisk>,
    pub timeline_suggestions: Vec<Suggestion>,
    pub resource_suggestions: Vec<Suggestion>,
    pub optimal_assignees: Vec<AssigneeRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markov: Option<MarkovSummary>,
    pub diagnostics: Vec<String>,
}

/// Inputs beyond the snapshot; optional sections degrade to diagnostics.
pub struct IntelligenceInputs<'a> {
    pub insights: Option<&'a HistoricalInsights>,
    pub simulation: Option<&'a SimulationReport>,
    pub markov_state: Option<TaskStatus>,
    pub absorption: Option<&'a AbsorptionAnalysis>,
    pub diagnostics: Vec<String>,
}

/// Builds the intelligence bundle for `(plan, task)`.
pub fn analyze(
    snapshot: &PlanSnapshot,
    graph: &TaskGraph,
    critical_path: &CriticalPath,
    task_id: &str,
    now: Timestamp,
    inputs: IntelligenceInputs<'_>,
) -> crate::error::Result<TaskIntelligence> {
    let task = snapshot
        .task(task_id)
        .ok_or_else(|| crate::error::PlannerError::task_not_found(&snapshot.plan.plan_id, task_id))?;

    let mut diagnostics = inputs.diagnostics;

    let dependency_risks = dependency_risks(snapshot, graph, critical_path, task_id, now);
    let timeline_suggestions =
        timeline_suggestions(task, critical_path, inputs.simulation, now);
    let (resource_suggestions, optimal_assignees) =
        resource_analysis(snapshot, task, inputs.insights, now);

    let on_cp = critical_path.is_on_path(task_id);
    let overdue = task.is_overdue(now);

    let high_deps = dependency_risks
        .iter()
        .filter(|r| r.level == RiskLevel::High)
        .count()
        .min(FACTOR_CAP);
    let timeline_risks = timeline_suggestions
        .iter()
        .filter(|s| s.severity == RiskLevel::High)
        .count()
        .min(FACTOR_CAP);
    let resource_risks = resource_suggestions
        .iter()
        .filter(|s| s.kind == "resource_overload")
        .count()
        .min(FACTOR_CAP);

    let raw_score = WEIGHT_HIGH_DEPENDENCY * high_deps as f64
        + WEIGHT_TIMELINE * timeline_risks as f64
        + WEIGHT_RESOURCE * resource_risks as f64
        + WEIGHT_CRITICAL_PATH * f64::from(u8::from(on_cp))
        + WEIGHT_OVERDUE * f64::from(u8::from(overdue));
    let risk_score = raw_score.min(100.0).round() as u32;

    let mut risk_factors = Vec::new();
    if high_deps > 0 {
        risk_factors.push(format!("{high_deps} high-risk dependencies"));
    }
    if timeline_risks > 0 {
        risk_factors.push(format!("{timeline_risks} timeline risks"));
    }
    if resource_risks > 0 {
        risk_factors.push(format!("{resource_risks} overloaded assignees"));
    }
    if on_cp {
        risk_factors.push("On critical path".to_string());
    }
    if overdue {
        risk_factors.push("Overdue".to_string());
    }

    let simulation = match inputs.simulation {
        Some(report) => match report.task_finish.get(task_id) {
            Some(finish) => Some(SimulationSummary {
                p50_finish: finish.p50,
                p95_finish: finish.p95,
                cp_probability: report.cp_probability.get(task_id).copied().unwrap_or(0.0),
            }),
            None => {
                diagnostics.push("simulation report does not cover this task".to_string());
                None
            }
        },
        None => None,
    };

    let markov = match (inputs.markov_state, inputs.absorption) {
        (Some(state), Some(absorption)) => {
            let key = state.as_str();
            let expected = absorption.expected_days.get(key).copied().unwrap_or(0.0);
            let variance = absorption.variance_days2.get(key).copied().unwrap_or(0.0);
            if expected.is_nan() {
                diagnostics
                    .push("expected absorption time undefined (near-singular chain)".to_string());
            }
            Some(MarkovSummary {
                current_state: state,
                expected_days_to_absorption: expected,
                variance_days2: variance,
            })
        }
        _ => None,
    };

    Ok(TaskIntelligence {
        plan_id: snapshot.plan.plan_id.clone(),
        task_id: task_id.to_string(),
        risk_score,
        risk_factors,
        dependency_risks,
        timeline_suggestions,
        resource_suggestions,
        optimal_assignees,
        simulation,
        markov,
        diagnostics,
    })
}

// Level: high iff delayed AND on-CP; medium iff delayed or blocked or
// otherwise incomplete past its plan; low for healthy upstreams.
fn dependency_risks(
    snapshot: &PlanSnapshot,
    graph: &TaskGraph,
    critical_path: &CriticalPath,
    task_id: &str,
    now: Timestamp,
) -> Vec<DependencyRisk> {
    let mut risks = Vec::new();
    for upstream_id in graph.predecessors(task_id) {
        let Some(upstream) = snapshot.task(upstream_id) else {
            continue;
        };
        let (is_delayed, delay_days) = match (upstream.due_date, upstream.completed_date) {
            (Some(due), None) if due < now => (true, whole_days_late(due, now)),
            (Some(due), Some(completed)) if completed > due => {
                (true, whole_days_late(due, completed))
            }
            _ => (false, 0),
        };
        let on_cp = critical_path.is_on_path(upstream_id);
        let blocked = upstream.status == TaskStatus::Blocked;
        let incomplete = !upstream.status.is_terminal();

        let level = if is_delayed && on_cp && incomplete {
            RiskLevel::High
        } else if is_delayed || blocked {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        let suggestion = if blocked && is_delayed {
            format!(
                "Dependency '{}' is blocked and {delay_days} day(s) late. Consider parallel work or expediting.",
                upstream.title
            )
        } else if is_delayed {
            format!(
                "Dependency '{}' is {delay_days} day(s) late. Monitor closely.",
                upstream.title
            )
        } else if incomplete {
            format!(
                "Waiting on dependency '{}'. Ensure it stays on track.",
                upstream.title
            )
        } else {
            "Dependency is on track.".to_string()
        };

        risks.push(DependencyRisk {
            task_id: upstream_id.clone(),
            title: upstream.title.clone(),
            level,
            status: upstream.status,
            is_delayed,
            delay_days,
            on_critical_path: on_cp,
            suggestion,
        });
    }
    risks
}

fn timeline_suggestions(
    task: &Task,
    critical_path: &CriticalPath,
    simulation: Option<&SimulationReport>,
    now: Timestamp,
) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    if task.is_overdue(now) {
        let late = task
            .due_date
            .map(|due| whole_days_late(due, now))
            .unwrap_or(0);
        suggestions.push(Suggestion {
            kind: "overdue".to_string(),
            severity: RiskLevel::High,
            title: format!("Overdue by {late} day(s)"),
            detail: "Due date has passed without completion. Re-plan or escalate.".to_string(),
        });
    }

    if let Some(due) = task.due_date {
        let days_left = days_between(now, due);
        if !task.status.is_terminal()
            && (0.0..=AT_RISK_HORIZON_DAYS).contains(&days_left)
            && task.percent_complete < 50
        {
            suggestions.push(Suggestion {
                kind: "at_risk".to_string(),
                severity: RiskLevel::High,
                title: format!(
                    "At risk: {}% done with {:.0} day(s) left",
                    task.percent_complete, days_left
                ),
                detail: "Progress is behind the remaining window. Add resources or re-scope."
                    .to_string(),
            });
        }
    }

    if critical_path.is_on_path(&task.task_id) {
        if let Some(slack) = critical_path.slack_days(&task.task_id) {
            if slack < CP_TIGHT_SLACK_DAYS {
                suggestions.push(Suggestion {
                    kind: "cp_tight".to_string(),
                    severity: RiskLevel::Medium,
                    title: "Critical path with tight slack".to_string(),
                    detail: format!(
                        "On the critical path with {slack:.1} day(s) of slack. Delays move the plan end."
                    ),
                });
            }
        }
    }

    if let Some(report) = simulation {
        if let (Some(due), Some(finish)) = (task.due_date, report.task_finish.get(&task.task_id)) {
            let predicted_slip = days_between(due, finish.p50);
            if predicted_slip > 0.5 {
                suggestions.push(Suggestion {
                    kind: "predicted_delay".to_string(),
                    severity: if predicted_slip > 7.0 {
                        RiskLevel::High
                    } else {
                        RiskLevel::Medium
                    },
                    title: format!("Simulation predicts {predicted_slip:.0} day(s) of slip"),
                    detail: format!(
                        "Median simulated finish lands {predicted_slip:.1} day(s) after the due date."
                    ),
                });
            }
        }
    }

    suggestions
}

// score = 0.5·historicalCompletionRate - 0.3·activeLoad/maxLoad
//         - 0.2·overdueCount/maxOverdue; top 3 plus the current assignees.
fn resource_analysis(
    snapshot: &PlanSnapshot,
    task: &Task,
    insights: Option<&HistoricalInsights>,
    now: Timestamp,
) -> (Vec<Suggestion>, Vec<AssigneeRecommendation>) {
    let mut active: BTreeMap<&str, usize> = BTreeMap::new();
    let mut overdue: BTreeMap<&str, usize> = BTreeMap::new();
    for other in &snapshot.tasks {
        if other.task_id == task.task_id {
            continue;
        }
        for assignee in &other.assignees {
            if !other.status.is_terminal() {
                *active.entry(assignee.as_str()).or_default() += 1;
                if other.is_overdue(now) {
                    *overdue.entry(assignee.as_str()).or_default() += 1;
                }
            }
        }
    }

    let candidates = snapshot.all_assignees();
    let max_load = candidates
        .iter()
        .map(|a| active.get(a).copied().unwrap_or(0))
        .max()
        .unwrap_or(0)
        .max(1);
    let max_overdue = candidates
        .iter()
        .map(|a| overdue.get(a).copied().unwrap_or(0))
        .max()
        .unwrap_or(0)
        .max(1);

    let completion_rate = |assignee: &str| -> f64 {
        insights
            .and_then(|i| i.assignee_throughput.get(assignee))
            .map(|stats| (stats.tasks_per_week / 2.0).clamp(0.0, 1.0))
            .unwrap_or(0.5)
    };

    let mut recommendations: Vec<AssigneeRecommendation> = candidates
        .iter()
        .map(|assignee| {
            let active_tasks = active.get(assignee).copied().unwrap_or(0);
            let overdue_tasks = overdue.get(assignee).copied().unwrap_or(0);
            let rate = completion_rate(assignee);
            let score = 0.5 * rate - 0.3 * active_tasks as f64 / max_load as f64
                - 0.2 * overdue_tasks as f64 / max_overdue as f64;
            AssigneeRecommendation {
                assignee: assignee.to_string(),
                score,
                active_tasks,
                overdue_tasks,
                historical_completion_rate: rate,
                currently_assigned: task.assignees.iter().any(|a| a == assignee),
                reason: format!(
                    "{assignee}: {active_tasks} active task(s), {overdue_tasks} overdue, completion rate {:.0}%",
                    rate * 100.0
                ),
            }
        })
        .collect();
    recommendations.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.assignee.cmp(&b.assignee))
    });

    let mut top: Vec<AssigneeRecommendation> = recommendations.iter().take(3).cloned().collect();
    for current in recommendations
        .iter()
        .filter(|r| r.currently_assigned)
        .cloned()
    {
        if !top.iter().any(|r| r.assignee == current.assignee) {
            top.push(current);
        }
    }

    let mut suggestions = Vec::new();
    for assignee in &task.assignees {
        let load = active.get(assignee.as_str()).copied().unwrap_or(0);
        if load > OVERLOAD_ACTIVE_TASKS {
            let late = overdue.get(assignee.as_str()).copied().unwrap_or(0);
            suggestions.push(Suggestion {
                kind: "resource_overload".to_string(),
                severity: RiskLevel::High,
                title: format!("{assignee} is overloaded"),
                detail: format!("{assignee} has {load} active task(s), {late} overdue."),
            });
        }
    }
    if let Some(best) = top.first() {
        if !best.currently_assigned && !task.assignees.is_empty() {
            suggestions.push(Suggestion {
                kind: "reassignment".to_string(),
                severity: RiskLevel::Low,
                title: format!("Consider reassigning to {}", best.assignee),
                detail: best.reason.clone(),
            });
        }
    }

    (suggestions, top)
}

//! Analytical query operations: critical path, attention, milestone,
//! simulation, Markov, impact, intelligence, cost and historical insights.
//!
//! Every operation loads one snapshot at entry and computes over it; the
//! critical-path and simulation results are memoized keyed by the plan's
//! content fingerprint and the request parameters.

use std::collections::HashMap;
use std::sync::Arc;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::Planner;
use crate::analytics::attention::{
    self, AttentionDashboard, ExecutionTask, MilestoneAnalysis, TaskDigest, DEFAULT_VIEW_LIMIT,
};
use crate::analytics::cost::{self, CostReport, CostWeights};
use crate::analytics::historical::{self, HistoricalInsights};
use crate::analytics::impact::{self, ImpactReport, ProposedChange};
use crate::analytics::intelligence::{self, IntelligenceInputs, TaskIntelligence};
use crate::analytics::markov::{
    self, AbsorptionAnalysis, TransitionMatrix, DEFAULT_STEP_DAYS,
};
use crate::analytics::monte_carlo::{self, SimulationConfig, SimulationReport};
use crate::cache::AnalysisCache;
use crate::cancel::CancelToken;
use crate::dates::add_days;
use crate::db::Database;
use crate::error::{PlannerError, Result};
use crate::fingerprint::plan_fingerprint;
use crate::graph::{self, TaskGraph};
use crate::models::{PertEstimate, TaskStatus};
use crate::params::{
    parse_instant, AttentionParams, CostParams, HistoricalParams, ImpactParams,
    IntelligenceParams, MarkovParams, MilestoneParams, PlanRef, RunSimulation,
};
use crate::snapshot::PlanSnapshot;

/// Default milestone horizon when neither the caller nor the plan carries
/// an event date.
const DEFAULT_MILESTONE_DAYS: f64 = 21.0;

/// Iteration cap for the embedded simulation inside intelligence and
/// impact previews.
const PREVIEW_ITERATIONS: usize = 1_000;
const PREVIEW_SEED: u64 = 42;

/// The critical-path report returned at the request level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalPathReport {
    pub plan_id: String,
    /// The canonical ordered path, source to sink
    pub critical_path: Vec<TaskDigest>,
    /// Ids of the canonical path, in order
    pub task_ids: Vec<String>,
    /// Every task on any maximum-weight path
    pub on_path_ids: Vec<String>,
    /// Plan end as an instant (schedule origin plus the path length)
    pub plan_end: Timestamp,
    pub plan_end_days: f64,
    pub diagnostics: Vec<String>,
}

/// The Markov report: the learned matrix plus per-task state analyses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkovReport {
    pub plan_id: String,
    pub matrix: TransitionMatrix,
    pub absorption: AbsorptionAnalysis,
    /// Per-task current state and expected remaining days; one entry when
    /// a task id was given, else all tasks
    pub tasks: Vec<MarkovTaskAnalysis>,
}

/// Markov figures for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkovTaskAnalysis {
    pub task_id: String,
    pub title: String,
    pub current_state: TaskStatus,
    /// NaN when the chain is near-singular
    pub expected_days_to_absorption: f64,
}

// Loads historical task rows across the given plans (every other plan when
// none are named) and derives calibration insights.
fn load_insights(
    db: &mut Database,
    target_plan_id: &str,
    explicit: &[String],
) -> Result<HistoricalInsights> {
    let plan_ids: Vec<String> = if explicit.is_empty() {
        db.list_plans()?
            .into_iter()
            .map(|p| p.plan_id)
            .filter(|id| id != target_plan_id)
            .collect()
    } else {
        explicit.to_vec()
    };
    let snapshots = db.get_snapshots(&plan_ids)?;
    let mut tasks = Vec::new();
    let mut bucket_names: HashMap<String, String> = HashMap::new();
    for snapshot in snapshots {
        for bucket in &snapshot.buckets {
            bucket_names.insert(bucket.bucket_id.clone(), bucket.name.clone());
        }
        tasks.extend(snapshot.tasks);
    }
    Ok(historical::analyze(&tasks, &bucket_names))
}

// Historical tasks flattened for matrix learning.
fn load_historical_tasks(
    db: &mut Database,
    target_plan_id: &str,
    explicit: &[String],
) -> Result<Vec<crate::models::Task>> {
    let plan_ids: Vec<String> = if explicit.is_empty() {
        db.list_plans()?
            .into_iter()
            .map(|p| p.plan_id)
            .filter(|id| id != target_plan_id)
            .collect()
    } else {
        explicit.to_vec()
    };
    let snapshots = db.get_snapshots(&plan_ids)?;
    Ok(snapshots.into_iter().flat_map(|s| s.tasks).collect())
}

fn schedule_origin(snapshot: &PlanSnapshot, now: Timestamp) -> Timestamp {
    snapshot
        .tasks
        .iter()
        .filter_map(|t| t.start_date)
        .min()
        .unwrap_or(now)
        .min(now)
}

fn build_cp_report(
    snapshot: &PlanSnapshot,
    graph: &TaskGraph,
    insights: Option<&HistoricalInsights>,
    now: Timestamp,
) -> CriticalPathReport {
    let pert = insights.map(|i| pert_map(i));
    let cp = graph::compute_critical_path(snapshot, graph, pert.as_ref());
    let origin = schedule_origin(snapshot, now);
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
    CriticalPathReport {
        plan_id: snapshot.plan.plan_id.clone(),
        critical_path: cp.canonical_path.iter().filter_map(digest).collect(),
        task_ids: cp.canonical_path.clone(),
        on_path_ids: cp.on_path_ids().iter().map(|s| s.to_string()).collect(),
        plan_end: add_days(origin, cp.plan_end_days),
        plan_end_days: cp.plan_end_days,
        diagnostics: cp.diagnostics,
    }
}

fn pert_map(insights: &HistoricalInsights) -> HashMap<String, PertEstimate> {
    insights
        .pert_by_bucket
        .iter()
        .map(|(k, v)| (k.clone(), *v))
        .collect()
}

// Cache plumbing: serialize on put, deserialize on hit; any failure is a miss.
fn cached<T, F>(
    cache: &Arc<AnalysisCache>,
    plan_id: &str,
    fingerprint: &str,
    params_key: &str,
    compute: F,
) -> Result<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
    F: FnOnce() -> Result<T>,
{
    if let Some(hit) = cache.get(plan_id, fingerprint, params_key) {
        if let Ok(value) = serde_json::from_str(&hit) {
            return Ok(value);
        }
    }
    let value = compute()?;
    if let Ok(serialized) = serde_json::to_string(&value) {
        cache.put(plan_id, fingerprint, params_key, serialized);
    }
    Ok(value)
}

impl Planner {
    /// Critical path of a plan, calibrated from historical plans when
    /// available. Memoized per plan fingerprint.
    pub async fn get_critical_path(&self, params: &PlanRef) -> Result<CriticalPathReport> {
        let plan_id = params.plan_id.clone();
        let cache = Arc::clone(&self.cache);
        self.with_db(move |db| {
            let now = Timestamp::now();
            let snapshot = db.get_snapshot(&plan_id)?;
            let fingerprint = plan_fingerprint(&snapshot);
            let insights = load_insights(db, &plan_id, &[])?;
            cached(&cache, &plan_id, &fingerprint, "critical_path", || {
                let graph = TaskGraph::build_lenient(&snapshot.tasks, &snapshot.dependencies);
                Ok(build_cp_report(&snapshot, &graph, Some(&insights), now))
            })
        })
        .await
    }

    /// The attention dashboard.
    pub async fn get_attention(&self, params: &AttentionParams) -> Result<AttentionDashboard> {
        let plan_id = params.plan_id.clone();
        let limit = params.limit.unwrap_or(DEFAULT_VIEW_LIMIT);
        self.with_db(move |db| {
            let now = Timestamp::now();
            let snapshot = db.get_snapshot(&plan_id)?;
            let sync = db.get_sync_state(&plan_id)?;
            let graph = TaskGraph::build_lenient(&snapshot.tasks, &snapshot.dependencies);
            let cp = graph::compute_critical_path(&snapshot, &graph, None);
            Ok(attention::dashboard(
                &snapshot,
                &graph,
                &cp,
                now,
                sync.previous_sync_at,
                limit,
            ))
        })
        .await
    }

    /// Milestone analysis against an event date.
    pub async fn get_milestone_analysis(
        &self,
        params: &MilestoneParams,
    ) -> Result<MilestoneAnalysis> {
        let plan_id = params.plan_id.clone();
        let explicit_event = parse_instant("event_date", params.event_date.as_deref())?;
        self.with_db(move |db| {
            let now = Timestamp::now();
            let snapshot = db.get_snapshot(&plan_id)?;
            let event_date = explicit_event
                .or(snapshot.plan.event_date)
                .unwrap_or_else(|| add_days(now, DEFAULT_MILESTONE_DAYS));
            let graph = TaskGraph::build_lenient(&snapshot.tasks, &snapshot.dependencies);
            let cp = graph::compute_critical_path(&snapshot, &graph, None);
            Ok(attention::milestone_analysis(&snapshot, &cp, event_date))
        })
        .await
    }

    /// Tasks enriched with risk badges and dependency counts.
    pub async fn get_execution_tasks(&self, params: &PlanRef) -> Result<Vec<ExecutionTask>> {
        let plan_id = params.plan_id.clone();
        self.with_db(move |db| {
            let now = Timestamp::now();
            let snapshot = db.get_snapshot(&plan_id)?;
            let graph = TaskGraph::build_lenient(&snapshot.tasks, &snapshot.dependencies);
            let cp = graph::compute_critical_path(&snapshot, &graph, None);
            Ok(attention::execution_tasks(&snapshot, &graph, &cp, now))
        })
        .await
    }

    /// Runs the Monte Carlo simulation. Memoized per plan fingerprint and
    /// parameter set; a cancellation token aborts the run cooperatively.
    pub async fn run_monte_carlo(
        &self,
        params: &RunSimulation,
        cancel: CancelToken,
    ) -> Result<SimulationReport> {
        let plan_id = params.plan_id.clone();
        let event_date = parse_instant("event_date", params.event_date.as_deref())?;
        let config = SimulationConfig {
            iterations: params.iterations.unwrap_or(10_000),
            seed: params.seed,
            event_date,
            include_bands: params.include_bands,
            ..Default::default()
        };
        let strict = params.strict_calibration;
        let historical = params.historical_plan_ids.clone();
        let cache = Arc::clone(&self.cache);
        let params_key = format!(
            "monte_carlo:{}:{}:{}:{}:{}:{}",
            config.iterations,
            config.seed.map(|s| s.to_string()).unwrap_or_default(),
            config
                .event_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            config.include_bands,
            strict,
            historical.join(","),
        );
        self.with_db(move |db| {
            let now = Timestamp::now();
            let snapshot = db.get_snapshot(&plan_id)?;
            let fingerprint = plan_fingerprint(&snapshot);
            let insights = load_insights(db, &plan_id, &historical)?;
            cached(&cache, &plan_id, &fingerprint, &params_key, || {
                let graph = TaskGraph::build_lenient(&snapshot.tasks, &snapshot.dependencies);
                let prior = (!strict).then(PertEstimate::global_prior);
                monte_carlo::run(
                    &snapshot,
                    &graph,
                    &pert_map(&insights),
                    prior,
                    now,
                    &cancel,
                    &config,
                )
            })
        })
        .await
    }

    /// Markov analysis: the learned transition matrix plus per-task
    /// expected time to absorption.
    pub async fn get_markov(&self, params: &MarkovParams) -> Result<MarkovReport> {
        let plan_id = params.plan_id.clone();
        let task_filter = params.task_id.clone();
        let historical = params.historical_plan_ids.clone();
        let step_days = params.step_days.unwrap_or(DEFAULT_STEP_DAYS);
        self.with_db(move |db| {
            let snapshot = db.get_snapshot(&plan_id)?;
            let history = load_historical_tasks(db, &plan_id, &historical)?;
            let matrix = if history.is_empty() {
                TransitionMatrix::default_for(&format!("plan:{plan_id}"), step_days)
            } else {
                TransitionMatrix::learn(&format!("plan:{plan_id}"), &history, step_days)
            };
            let absorption = matrix.expected_absorption();

            let graph = TaskGraph::build_lenient(&snapshot.tasks, &snapshot.dependencies);
            let task_index = snapshot.task_index();
            let analyses: Vec<MarkovTaskAnalysis> = snapshot
                .tasks
                .iter()
                .filter(|t| {
                    task_filter
                        .as_deref()
                        .is_none_or(|wanted| t.task_id == wanted)
                })
                .map(|task| {
                    let blocked_upstream = graph.predecessors(&task.task_id).iter().any(|p| {
                        task_index
                            .get(p.as_str())
                            .is_some_and(|u| u.status != TaskStatus::Completed)
                    });
                    let state = markov::detect_state(task, blocked_upstream);
                    let expected = absorption
                        .expected_days
                        .get(state.as_str())
                        .copied()
                        .unwrap_or(0.0);
                    MarkovTaskAnalysis {
                        task_id: task.task_id.clone(),
                        title: task.title.clone(),
                        current_state: state,
                        expected_days_to_absorption: expected,
                    }
                })
                .collect();

            if let Some(wanted) = &task_filter {
                if analyses.is_empty() {
                    return Err(PlannerError::task_not_found(&plan_id, wanted));
                }
            }

            Ok(MarkovReport {
                plan_id,
                matrix,
                absorption,
                tasks: analyses,
            })
        })
        .await
    }

    /// Pure preview of a proposed task edit.
    pub async fn analyze_impact(
        &self,
        params: &ImpactParams,
        cancel: CancelToken,
    ) -> Result<ImpactReport> {
        let plan_id = params.plan_id.clone();
        let task_id = params.task_id.clone();
        let with_simulation = params.with_simulation;
        let historical = params.historical_plan_ids.clone();
        let change = ProposedChange {
            due_date: parse_instant("due_date", params.due_date.as_deref())?,
            start_date: parse_instant("start_date", params.start_date.as_deref())?,
            assignees: params.assignees.clone(),
            percent_complete: params.percent_complete,
            slippage_days: params.slippage_days,
        };
        self.with_db(move |db| {
            let now = Timestamp::now();
            let snapshot = db.get_snapshot(&plan_id)?;
            let graph = TaskGraph::build_lenient(&snapshot.tasks, &snapshot.dependencies);
            let insights = load_insights(db, &plan_id, &historical)?;
            let pert = pert_map(&insights);
            let config = SimulationConfig {
                iterations: PREVIEW_ITERATIONS,
                seed: Some(PREVIEW_SEED),
                ..Default::default()
            };
            let simulation = with_simulation.then_some((&pert, &config, now));
            impact::analyze(
                &snapshot,
                &graph,
                &task_id,
                &change,
                Some(&pert),
                simulation,
                &cancel,
            )
        })
        .await
    }

    /// The fused intelligence bundle for one task. Sub-computations that
    /// fail are reported in the bundle's diagnostics.
    pub async fn get_task_intelligence(
        &self,
        params: &IntelligenceParams,
    ) -> Result<TaskIntelligence> {
        let plan_id = params.plan_id.clone();
        let task_id = params.task_id.clone();
        let include_simulations = params.include_simulations;
        let historical = params.historical_plan_ids.clone();
        self.with_db(move |db| {
            let now = Timestamp::now();
            let snapshot = db.get_snapshot(&plan_id)?;
            let graph = TaskGraph::build_lenient(&snapshot.tasks, &snapshot.dependencies);
            let mut diagnostics: Vec<String> = Vec::new();

            let insights = match load_insights(db, &plan_id, &historical) {
                Ok(insights) => Some(insights),
                Err(e) => {
                    diagnostics.push(format!("historical calibration unavailable: {e}"));
                    None
                }
            };
            let pert = insights.as_ref().map(pert_map);
            let cp = graph::compute_critical_path(&snapshot, &graph, pert.as_ref());

            let mut simulation_report = None;
            let mut markov_state = None;
            let mut absorption = None;
            if include_simulations {
                let config = SimulationConfig {
                    iterations: PREVIEW_ITERATIONS,
                    seed: Some(PREVIEW_SEED),
                    ..Default::default()
                };
                match monte_carlo::run(
                    &snapshot,
                    &graph,
                    pert.as_ref().unwrap_or(&HashMap::new()),
                    Some(PertEstimate::global_prior()),
                    now,
                    &CancelToken::new(),
                    &config,
                ) {
                    Ok(report) => simulation_report = Some(report),
                    Err(e) => diagnostics.push(format!("simulation failed: {e}")),
                }

                let history = load_historical_tasks(db, &plan_id, &historical).unwrap_or_default();
                let matrix = if history.is_empty() {
                    TransitionMatrix::default_for(&format!("plan:{plan_id}"), DEFAULT_STEP_DAYS)
                } else {
                    TransitionMatrix::learn(
                        &format!("plan:{plan_id}"),
                        &history,
                        DEFAULT_STEP_DAYS,
                    )
                };
                let task_index = snapshot.task_index();
                if let Some(task) = snapshot.task(&task_id) {
                    let blocked_upstream = graph.predecessors(&task_id).iter().any(|p| {
                        task_index
                            .get(p.as_str())
                            .is_some_and(|u| u.status != TaskStatus::Completed)
                    });
                    markov_state = Some(markov::detect_state(task, blocked_upstream));
                }
                absorption = Some(matrix.expected_absorption());
            }

            intelligence::analyze(
                &snapshot,
                &graph,
                &cp,
                &task_id,
                now,
                IntelligenceInputs {
                    insights: insights.as_ref(),
                    simulation: simulation_report.as_ref(),
                    markov_state,
                    absorption: absorption.as_ref(),
                    diagnostics,
                },
            )
        })
        .await
    }

    /// Weighted multi-objective plan cost.
    pub async fn compute_cost(&self, params: &CostParams) -> Result<CostReport> {
        let plan_id = params.plan_id.clone();
        let defaults = CostWeights::default();
        let weights = CostWeights {
            schedule: params.schedule_weight.unwrap_or(defaults.schedule),
            resource: params.resource_weight.unwrap_or(defaults.resource),
            risk: params.risk_weight.unwrap_or(defaults.risk),
            quality: params.quality_weight.unwrap_or(defaults.quality),
            disruption: params.disruption_weight.unwrap_or(defaults.disruption),
        };
        self.with_db(move |db| {
            let now = Timestamp::now();
            let snapshot = db.get_snapshot(&plan_id)?;
            let graph = TaskGraph::build_lenient(&snapshot.tasks, &snapshot.dependencies);
            Ok(cost::compute(&snapshot, &graph, &weights, now))
        })
        .await
    }

    /// Calibration insights over historical plans.
    pub async fn get_historical_insights(
        &self,
        params: &HistoricalParams,
    ) -> Result<HistoricalInsights> {
        let plan_ids = params.plan_ids.clone();
        self.with_db(move |db| load_insights(db, "", &plan_ids)).await
    }
}

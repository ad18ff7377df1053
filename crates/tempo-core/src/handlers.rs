//! Request-level handler functions.
//!
//! One handler per operation of the external interface, consolidating
//! business workflows behind a framework-agnostic surface. Interface layers
//! (the CLI today) call these instead of reaching into the planner, so
//! every interface observes identical behavior.

use crate::analytics::attention::{AttentionDashboard, ExecutionTask, MilestoneAnalysis};
use crate::analytics::cost::CostReport;
use crate::analytics::historical::HistoricalInsights;
use crate::analytics::impact::ImpactReport;
use crate::analytics::intelligence::TaskIntelligence;
use crate::analytics::monte_carlo::SimulationReport;
use crate::cancel::CancelToken;
use crate::db::sync_queries::SyncState;
use crate::error::Result;
use crate::models::{
    Bucket, Dependency, ExternalEvent, Plan, ProposedAction, Subtask, Task, TaskLock,
};
use crate::params::*;
use crate::planner::analysis_ops::{CriticalPathReport, MarkovReport};
use crate::planner::dependency_ops::TaskDependencies;
use crate::planner::event_ops::IngestOutcome;
use crate::planner::Planner;

// Plans and templates

pub async fn handle_list_plans(planner: &Planner) -> Result<Vec<Plan>> {
    planner.list_plans().await
}

pub async fn handle_get_plan(planner: &Planner, params: &PlanRef) -> Result<Option<Plan>> {
    planner.get_plan(params).await
}

pub async fn handle_create_plan(planner: &Planner, params: &CreatePlan) -> Result<Plan> {
    planner.create_plan(params).await
}

pub async fn handle_delete_plan(planner: &Planner, params: &PlanRef) -> Result<()> {
    planner.delete_plan(params).await
}

pub async fn handle_get_buckets(planner: &Planner, params: &PlanRef) -> Result<Vec<Bucket>> {
    planner.get_buckets(params).await
}

pub async fn handle_upsert_bucket(planner: &Planner, params: &UpsertBucket) -> Result<()> {
    planner.upsert_bucket(params).await
}

pub async fn handle_list_templates(planner: &Planner) -> Result<Vec<Plan>> {
    planner.list_templates().await
}

pub async fn handle_clone_template(planner: &Planner, params: &CloneTemplate) -> Result<Plan> {
    planner.clone_template(params).await
}

pub async fn handle_get_sync_state(planner: &Planner, params: &PlanRef) -> Result<SyncState> {
    planner.get_sync_state(params).await
}

pub async fn handle_mark_synced(planner: &Planner, params: &PlanRef) -> Result<SyncState> {
    planner.mark_synced(params).await
}

// Tasks and subtasks

pub async fn handle_get_tasks(planner: &Planner, params: &PlanRef) -> Result<Vec<Task>> {
    planner.get_tasks(params).await
}

pub async fn handle_get_task(planner: &Planner, params: &TaskRef) -> Result<Option<Task>> {
    planner.get_task(params).await
}

pub async fn handle_create_task(planner: &Planner, params: &CreateTask) -> Result<Task> {
    planner.create_task(params).await
}

pub async fn handle_update_task(planner: &Planner, params: &UpdateTask) -> Result<Task> {
    planner.update_task(params).await
}

pub async fn handle_delete_task(planner: &Planner, params: &DeleteTask) -> Result<()> {
    planner.delete_task(params).await
}

pub async fn handle_add_subtask(planner: &Planner, params: &AddSubtask) -> Result<Subtask> {
    planner.add_subtask(params).await
}

pub async fn handle_update_subtask(planner: &Planner, params: &UpdateSubtask) -> Result<Subtask> {
    planner.update_subtask(params).await
}

pub async fn handle_delete_subtask(planner: &Planner, params: &DeleteSubtask) -> Result<()> {
    planner.delete_subtask(params).await
}

// Dependencies

pub async fn handle_add_dependency(
    planner: &Planner,
    params: &AddDependency,
) -> Result<Dependency> {
    planner.add_dependency(params).await
}

pub async fn handle_remove_dependency(planner: &Planner, params: &RemoveDependency) -> Result<()> {
    planner.remove_dependency(params).await
}

pub async fn handle_get_dependencies(
    planner: &Planner,
    params: &TaskRef,
) -> Result<TaskDependencies> {
    planner.get_task_dependencies(params).await
}

// Analytics

pub async fn handle_get_critical_path(
    planner: &Planner,
    params: &PlanRef,
) -> Result<CriticalPathReport> {
    planner.get_critical_path(params).await
}

pub async fn handle_get_attention(
    planner: &Planner,
    params: &AttentionParams,
) -> Result<AttentionDashboard> {
    planner.get_attention(params).await
}

pub async fn handle_get_milestone_analysis(
    planner: &Planner,
    params: &MilestoneParams,
) -> Result<MilestoneAnalysis> {
    planner.get_milestone_analysis(params).await
}

pub async fn handle_get_execution_tasks(
    planner: &Planner,
    params: &PlanRef,
) -> Result<Vec<ExecutionTask>> {
    planner.get_execution_tasks(params).await
}

pub async fn handle_run_monte_carlo(
    planner: &Planner,
    params: &RunSimulation,
    cancel: CancelToken,
) -> Result<SimulationReport> {
    planner.run_monte_carlo(params, cancel).await
}

pub async fn handle_get_markov(planner: &Planner, params: &MarkovParams) -> Result<MarkovReport> {
    planner.get_markov(params).await
}

pub async fn handle_analyze_impact(
    planner: &Planner,
    params: &ImpactParams,
    cancel: CancelToken,
) -> Result<ImpactReport> {
    planner.analyze_impact(params, cancel).await
}

pub async fn handle_get_task_intelligence(
    planner: &Planner,
    params: &IntelligenceParams,
) -> Result<TaskIntelligence> {
    planner.get_task_intelligence(params).await
}

pub async fn handle_compute_cost(planner: &Planner, params: &CostParams) -> Result<CostReport> {
    planner.compute_cost(params).await
}

pub async fn handle_get_historical_insights(
    planner: &Planner,
    params: &HistoricalParams,
) -> Result<HistoricalInsights> {
    planner.get_historical_insights(params).await
}

// Locks

pub async fn handle_acquire_lock(planner: &Planner, params: &AcquireLock) -> Result<TaskLock> {
    planner.acquire_lock(params).await
}

pub async fn handle_release_lock(planner: &Planner, params: &ReleaseLock) -> Result<()> {
    planner.release_lock(params).await
}

pub async fn handle_get_lock(planner: &Planner, params: &TaskRef) -> Result<Option<TaskLock>> {
    planner.get_lock(params).await
}

// Events and proposed actions

pub async fn handle_ingest_event(planner: &Planner, params: &IngestEvent) -> Result<IngestOutcome> {
    planner.ingest_event(params).await
}

pub async fn handle_list_events(
    planner: &Planner,
    params: &ListEvents,
) -> Result<Vec<ExternalEvent>> {
    planner.list_events(params).await
}

pub async fn handle_delete_event(planner: &Planner, params: &EventRef) -> Result<()> {
    planner.delete_event(params).await
}

pub async fn handle_list_actions(
    planner: &Planner,
    params: &ListActions,
) -> Result<Vec<ProposedAction>> {
    planner.list_actions(params).await
}

pub async fn handle_approve_action(
    planner: &Planner,
    params: &ActionDecision,
) -> Result<ProposedAction> {
    planner.approve_action(params).await
}

pub async fn handle_reject_action(
    planner: &Planner,
    params: &ActionDecision,
) -> Result<ProposedAction> {
    planner.reject_action(params).await
}

pub async fn handle_delete_action(planner: &Planner, params: &ActionRef) -> Result<()> {
    planner.delete_action(params).await
}

//! Parameter structures for planner operations.
//!
//! Shared across interfaces (CLI, future transports) without
//! framework-specific derives. Instants travel as RFC 3339 UTC strings and
//! enums as their wire names; parsing happens here so interface layers stay
//! free of domain validation.

use jiff::Timestamp;
#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PlannerError, Result};
use crate::models::{
    ActionStatus, DependencyType, Severity, TaskStatus, UpdateSubtaskRequest, UpdateTaskRequest,
};

/// Parses an optional RFC 3339 instant parameter.
pub fn parse_instant(field: &str, raw: Option<&str>) -> Result<Option<Timestamp>> {
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .parse::<Timestamp>()
            .map(Some)
            .map_err(|e| PlannerError::invalid_input(field, &format!("invalid RFC 3339 instant: {e}"))),
    }
}

fn parse_wire<T>(field: &str, raw: Option<&str>) -> Result<Option<T>>
where
    T: std::str::FromStr<Err = String>,
{
    match raw {
        None => Ok(None),
        Some(s) => s
            .parse::<T>()
            .map(Some)
            .map_err(|message| PlannerError::invalid_input(field, &message)),
    }
}

/// Parameters identifying a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct PlanRef {
    /// The plan to operate on
    pub plan_id: String,
}

/// Parameters identifying a task within a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct TaskRef {
    pub plan_id: String,
    pub task_id: String,
}

/// Parameters for creating a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct CreatePlan {
    pub plan_id: String,
    /// Display name; defaults to the id
    pub name: Option<String>,
    /// Target event date, RFC 3339
    pub event_date: Option<String>,
}

/// Parameters for creating or renaming a bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct UpsertBucket {
    pub plan_id: String,
    pub bucket_id: String,
    pub name: String,
}

/// Parameters for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct CreateTask {
    pub plan_id: String,
    /// Stable id within the plan
    pub task_id: String,
    pub title: String,
    pub bucket_id: String,
    /// RFC 3339
    pub start_date: Option<String>,
    /// RFC 3339
    pub due_date: Option<String>,
    /// 0-10, lower is more urgent; defaults to 5
    pub priority: Option<u8>,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub assignee_names: Vec<String>,
    pub description: Option<String>,
    /// User performing the mutation (lock contract)
    pub acting_user: Option<String>,
}

/// Parameters for a partial task update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct UpdateTask {
    pub plan_id: String,
    pub task_id: String,
    pub title: Option<String>,
    pub bucket_id: Option<String>,
    /// Wire status name (`notStarted`, `inProgress`, ...)
    pub status: Option<String>,
    pub percent_complete: Option<u8>,
    /// RFC 3339; empty string clears the field
    pub start_date: Option<String>,
    /// RFC 3339; empty string clears the field
    pub due_date: Option<String>,
    pub priority: Option<u8>,
    pub assignees: Option<Vec<String>>,
    pub assignee_names: Option<Vec<String>>,
    pub applied_categories: Option<Vec<String>>,
    pub description: Option<String>,
    pub order_hint: Option<String>,
    pub acting_user: Option<String>,
}

impl UpdateTask {
    /// Validates and converts to the repository's update request.
    pub fn validate(&self) -> Result<UpdateTaskRequest> {
        let status = parse_wire::<TaskStatus>("status", self.status.as_deref())?;
        let date_field = |field: &str, raw: &Option<String>| -> Result<Option<Option<Timestamp>>> {
            match raw {
                None => Ok(None),
                Some(s) if s.trim().is_empty() => Ok(Some(None)),
                Some(s) => Ok(Some(parse_instant(field, Some(s))?)),
            }
        };
        if let Some(percent) = self.percent_complete {
            if percent > 100 {
                return Err(PlannerError::invalid_input(
                    "percent_complete",
                    "must be between 0 and 100",
                ));
            }
        }
        Ok(UpdateTaskRequest {
            title: self.title.clone(),
            bucket_id: self.bucket_id.clone(),
            status,
            percent_complete: self.percent_complete,
            start_date: date_field("start_date", &self.start_date)?,
            due_date: date_field("due_date", &self.due_date)?,
            priority: self.priority,
            assignees: self.assignees.clone(),
            assignee_names: self.assignee_names.clone(),
            applied_categories: self.applied_categories.clone(),
            description: self.description.clone().map(Some),
            order_hint: self.order_hint.clone(),
            acting_user: self.acting_user.clone(),
        })
    }
}

/// Parameters for deleting a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct DeleteTask {
    pub plan_id: String,
    pub task_id: String,
    pub acting_user: Option<String>,
}

/// Parameters for adding a checklist item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct AddSubtask {
    pub plan_id: String,
    pub task_id: String,
    pub subtask_id: String,
    pub title: String,
    pub acting_user: Option<String>,
}

/// Parameters for updating a checklist item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct UpdateSubtask {
    pub plan_id: String,
    pub task_id: String,
    pub subtask_id: String,
    pub title: Option<String>,
    pub is_checked: Option<bool>,
    pub order_hint: Option<String>,
    pub acting_user: Option<String>,
}

impl UpdateSubtask {
    pub fn to_request(&self) -> UpdateSubtaskRequest {
        UpdateSubtaskRequest {
            title: self.title.clone(),
            is_checked: self.is_checked,
            order_hint: self.order_hint.clone(),
        }
    }
}

/// Parameters for deleting a checklist item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct DeleteSubtask {
    pub plan_id: String,
    pub task_id: String,
    pub subtask_id: String,
    pub acting_user: Option<String>,
}

/// Parameters for adding a dependency edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct AddDependency {
    pub plan_id: String,
    pub predecessor_id: String,
    pub successor_id: String,
    /// FS (default), SS, FF or SF
    pub dep_type: Option<String>,
    pub acting_user: Option<String>,
}

impl AddDependency {
    pub fn dependency_type(&self) -> Result<DependencyType> {
        Ok(parse_wire::<DependencyType>("dep_type", self.dep_type.as_deref())?.unwrap_or_default())
    }
}

/// Parameters for removing a dependency edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct RemoveDependency {
    pub plan_id: String,
    pub predecessor_id: String,
    pub successor_id: String,
    pub acting_user: Option<String>,
}

/// Parameters for a Monte Carlo run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct RunSimulation {
    pub plan_id: String,
    /// Defaults to 10,000
    pub iterations: Option<usize>,
    /// RFC 3339; defaults to the plan's own event date
    pub event_date: Option<String>,
    pub seed: Option<u64>,
    /// Also report the p10/p90 band
    #[serde(default)]
    pub include_bands: bool,
    /// Historical plans for calibration; defaults to every other plan
    #[serde(default)]
    pub historical_plan_ids: Vec<String>,
    /// Fail instead of falling back to the global prior when a bucket has
    /// no calibration
    #[serde(default)]
    pub strict_calibration: bool,
}

/// Parameters for Markov analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct MarkovParams {
    pub plan_id: String,
    /// Analyze one task instead of the whole plan
    pub task_id: Option<String>,
    #[serde(default)]
    pub historical_plan_ids: Vec<String>,
    /// Snapshot step size in days; defaults to 1.0
    pub step_days: Option<f64>,
}

/// Parameters for an impact preview.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ImpactParams {
    pub plan_id: String,
    pub task_id: String,
    /// RFC 3339
    pub due_date: Option<String>,
    /// RFC 3339
    pub start_date: Option<String>,
    pub assignees: Option<Vec<String>>,
    pub percent_complete: Option<u8>,
    pub slippage_days: Option<f64>,
    /// Also run a seeded low-iteration simulation delta
    #[serde(default)]
    pub with_simulation: bool,
    #[serde(default)]
    pub historical_plan_ids: Vec<String>,
}

/// Parameters for the task intelligence bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct IntelligenceParams {
    pub plan_id: String,
    pub task_id: String,
    /// Include the Monte Carlo and Markov sections
    #[serde(default)]
    pub include_simulations: bool,
    #[serde(default)]
    pub historical_plan_ids: Vec<String>,
}

/// Parameters for the attention dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct AttentionParams {
    pub plan_id: String,
    /// Per-view list cap; defaults to 20
    pub limit: Option<usize>,
}

/// Parameters for the milestone analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct MilestoneParams {
    pub plan_id: String,
    /// RFC 3339; defaults to the plan's event date, else 21 days out
    pub event_date: Option<String>,
}

/// Parameters for the plan cost computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct CostParams {
    pub plan_id: String,
    pub schedule_weight: Option<f64>,
    pub resource_weight: Option<f64>,
    pub risk_weight: Option<f64>,
    pub quality_weight: Option<f64>,
    pub disruption_weight: Option<f64>,
}

/// Parameters for acquiring a task lock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct AcquireLock {
    pub plan_id: String,
    pub task_id: String,
    pub user_id: String,
    /// Defaults to 15 minutes
    pub ttl_minutes: Option<i64>,
}

/// Parameters for releasing a task lock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ReleaseLock {
    pub plan_id: String,
    pub task_id: String,
    pub user_id: String,
}

/// Parameters for ingesting an external event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct IngestEvent {
    pub plan_id: String,
    /// e.g. `flight_cancellation`
    pub event_type: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// low / medium / high / critical; defaults to medium
    pub severity: Option<String>,
    #[serde(default)]
    pub affected_task_ids: Vec<String>,
    /// Opaque payload, insertion order preserved
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl IngestEvent {
    pub fn severity_level(&self) -> Result<Severity> {
        Ok(parse_wire::<Severity>("severity", self.severity.as_deref())?.unwrap_or_default())
    }
}

/// Parameters for listing events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ListEvents {
    pub plan_id: String,
    /// Defaults to 30
    pub limit: Option<usize>,
}

/// Parameters identifying an event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct EventRef {
    pub plan_id: String,
    pub event_id: i64,
}

/// Parameters for listing proposed actions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ListActions {
    pub plan_id: String,
    /// pending / approved / rejected
    pub status: Option<String>,
    /// Defaults to 20
    pub limit: Option<usize>,
}

impl ListActions {
    pub fn status_filter(&self) -> Result<Option<ActionStatus>> {
        parse_wire::<ActionStatus>("status", self.status.as_deref())
    }
}

/// Parameters for deciding on a proposed action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ActionDecision {
    pub plan_id: String,
    pub action_id: i64,
    pub decided_by: String,
}

/// Parameters identifying an action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ActionRef {
    pub plan_id: String,
    pub action_id: i64,
}

/// Parameters for cloning a template plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct CloneTemplate {
    pub source_plan_id: String,
    pub target_plan_id: String,
    /// RFC 3339; the latest source due date shifts onto this instant
    pub event_date: String,
    pub name: Option<String>,
    /// Keep the source task ids instead of regenerating them
    #[serde(default)]
    pub preserve_task_ids: bool,
}

/// Parameters for the historical insights report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct HistoricalParams {
    /// Plans to learn from; defaults to every plan
    #[serde(default)]
    pub plan_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_parsing() {
        assert!(parse_instant("due", None).unwrap().is_none());
        assert!(parse_instant("due", Some("")).unwrap().is_none());
        assert!(parse_instant("due", Some("2026-05-01T00:00:00Z"))
            .unwrap()
            .is_some());
        assert!(matches!(
            parse_instant("due", Some("next tuesday")),
            Err(PlannerError::InvalidInput { field, .. }) if field == "due"
        ));
    }

    #[test]
    fn update_task_validation() {
        let params = UpdateTask {
            plan_id: "p".into(),
            task_id: "t".into(),
            status: Some("inProgress".into()),
            percent_complete: Some(40),
            due_date: Some(String::new()),
            ..Default::default()
        };
        let request = params.validate().unwrap();
        assert_eq!(request.status, Some(TaskStatus::InProgress));
        assert_eq!(request.percent_complete, Some(40));
        // empty string clears the due date
        assert_eq!(request.due_date, Some(None));
    }

    #[test]
    fn update_task_rejects_bad_status() {
        let params = UpdateTask {
            status: Some("paused".into()),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn dependency_type_defaults_to_fs() {
        let params = AddDependency::default();
        assert_eq!(
            params.dependency_type().unwrap(),
            DependencyType::FinishToStart
        );
        let params = AddDependency {
            dep_type: Some("ss".into()),
            ..Default::default()
        };
        assert_eq!(
            params.dependency_type().unwrap(),
            DependencyType::StartToStart
        );
    }
}

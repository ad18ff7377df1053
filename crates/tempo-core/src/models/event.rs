//! External event and proposed action models.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ActionStatus, Severity};

/// An external disruption ingested into a plan (flight cancellation,
/// participant meeting cancelled, ...). Shown as a dashboard alert and used
/// to derive proposed actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalEvent {
    /// Monotonic identifier (per database)
    pub id: i64,

    /// ID of the affected plan
    pub plan_id: String,

    /// Free enumeration, e.g. `flight_cancellation`
    pub event_type: String,

    /// Short alert title
    pub title: String,

    /// Longer description
    pub description: Option<String>,

    /// How serious the disruption is
    pub severity: Severity,

    /// Tasks named by the event source as impacted
    #[serde(default)]
    pub affected_task_ids: Vec<String>,

    /// Opaque event payload; key order preserved
    #[serde(default)]
    pub payload: Map<String, Value>,

    /// Ingestion instant (UTC)
    pub created_at: Timestamp,

    /// When a human acknowledged the alert, if ever
    pub acknowledged_at: Option<Timestamp>,
}

/// A candidate mutation derived from an external event, awaiting a human
/// decision. Approval applies the implied mutation in the same transaction
/// that records the decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposedAction {
    /// Monotonic identifier (per database)
    pub id: i64,

    /// ID of the affected plan
    pub plan_id: String,

    /// Event that produced this proposal, when event-driven
    pub external_event_id: Option<i64>,

    /// Task the action targets
    pub task_id: String,

    /// e.g. `shift_due_date`, `reassign_or_reschedule`
    pub action_type: String,

    /// Short title for the approval UI
    pub title: String,

    /// Explanation of the proposal
    pub description: Option<String>,

    /// Mutation parameters, e.g. `{"shift_days": 2}`; key order preserved
    #[serde(default)]
    pub payload: Map<String, Value>,

    /// pending / approved / rejected
    pub status: ActionStatus,

    /// Creation instant (UTC)
    pub created_at: Timestamp,

    /// Decision instant, set on approve/reject
    pub decided_at: Option<Timestamp>,

    /// User that decided
    pub decided_by: Option<String>,
}

impl ProposedAction {
    /// Days to shift from the payload, defaulting to zero.
    pub fn shift_days(&self) -> i64 {
        self.payload
            .get("shift_days")
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }
}

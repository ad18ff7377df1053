//! External-event workflow operations: ingest, alerts and the
//! human-in-the-loop approval of proposed actions.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::Planner;
use crate::error::Result;
use crate::models::{ActionStatus, ExternalEvent, ProposedAction};
use crate::params::{ActionDecision, ActionRef, EventRef, IngestEvent, ListActions, ListEvents};

const DEFAULT_EVENT_LIMIT: usize = 30;
const DEFAULT_ACTION_LIMIT: usize = 20;

/// Result of ingesting an event: the stored alert plus the actions the
/// rule table derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub event: ExternalEvent,
    pub proposed_actions: Vec<ProposedAction>,
}

impl Planner {
    /// Persists an external event and derives proposed actions.
    pub async fn ingest_event(&self, params: &IngestEvent) -> Result<IngestOutcome> {
        let severity = params.severity_level()?;
        let plan_id = params.plan_id.clone();
        let event_type = params.event_type.clone();
        let title = params.title.clone();
        let description = params.description.clone();
        let affected = params.affected_task_ids.clone();
        let payload = params.payload.clone();
        self.with_db(move |db| {
            let (event, proposed_actions) = db.ingest_event(
                &plan_id,
                &event_type,
                title.as_deref(),
                description.as_deref(),
                severity,
                &affected,
                payload,
                Timestamp::now(),
            )?;
            Ok(IngestOutcome {
                event,
                proposed_actions,
            })
        })
        .await
    }

    /// Events of a plan, newest first.
    pub async fn list_events(&self, params: &ListEvents) -> Result<Vec<ExternalEvent>> {
        let plan_id = params.plan_id.clone();
        let limit = params.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
        self.with_db(move |db| db.list_events(&plan_id, limit))
            .await
    }

    /// Deletes an event and all actions derived from it.
    pub async fn delete_event(&self, params: &EventRef) -> Result<()> {
        let plan_id = params.plan_id.clone();
        let event_id = params.event_id;
        self.with_db(move |db| db.delete_event(&plan_id, event_id))
            .await
    }

    /// Proposed actions of a plan, optionally filtered by status.
    pub async fn list_actions(&self, params: &ListActions) -> Result<Vec<ProposedAction>> {
        let status: Option<ActionStatus> = params.status_filter()?;
        let plan_id = params.plan_id.clone();
        let limit = params.limit.unwrap_or(DEFAULT_ACTION_LIMIT);
        self.with_db(move |db| db.list_actions(&plan_id, status, limit))
            .await
    }

    /// Approves a pending action, applying its mutation atomically.
    /// Idempotent on already-approved actions.
    pub async fn approve_action(&self, params: &ActionDecision) -> Result<ProposedAction> {
        let plan_id = params.plan_id.clone();
        let action_id = params.action_id;
        let decided_by = params.decided_by.clone();
        let result = self
            .with_db(move |db| {
                db.approve_action(&plan_id, action_id, &decided_by, Timestamp::now())
            })
            .await;
        if result.is_ok() {
            self.invalidate(&params.plan_id);
        }
        result
    }

    /// Rejects a pending action without side effects.
    pub async fn reject_action(&self, params: &ActionDecision) -> Result<ProposedAction> {
        let plan_id = params.plan_id.clone();
        let action_id = params.action_id;
        let decided_by = params.decided_by.clone();
        self.with_db(move |db| db.reject_action(&plan_id, action_id, &decided_by, Timestamp::now()))
            .await
    }

    /// Deletes a proposed action row (distinct from rejecting it).
    pub async fn delete_action(&self, params: &ActionRef) -> Result<()> {
        let plan_id = params.plan_id.clone();
        let action_id = params.action_id;
        self.with_db(move |db| db.delete_action(&plan_id, action_id))
            .await
    }
}

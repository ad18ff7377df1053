//! External-event rules: deriving proposed actions from ingested events.
//!
//! Rules are table-driven on the event type. Known types synthesize one
//! proposed action per affected task; unknown types persist the event with
//! no actions. Approval of an action applies its mutation through the
//! repository in the same transaction that records the decision.

use serde_json::{Map, Value};

use crate::models::{ExternalEvent, Task, TaskStatus};

/// Action type for due/start date shifts.
pub const ACTION_SHIFT_DUE_DATE: &str = "shift_due_date";

/// Action type for reassignment or rescheduling after a cancelled meeting.
pub const ACTION_REASSIGN_OR_RESCHEDULE: &str = "reassign_or_reschedule";

/// Default shift applied when the event payload carries none.
pub const DEFAULT_SHIFT_DAYS: i64 = 2;

/// An action synthesized by a rule, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDraft {
    pub task_id: String,
    pub action_type: String,
    pub title: String,
    pub description: String,
    pub payload: Map<String, Value>,
}

/// Default alert title for a known event type, used when the caller
/// supplies none.
pub fn default_event_title(event_type: &str) -> String {
    match event_type {
        "flight_cancellation" => "Flight cancellation impacting travel".to_string(),
        "participant_meeting_cancelled" => {
            "Participant meeting cancelled - scheduling impact".to_string()
        }
        other => format!("External event: {other}"),
    }
}

/// Applies the rule table to an event, producing zero or more action
/// drafts over the affected tasks. Terminal tasks never receive proposals.
pub fn propose_actions(event: &ExternalEvent, affected_tasks: &[&Task]) -> Vec<ActionDraft> {
    let shift_days = event
        .payload
        .get("shift_days")
        .and_then(Value::as_i64)
        .filter(|days| *days >= 1)
        .unwrap_or(DEFAULT_SHIFT_DAYS);

    let mut drafts = Vec::new();
    for task in affected_tasks {
        if task.status.is_terminal() {
            continue;
        }
        match event.event_type.as_str() {
            "flight_cancellation" => {
                let mut payload = Map::new();
                payload.insert("shift_days".to_string(), Value::from(shift_days));
                payload.insert(
                    "reason".to_string(),
                    Value::from(event.event_type.clone()),
                );
                drafts.push(ActionDraft {
                    task_id: task.task_id.clone(),
                    action_type: ACTION_SHIFT_DUE_DATE.to_string(),
                    title: format!("Shift due date: {}", task.title),
                    description: format!(
                        "Flight cancellation may delay travel. Shifting the due date by +{shift_days} day(s). Approve to apply."
                    ),
                    payload,
                });
            }
            "participant_meeting_cancelled" => {
                let mut payload = Map::new();
                payload.insert("shift_days".to_string(), Value::from(shift_days));
                payload.insert(
                    "reason".to_string(),
                    Value::from(event.event_type.clone()),
                );
                drafts.push(ActionDraft {
                    task_id: task.task_id.clone(),
                    action_type: ACTION_REASSIGN_OR_RESCHEDULE.to_string(),
                    title: format!("Re-adjust schedule: {}", task.title),
                    description: format!(
                        "Participant meeting cancelled. Reassign or shift by +{shift_days} day(s) to allow rescheduling. Approve to apply."
                    ),
                    payload,
                });
            }
            // Unknown event types create the event but no actions.
            _ => {}
        }
    }
    drafts
}

/// The mutation implied by an approved action's payload: a day shift for
/// the date fields and/or a replacement assignee list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionMutation {
    pub shift_days: i64,
    pub assignees: Option<Vec<String>>,
}

/// Decodes the mutation for a persisted action payload. Unknown action
/// types yield an empty mutation rather than an error so legacy rows stay
/// harmless.
pub fn mutation_for(action_type: &str, payload: &Map<String, Value>) -> ActionMutation {
    let shift_days = payload
        .get("shift_days")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let assignees = payload.get("assignees").and_then(Value::as_array).map(|list| {
        list.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    });

    match action_type {
        ACTION_SHIFT_DUE_DATE => ActionMutation {
            shift_days,
            assignees: None,
        },
        ACTION_REASSIGN_OR_RESCHEDULE => ActionMutation {
            shift_days: if assignees.is_some() { 0 } else { shift_days },
            assignees,
        },
        _ => ActionMutation::default(),
    }
}

/// Whether a task would be proposed on at all (used to pick fallback
/// targets when an event names no affected tasks).
pub fn is_proposal_candidate(task: &Task) -> bool {
    !task.status.is_terminal() && task.status != TaskStatus::NotStarted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use crate::testutil::{now_fixture, task};

    fn event(event_type: &str, shift_days: Option<i64>) -> ExternalEvent {
        let mut payload = Map::new();
        if let Some(days) = shift_days {
            payload.insert("shift_days".to_string(), Value::from(days));
        }
        ExternalEvent {
            id: 1,
            plan_id: "plan-1".into(),
            event_type: event_type.into(),
            title: default_event_title(event_type),
            description: None,
            severity: Severity::High,
            affected_task_ids: vec!["t1".into()],
            payload,
            created_at: now_fixture(),
            acknowledged_at: None,
        }
    }

    #[test]
    fn flight_cancellation_shifts_each_affected_task() {
        let t1 = task("t1");
        let t2 = task("t2");
        let drafts = propose_actions(&event("flight_cancellation", Some(3)), &[&t1, &t2]);
        assert_eq!(drafts.len(), 2);
        assert!(drafts
            .iter()
            .all(|d| d.action_type == ACTION_SHIFT_DUE_DATE));
        assert_eq!(drafts[0].payload["shift_days"], Value::from(3));
    }

    #[test]
    fn shift_days_below_one_falls_back_to_default() {
        let t1 = task("t1");
        let drafts = propose_actions(&event("flight_cancellation", Some(0)), &[&t1]);
        assert_eq!(drafts[0].payload["shift_days"], Value::from(DEFAULT_SHIFT_DAYS));
    }

    #[test]
    fn meeting_cancelled_proposes_reassign() {
        let t1 = task("t1");
        let drafts = propose_actions(&event("participant_meeting_cancelled", None), &[&t1]);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].action_type, ACTION_REASSIGN_OR_RESCHEDULE);
        assert_eq!(
            drafts[0].payload["reason"],
            Value::from("participant_meeting_cancelled")
        );
    }

    #[test]
    fn unknown_event_type_yields_no_actions() {
        let t1 = task("t1");
        assert!(propose_actions(&event("vendor_bankruptcy", None), &[&t1]).is_empty());
    }

    #[test]
    fn completed_tasks_are_skipped() {
        let mut done = task("t1");
        done.status = TaskStatus::Completed;
        done.percent_complete = 100;
        assert!(propose_actions(&event("flight_cancellation", Some(2)), &[&done]).is_empty());
    }

    #[test]
    fn mutation_decoding() {
        let mut payload = Map::new();
        payload.insert("shift_days".to_string(), Value::from(4));
        let m = mutation_for(ACTION_SHIFT_DUE_DATE, &payload);
        assert_eq!(m.shift_days, 4);
        assert!(m.assignees.is_none());

        payload.insert(
            "assignees".to_string(),
            Value::from(vec!["carol", "dave"]),
        );
        let m = mutation_for(ACTION_REASSIGN_OR_RESCHEDULE, &payload);
        assert_eq!(m.shift_days, 0);
        assert_eq!(m.assignees, Some(vec!["carol".to_string(), "dave".to_string()]));

        let m = mutation_for("unknown_type", &payload);
        assert_eq!(m, ActionMutation::default());
    }
}

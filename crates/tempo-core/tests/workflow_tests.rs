//! End-to-end tests for the external-event workflow: ingest, proposal
//! derivation, human approval with atomic mutation, rejection and cleanup.

mod common;

use common::{create_test_planner, seed_plan, seed_task_with_dates};
use serde_json::{Map, Value};
use tempo_core::params::{
    ActionDecision, ActionRef, AddDependency, EventRef, IngestEvent, ListActions, ListEvents,
    TaskRef,
};
use tempo_core::{ActionStatus, PlannerError};

fn shift_payload(days: i64) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("shift_days".to_string(), Value::from(days));
    payload
}

#[tokio::test]
async fn approval_applies_mutation_atomically() {
    // S4: ingest a flight cancellation affecting t3 with shift_days 2,
    // approve the proposal, and observe the shifted due date together with
    // the approved status.
    let (_tmp, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    for (task_id, start, due) in [
        ("t1", "2026-04-01T00:00:00Z", "2026-04-03T00:00:00Z"),
        ("t2", "2026-04-03T00:00:00Z", "2026-04-06T00:00:00Z"),
        ("t3", "2026-04-06T00:00:00Z", "2026-04-10T00:00:00Z"),
    ] {
        seed_task_with_dates(&planner, "p1", task_id, Some(start), Some(due)).await;
    }
    for (pred, succ) in [("t1", "t2"), ("t2", "t3")] {
        planner
            .add_dependency(&AddDependency {
                plan_id: "p1".into(),
                predecessor_id: pred.into(),
                successor_id: succ.into(),
                ..Default::default()
            })
            .await
            .expect("add dependency");
    }

    let outcome = planner
        .ingest_event(&IngestEvent {
            plan_id: "p1".into(),
            event_type: "flight_cancellation".into(),
            severity: Some("high".into()),
            affected_task_ids: vec!["t3".into()],
            payload: shift_payload(2),
            ..Default::default()
        })
        .await
        .expect("ingest");
    assert_eq!(outcome.proposed_actions.len(), 1);
    let action = &outcome.proposed_actions[0];
    assert_eq!(action.status, ActionStatus::Pending);
    assert_eq!(action.task_id, "t3");
    // Known event types get a default title when none is supplied.
    assert!(outcome.event.title.contains("Flight cancellation"));

    let approved = planner
        .approve_action(&ActionDecision {
            plan_id: "p1".into(),
            action_id: action.id,
            decided_by: "carol".into(),
        })
        .await
        .expect("approve");
    assert_eq!(approved.status, ActionStatus::Approved);
    assert_eq!(approved.decided_by.as_deref(), Some("carol"));
    assert!(approved.decided_at.is_some());

    // The mutation is visible in the same snapshot as the approval.
    let task = planner
        .get_task(&TaskRef {
            plan_id: "p1".into(),
            task_id: "t3".into(),
        })
        .await
        .expect("get task")
        .expect("t3 exists");
    assert_eq!(
        task.due_date.map(|d| d.to_string()),
        Some("2026-04-12T00:00:00Z".to_string())
    );
    assert_eq!(
        task.start_date.map(|d| d.to_string()),
        Some("2026-04-08T00:00:00Z".to_string())
    );
}

#[tokio::test]
async fn approve_is_idempotent() {
    let (_tmp, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    seed_task_with_dates(
        &planner,
        "p1",
        "t1",
        Some("2026-04-01T00:00:00Z"),
        Some("2026-04-05T00:00:00Z"),
    )
    .await;

    let outcome = planner
        .ingest_event(&IngestEvent {
            plan_id: "p1".into(),
            event_type: "flight_cancellation".into(),
            affected_task_ids: vec!["t1".into()],
            payload: shift_payload(3),
            ..Default::default()
        })
        .await
        .expect("ingest");
    let action_id = outcome.proposed_actions[0].id;
    let decision = ActionDecision {
        plan_id: "p1".into(),
        action_id,
        decided_by: "carol".into(),
    };

    planner.approve_action(&decision).await.expect("first");
    let second = planner.approve_action(&decision).await.expect("second");
    assert_eq!(second.status, ActionStatus::Approved);

    // The shift landed exactly once.
    let task = planner
        .get_task(&TaskRef {
            plan_id: "p1".into(),
            task_id: "t1".into(),
        })
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(
        task.due_date.map(|d| d.to_string()),
        Some("2026-04-08T00:00:00Z".to_string())
    );
}

#[tokio::test]
async fn reject_after_approve_conflicts() {
    let (_tmp, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    seed_task_with_dates(&planner, "p1", "t1", None, Some("2026-04-05T00:00:00Z")).await;

    let outcome = planner
        .ingest_event(&IngestEvent {
            plan_id: "p1".into(),
            event_type: "participant_meeting_cancelled".into(),
            affected_task_ids: vec!["t1".into()],
            ..Default::default()
        })
        .await
        .expect("ingest");
    let action_id = outcome.proposed_actions[0].id;
    let decision = ActionDecision {
        plan_id: "p1".into(),
        action_id,
        decided_by: "carol".into(),
    };
    planner.approve_action(&decision).await.expect("approve");
    let err = planner.reject_action(&decision).await.unwrap_err();
    assert!(matches!(err, PlannerError::ActionAlreadyDecided { .. }));
}

#[tokio::test]
async fn unknown_event_type_creates_event_without_actions() {
    let (_tmp, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    seed_task_with_dates(&planner, "p1", "t1", None, None).await;

    let outcome = planner
        .ingest_event(&IngestEvent {
            plan_id: "p1".into(),
            event_type: "volcanic_ash_cloud".into(),
            affected_task_ids: vec!["t1".into()],
            ..Default::default()
        })
        .await
        .expect("ingest");
    assert!(outcome.proposed_actions.is_empty());

    let events = planner
        .list_events(&ListEvents {
            plan_id: "p1".into(),
            limit: None,
        })
        .await
        .expect("list events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "volcanic_ash_cloud");
}

#[tokio::test]
async fn action_list_filters_by_status() {
    let (_tmp, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    seed_task_with_dates(&planner, "p1", "t1", None, Some("2026-04-05T00:00:00Z")).await;
    seed_task_with_dates(&planner, "p1", "t2", None, Some("2026-04-06T00:00:00Z")).await;

    let outcome = planner
        .ingest_event(&IngestEvent {
            plan_id: "p1".into(),
            event_type: "flight_cancellation".into(),
            affected_task_ids: vec!["t1".into(), "t2".into()],
            payload: shift_payload(1),
            ..Default::default()
        })
        .await
        .expect("ingest");
    assert_eq!(outcome.proposed_actions.len(), 2);

    planner
        .approve_action(&ActionDecision {
            plan_id: "p1".into(),
            action_id: outcome.proposed_actions[0].id,
            decided_by: "carol".into(),
        })
        .await
        .expect("approve one");

    let pending = planner
        .list_actions(&ListActions {
            plan_id: "p1".into(),
            status: Some("pending".into()),
            limit: None,
        })
        .await
        .expect("pending");
    assert_eq!(pending.len(), 1);
    let approved = planner
        .list_actions(&ListActions {
            plan_id: "p1".into(),
            status: Some("approved".into()),
            limit: None,
        })
        .await
        .expect("approved");
    assert_eq!(approved.len(), 1);
}

#[tokio::test]
async fn delete_event_removes_derived_actions() {
    let (_tmp, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    seed_task_with_dates(&planner, "p1", "t1", None, Some("2026-04-05T00:00:00Z")).await;

    let outcome = planner
        .ingest_event(&IngestEvent {
            plan_id: "p1".into(),
            event_type: "flight_cancellation".into(),
            affected_task_ids: vec!["t1".into()],
            payload: shift_payload(2),
            ..Default::default()
        })
        .await
        .expect("ingest");

    planner
        .delete_event(&EventRef {
            plan_id: "p1".into(),
            event_id: outcome.event.id,
        })
        .await
        .expect("delete event");

    let actions = planner
        .list_actions(&ListActions {
            plan_id: "p1".into(),
            status: None,
            limit: None,
        })
        .await
        .expect("list actions");
    assert!(actions.is_empty());

    // Deleting a pending action outright is distinct from rejecting it.
    let err = planner
        .delete_action(&ActionRef {
            plan_id: "p1".into(),
            action_id: outcome.proposed_actions[0].id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PlannerError::ActionNotFound { .. }));
}

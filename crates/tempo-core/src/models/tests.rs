//! Tests for the domain models.

use std::str::FromStr;

use super::*;

#[test]
fn task_status_round_trip() {
    for status in TaskStatus::ALL {
        assert_eq!(TaskStatus::from_str(status.as_str()), Ok(status));
    }
    assert!(TaskStatus::from_str("paused").is_err());
}

#[test]
fn task_status_accepts_snake_case() {
    assert_eq!(
        TaskStatus::from_str("in_progress"),
        Ok(TaskStatus::InProgress)
    );
    assert_eq!(
        TaskStatus::from_str("under_review"),
        Ok(TaskStatus::UnderReview)
    );
}

#[test]
fn terminal_statuses() {
    assert!(TaskStatus::Completed.is_terminal());
    assert!(TaskStatus::Cancelled.is_terminal());
    assert!(!TaskStatus::Blocked.is_terminal());
}

#[test]
fn dependency_type_round_trip() {
    for raw in ["FS", "SS", "FF", "SF"] {
        let parsed = DependencyType::from_str(raw).unwrap();
        assert_eq!(parsed.as_str(), raw);
    }
    assert_eq!(
        DependencyType::from_str("fs"),
        Ok(DependencyType::FinishToStart)
    );
    assert!(DependencyType::from_str("XX").is_err());
}

#[test]
fn task_durations() {
    let task = Task {
        plan_id: "p1".into(),
        task_id: "t1".into(),
        title: "Book venue".into(),
        bucket_id: "b1".into(),
        status: TaskStatus::Completed,
        percent_complete: 100,
        start_date: Some("2026-01-01T00:00:00Z".parse().unwrap()),
        due_date: Some("2026-01-05T00:00:00Z".parse().unwrap()),
        completed_date: Some("2026-01-07T00:00:00Z".parse().unwrap()),
        priority: 5,
        assignees: vec!["alice".into()],
        assignee_names: vec!["Alice".into()],
        applied_categories: vec![],
        description: None,
        order_hint: String::new(),
        created_at: "2025-12-20T00:00:00Z".parse().unwrap(),
        last_modified_at: "2026-01-07T00:00:00Z".parse().unwrap(),
        created_by: Some("alice".into()),
        completed_by: Some("alice".into()),
    };
    assert_eq!(task.planned_duration_days(), Some(4.0));
    assert_eq!(task.actual_duration_days(), Some(6.0));
    assert!(!task.is_overdue("2026-02-01T00:00:00Z".parse().unwrap()));
}

#[test]
fn pert_prior_is_triangular() {
    let prior = PertEstimate::global_prior();
    assert_eq!(
        (prior.optimistic, prior.most_likely, prior.pessimistic),
        (1.0, 3.0, 7.0)
    );
    assert_eq!(prior.bias_factor, 1.0);
}

#[test]
fn severity_serializes_lowercase() {
    assert_eq!(
        serde_json::to_string(&Severity::Critical).unwrap(),
        "\"critical\""
    );
    assert_eq!(Severity::from_str("HIGH"), Ok(Severity::High));
}

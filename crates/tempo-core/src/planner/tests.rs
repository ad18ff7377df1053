//! Tests for the planner module.

use tempfile::TempDir;

use super::*;
use crate::models::TaskStatus;
use crate::params::*;

/// Helper function to create a test planner
async fn create_test_planner() -> (TempDir, Planner) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let planner = PlannerBuilder::new()
        .with_database_path(&db_path)
        .build()
        .await
        .expect("Failed to create planner");
    (temp_dir, planner)
}

async fn seed_plan(planner: &Planner, plan_id: &str) {
    planner
        .create_plan(&CreatePlan {
            plan_id: plan_id.to_string(),
            name: Some(format!("Plan {plan_id}")),
            event_date: None,
        })
        .await
        .expect("Failed to create plan");
    planner
        .upsert_bucket(&UpsertBucket {
            plan_id: plan_id.to_string(),
            bucket_id: "general".to_string(),
            name: "General".to_string(),
        })
        .await
        .expect("Failed to create bucket");
}

async fn seed_task(planner: &Planner, plan_id: &str, task_id: &str) {
    planner
        .create_task(&CreateTask {
            plan_id: plan_id.to_string(),
            task_id: task_id.to_string(),
            title: format!("Task {task_id}"),
            bucket_id: "general".to_string(),
            ..Default::default()
        })
        .await
        .expect("Failed to create task");
}

#[tokio::test]
async fn create_and_list_plans() {
    let (_temp_dir, planner) = create_test_planner().await;
    seed_plan(&planner, "congress-2026").await;

    let plans = planner.list_plans().await.expect("Failed to list plans");
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].plan_id, "congress-2026");
    assert_eq!(plans[0].name, "Plan congress-2026");

    let plan = planner
        .get_plan(&PlanRef {
            plan_id: "congress-2026".into(),
        })
        .await
        .expect("Failed to get plan");
    assert!(plan.is_some());
}

#[tokio::test]
async fn task_lifecycle() {
    let (_temp_dir, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    seed_task(&planner, "p1", "t1").await;

    // New tasks start NotStarted at 0%.
    let task = planner
        .get_task(&TaskRef {
            plan_id: "p1".into(),
            task_id: "t1".into(),
        })
        .await
        .expect("Failed to get task")
        .expect("Task missing");
    assert_eq!(task.status, TaskStatus::NotStarted);
    assert_eq!(task.percent_complete, 0);
    assert!(!task.order_hint.is_empty());

    // Progress the task; completing sets percent and the completion stamp.
    let updated = planner
        .update_task(&UpdateTask {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            status: Some("inProgress".into()),
            percent_complete: Some(60),
            ..Default::default()
        })
        .await
        .expect("Failed to update task");
    assert_eq!(updated.status, TaskStatus::InProgress);

    let completed = planner
        .update_task(&UpdateTask {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            status: Some("completed".into()),
            acting_user: Some("alice".into()),
            ..Default::default()
        })
        .await
        .expect("Failed to complete task");
    assert_eq!(completed.status, TaskStatus::Completed);
    assert_eq!(completed.percent_complete, 100);
    assert!(completed.completed_date.is_some());
    assert_eq!(completed.completed_by.as_deref(), Some("alice"));
}

#[tokio::test]
async fn percent_complete_is_monotone() {
    let (_temp_dir, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    seed_task(&planner, "p1", "t1").await;

    planner
        .update_task(&UpdateTask {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            status: Some("inProgress".into()),
            percent_complete: Some(50),
            ..Default::default()
        })
        .await
        .expect("Failed to update");

    let err = planner
        .update_task(&UpdateTask {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            percent_complete: Some(30),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, crate::PlannerError::InvalidInput { .. }));
}

#[tokio::test]
async fn start_after_due_is_rejected() {
    let (_temp_dir, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    let err = planner
        .create_task(&CreateTask {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            title: "Backwards".into(),
            bucket_id: "general".into(),
            start_date: Some("2026-05-10T00:00:00Z".into()),
            due_date: Some("2026-05-01T00:00:00Z".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, crate::PlannerError::InvalidInput { .. }));
}

#[tokio::test]
async fn subtask_lifecycle() {
    let (_temp_dir, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    seed_task(&planner, "p1", "t1").await;

    let subtask = planner
        .add_subtask(&AddSubtask {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            subtask_id: "c1".into(),
            title: "Confirm caterer".into(),
            ..Default::default()
        })
        .await
        .expect("Failed to add subtask");
    assert!(!subtask.is_checked);

    let checked = planner
        .update_subtask(&UpdateSubtask {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            subtask_id: "c1".into(),
            is_checked: Some(true),
            ..Default::default()
        })
        .await
        .expect("Failed to update subtask");
    assert!(checked.is_checked);

    planner
        .delete_subtask(&DeleteSubtask {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            subtask_id: "c1".into(),
            ..Default::default()
        })
        .await
        .expect("Failed to delete subtask");
    let remaining = planner
        .get_subtasks(&TaskRef {
            plan_id: "p1".into(),
            task_id: "t1".into(),
        })
        .await
        .expect("Failed to list subtasks");
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn deleting_task_removes_subtasks_and_edges() {
    let (_temp_dir, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    seed_task(&planner, "p1", "t1").await;
    seed_task(&planner, "p1", "t2").await;
    planner
        .add_dependency(&AddDependency {
            plan_id: "p1".into(),
            predecessor_id: "t1".into(),
            successor_id: "t2".into(),
            ..Default::default()
        })
        .await
        .expect("Failed to add dependency");
    planner
        .add_subtask(&AddSubtask {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            subtask_id: "c1".into(),
            title: "Checklist item".into(),
            ..Default::default()
        })
        .await
        .expect("Failed to add subtask");

    planner
        .delete_task(&DeleteTask {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            ..Default::default()
        })
        .await
        .expect("Failed to delete task");

    let deps = planner
        .get_task_dependencies(&TaskRef {
            plan_id: "p1".into(),
            task_id: "t2".into(),
        })
        .await
        .expect("Failed to get dependencies");
    assert!(deps.upstream.is_empty());
}

#[tokio::test]
async fn dependency_cycle_is_refused_and_state_unchanged() {
    // S6: t1 -> t2 -> t3, then t3 -> t1 must fail with CycleDetected.
    let (_temp_dir, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    for task_id in ["t1", "t2", "t3"] {
        seed_task(&planner, "p1", task_id).await;
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
            .expect("Failed to add dependency");
    }

    let err = planner
        .add_dependency(&AddDependency {
            plan_id: "p1".into(),
            predecessor_id: "t3".into(),
            successor_id: "t1".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, crate::PlannerError::CycleDetected { .. }));

    // The original chain survives untouched.
    let cp = planner
        .get_critical_path(&PlanRef {
            plan_id: "p1".into(),
        })
        .await
        .expect("Failed to compute critical path");
    assert_eq!(cp.task_ids, vec!["t1", "t2", "t3"]);
    assert!(cp.diagnostics.is_empty());
}

#[tokio::test]
async fn duplicate_dependency_is_a_conflict() {
    let (_temp_dir, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    seed_task(&planner, "p1", "t1").await;
    seed_task(&planner, "p1", "t2").await;
    let params = AddDependency {
        plan_id: "p1".into(),
        predecessor_id: "t1".into(),
        successor_id: "t2".into(),
        ..Default::default()
    };
    planner.add_dependency(&params).await.expect("first add");
    let err = planner.add_dependency(&params).await.unwrap_err();
    assert!(matches!(
        err,
        crate::PlannerError::DuplicateDependency { .. }
    ));
}

#[tokio::test]
async fn lock_contention_and_renewal() {
    let (_temp_dir, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    seed_task(&planner, "p1", "t1").await;

    let lock = planner
        .acquire_lock(&AcquireLock {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            user_id: "alice".into(),
            ttl_minutes: Some(15),
        })
        .await
        .expect("alice acquires");
    assert_eq!(lock.user_id, "alice");

    // Same holder renews without failing.
    planner
        .acquire_lock(&AcquireLock {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            user_id: "alice".into(),
            ttl_minutes: Some(15),
        })
        .await
        .expect("alice renews");

    // A different user is rejected with the holder's identity.
    let err = planner
        .acquire_lock(&AcquireLock {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            user_id: "bob".into(),
            ttl_minutes: Some(15),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        crate::PlannerError::LockedByOther { ref holder, .. } if holder == "alice"
    ));

    // Mutations under someone else's lock are rejected too.
    let err = planner
        .update_task(&UpdateTask {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            title: Some("Renamed".into()),
            acting_user: Some("bob".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, crate::PlannerError::LockedByOther { .. }));

    // The holder can mutate and release.
    planner
        .update_task(&UpdateTask {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            title: Some("Renamed".into()),
            acting_user: Some("alice".into()),
            ..Default::default()
        })
        .await
        .expect("holder mutates");
    planner
        .release_lock(&ReleaseLock {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            user_id: "alice".into(),
        })
        .await
        .expect("holder releases");
    let lock = planner
        .get_lock(&TaskRef {
            plan_id: "p1".into(),
            task_id: "t1".into(),
        })
        .await
        .expect("get lock");
    assert!(lock.is_none());
}

#[tokio::test]
async fn release_by_non_holder_fails() {
    let (_temp_dir, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    seed_task(&planner, "p1", "t1").await;
    planner
        .acquire_lock(&AcquireLock {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            user_id: "alice".into(),
            ttl_minutes: None,
        })
        .await
        .expect("acquire");
    let err = planner
        .release_lock(&ReleaseLock {
            plan_id: "p1".into(),
            task_id: "t1".into(),
            user_id: "bob".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, crate::PlannerError::NotHolder { .. }));
}

#[tokio::test]
async fn clone_template_shifts_dates_and_resets_status() {
    let (_temp_dir, planner) = create_test_planner().await;
    seed_plan(&planner, "congress-2026").await;
    planner
        .create_task(&CreateTask {
            plan_id: "congress-2026".into(),
            task_id: "book-venue".into(),
            title: "Book venue".into(),
            bucket_id: "general".into(),
            start_date: Some("2026-01-01T00:00:00Z".into()),
            due_date: Some("2026-01-11T00:00:00Z".into()),
            assignees: vec!["alice".into()],
            ..Default::default()
        })
        .await
        .expect("create task");
    planner
        .create_task(&CreateTask {
            plan_id: "congress-2026".into(),
            task_id: "send-invites".into(),
            title: "Send invitations".into(),
            bucket_id: "general".into(),
            start_date: Some("2026-01-11T00:00:00Z".into()),
            due_date: Some("2026-02-01T00:00:00Z".into()),
            ..Default::default()
        })
        .await
        .expect("create task");
    planner
        .add_dependency(&AddDependency {
            plan_id: "congress-2026".into(),
            predecessor_id: "book-venue".into(),
            successor_id: "send-invites".into(),
            ..Default::default()
        })
        .await
        .expect("add dependency");
    planner
        .update_task(&UpdateTask {
            plan_id: "congress-2026".into(),
            task_id: "book-venue".into(),
            status: Some("completed".into()),
            ..Default::default()
        })
        .await
        .expect("complete");

    let cloned = planner
        .clone_template(&CloneTemplate {
            source_plan_id: "congress-2026".into(),
            target_plan_id: "congress-2027".into(),
            event_date: "2027-02-01T00:00:00Z".into(),
            name: Some("Congress 2027".into()),
            preserve_task_ids: true,
        })
        .await
        .expect("clone");
    assert_eq!(cloned.source_plan_id.as_deref(), Some("congress-2026"));

    let source_tasks = planner
        .get_tasks(&PlanRef {
            plan_id: "congress-2026".into(),
        })
        .await
        .expect("source tasks");
    let target_tasks = planner
        .get_tasks(&PlanRef {
            plan_id: "congress-2027".into(),
        })
        .await
        .expect("target tasks");
    assert_eq!(source_tasks.len(), target_tasks.len());

    // Every date shifts by the same delta (source latest due -> event date:
    // exactly one year here) and statuses reset.
    for (source, target) in source_tasks.iter().zip(&target_tasks) {
        assert_eq!(source.task_id, target.task_id);
        assert_eq!(source.title, target.title);
        assert_eq!(source.assignees, target.assignees);
        assert_eq!(target.status, TaskStatus::NotStarted);
        assert_eq!(target.percent_complete, 0);
        assert!(target.completed_date.is_none());
        let delta = crate::dates::days_between(
            source.due_date.expect("source due"),
            target.due_date.expect("target due"),
        );
        assert_eq!(delta, 365.0);
    }

    // Dependencies were remapped onto the clone.
    let deps = planner
        .get_task_dependencies(&TaskRef {
            plan_id: "congress-2027".into(),
            task_id: "send-invites".into(),
        })
        .await
        .expect("deps");
    assert_eq!(deps.upstream.len(), 1);
    assert_eq!(deps.upstream[0].task_id, "book-venue");
}

#[tokio::test]
async fn dependency_lens_impact_statement() {
    let (_temp_dir, planner) = create_test_planner().await;
    seed_plan(&planner, "p1").await;
    for task_id in ["t1", "t2", "t3"] {
        seed_task(&planner, "p1", task_id).await;
    }
    for (pred, succ) in [("t1", "t2"), ("t1", "t3")] {
        planner
            .add_dependency(&AddDependency {
                plan_id: "p1".into(),
                predecessor_id: pred.into(),
                successor_id: succ.into(),
                ..Default::default()
            })
            .await
            .expect("add dep");
    }
    let deps = planner
        .get_task_dependencies(&TaskRef {
            plan_id: "p1".into(),
            task_id: "t1".into(),
        })
        .await
        .expect("deps");
    assert_eq!(deps.downstream.len(), 2);
    assert!(deps.impact_statement.contains("2 downstream"));

    let leaf = planner
        .get_task_dependencies(&TaskRef {
            plan_id: "p1".into(),
            task_id: "t3".into(),
        })
        .await
        .expect("deps");
    assert_eq!(leaf.impact_statement, "No downstream dependencies.");
}

#[tokio::test]
async fn unknown_plan_is_not_found() {
    let (_temp_dir, planner) = create_test_planner().await;
    let err = planner
        .get_critical_path(&PlanRef {
            plan_id: "missing".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, crate::PlannerError::PlanNotFound { .. }));
}

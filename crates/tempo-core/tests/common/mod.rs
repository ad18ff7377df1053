use tempfile::TempDir;
use tempo_core::params::{CreatePlan, CreateTask, UpsertBucket};
use tempo_core::{Planner, PlannerBuilder};

/// Helper function to create a test planner
pub async fn create_test_planner() -> (TempDir, Planner) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let planner = PlannerBuilder::new()
        .with_database_path(&db_path)
        .build()
        .await
        .expect("Failed to create planner");
    (temp_dir, planner)
}

/// Creates a plan with a single "general" bucket.
pub async fn seed_plan(planner: &Planner, plan_id: &str) {
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

/// Creates a task with optional dates (RFC 3339).
pub async fn seed_task_with_dates(
    planner: &Planner,
    plan_id: &str,
    task_id: &str,
    start: Option<&str>,
    due: Option<&str>,
) {
    planner
        .create_task(&CreateTask {
            plan_id: plan_id.to_string(),
            task_id: task_id.to_string(),
            title: format!("Task {task_id}"),
            bucket_id: "general".to_string(),
            start_date: start.map(str::to_string),
            due_date: due.map(str::to_string),
            ..Default::default()
        })
        .await
        .expect("Failed to create task");
}

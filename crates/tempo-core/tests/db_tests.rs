//! Database-level tests: lock expiry with a controlled clock, fingerprint
//! dirty tracking and persistence across connections.

use jiff::Timestamp;
use tempfile::TempDir;
use tempo_core::models::{Bucket, Task, TaskStatus};
use tempo_core::{Database, PlannerError};

fn create_test_database() -> (TempDir, Database) {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).expect("Failed to create database");
    (temp_dir, db)
}

fn ts(raw: &str) -> Timestamp {
    raw.parse().expect("valid timestamp")
}

fn seed_task(db: &mut Database, plan_id: &str, task_id: &str, now: Timestamp) {
    let task = Task {
        plan_id: plan_id.to_string(),
        task_id: task_id.to_string(),
        title: format!("Task {task_id}"),
        bucket_id: "general".to_string(),
        status: TaskStatus::NotStarted,
        percent_complete: 0,
        start_date: None,
        due_date: None,
        completed_date: None,
        priority: 5,
        assignees: Vec::new(),
        assignee_names: Vec::new(),
        applied_categories: Vec::new(),
        description: None,
        order_hint: String::new(),
        created_at: now,
        last_modified_at: now,
        created_by: None,
        completed_by: None,
    };
    db.create_task(task, None, now).expect("Failed to create task");
}

fn seed_plan(db: &mut Database, plan_id: &str, now: Timestamp) {
    db.create_plan(plan_id, plan_id, None, now)
        .expect("Failed to create plan");
    db.upsert_bucket(
        plan_id,
        &Bucket {
            bucket_id: "general".to_string(),
            name: "General".to_string(),
            order_hint: String::new(),
        },
        now,
    )
    .expect("Failed to create bucket");
}

#[test]
fn lock_expires_after_ttl() {
    // S5 with a controlled clock: alice holds a 15-minute lock; bob is
    // rejected at +10 minutes and succeeds at +16 minutes.
    let (_tmp, mut db) = create_test_database();
    let t0 = ts("2026-03-01T12:00:00Z");
    seed_plan(&mut db, "p1", t0);
    seed_task(&mut db, "p1", "t1", t0);

    db.acquire_lock("p1", "t1", "alice", 15 * 60, t0)
        .expect("alice acquires");

    let ten_minutes = ts("2026-03-01T12:10:00Z");
    let err = db
        .acquire_lock("p1", "t1", "bob", 15 * 60, ten_minutes)
        .unwrap_err();
    assert!(matches!(
        err,
        PlannerError::LockedByOther { ref holder, .. } if holder == "alice"
    ));

    let sixteen_minutes = ts("2026-03-01T12:16:00Z");
    let lock = db
        .acquire_lock("p1", "t1", "bob", 15 * 60, sixteen_minutes)
        .expect("bob takes over after expiry");
    assert_eq!(lock.user_id, "bob");
}

#[test]
fn expired_lock_reads_as_absent() {
    let (_tmp, mut db) = create_test_database();
    let t0 = ts("2026-03-01T12:00:00Z");
    seed_plan(&mut db, "p1", t0);
    seed_task(&mut db, "p1", "t1", t0);
    db.acquire_lock("p1", "t1", "alice", 60, t0).expect("acquire");

    let live = db
        .get_lock("p1", "t1", ts("2026-03-01T12:00:30Z"))
        .expect("read");
    assert!(live.is_some());
    let gone = db
        .get_lock("p1", "t1", ts("2026-03-01T12:02:00Z"))
        .expect("read");
    assert!(gone.is_none());
}

#[test]
fn at_most_one_lock_per_task() {
    let (_tmp, mut db) = create_test_database();
    let t0 = ts("2026-03-01T12:00:00Z");
    seed_plan(&mut db, "p1", t0);
    seed_task(&mut db, "p1", "t1", t0);
    db.acquire_lock("p1", "t1", "alice", 900, t0).expect("first");
    // Renewal by the same holder replaces, never duplicates.
    db.acquire_lock("p1", "t1", "alice", 900, ts("2026-03-01T12:05:00Z"))
        .expect("renew");
    let lock = db
        .get_lock("p1", "t1", ts("2026-03-01T12:06:00Z"))
        .expect("read")
        .expect("present");
    assert_eq!(lock.acquired_at, ts("2026-03-01T12:05:00Z"));
}

#[test]
fn fingerprint_dirty_tracking() {
    let (_tmp, mut db) = create_test_database();
    let t0 = ts("2026-03-01T12:00:00Z");
    seed_plan(&mut db, "p1", t0);
    seed_task(&mut db, "p1", "t1", t0);

    // Mutations before the first sync leave the plan dirty.
    let state = db.get_sync_state("p1").expect("state");
    assert!(state.dirty);
    assert!(state.fingerprint.is_none());

    // Syncing records the fingerprint and clears the flag.
    let synced = db.mark_synced("p1", ts("2026-03-01T13:00:00Z")).expect("sync");
    assert!(!synced.dirty);
    let baseline = synced.fingerprint.expect("fingerprint recorded");
    assert_eq!(db.current_fingerprint("p1").expect("fp"), baseline);

    // A content mutation flips the flag and changes the fingerprint.
    seed_task(&mut db, "p1", "t2", ts("2026-03-01T14:00:00Z"));
    let state = db.get_sync_state("p1").expect("state");
    assert!(state.dirty);
    assert_ne!(db.current_fingerprint("p1").expect("fp"), baseline);

    // Re-syncing settles it again, shifting the previous sync instant.
    let resynced = db.mark_synced("p1", ts("2026-03-01T15:00:00Z")).expect("sync");
    assert!(!resynced.dirty);
    assert_eq!(
        resynced.previous_sync_at,
        Some(ts("2026-03-01T13:00:00Z"))
    );
}

#[test]
fn fingerprint_is_stable_across_connections() {
    let temp_dir = TempDir::new().expect("tempdir");
    let db_path = temp_dir.path().join("test.db");
    let t0 = ts("2026-03-01T12:00:00Z");

    let first = {
        let mut db = Database::new(&db_path).expect("open");
        seed_plan(&mut db, "p1", t0);
        seed_task(&mut db, "p1", "t1", t0);
        db.current_fingerprint("p1").expect("fp")
    };

    let mut db = Database::new(&db_path).expect("reopen");
    assert_eq!(db.current_fingerprint("p1").expect("fp"), first);
}

#[test]
fn plan_delete_cascades() {
    let (_tmp, mut db) = create_test_database();
    let t0 = ts("2026-03-01T12:00:00Z");
    seed_plan(&mut db, "p1", t0);
    seed_task(&mut db, "p1", "t1", t0);
    db.add_subtask("p1", "t1", "c1", "Checklist", None, t0)
        .expect("subtask");
    db.acquire_lock("p1", "t1", "alice", 900, t0).expect("lock");

    db.delete_plan("p1").expect("delete");
    assert!(db.get_plan("p1").expect("query").is_none());
    assert!(db.get_task("p1", "t1").expect("query").is_none());
    let err = db.get_snapshot("p1").unwrap_err();
    assert!(matches!(err, PlannerError::PlanNotFound { .. }));
}

#[test]
fn completed_requires_completion_date() {
    let (_tmp, mut db) = create_test_database();
    let t0 = ts("2026-03-01T12:00:00Z");
    seed_plan(&mut db, "p1", t0);
    let mut task = Task {
        plan_id: "p1".to_string(),
        task_id: "t1".to_string(),
        title: "Inconsistent".to_string(),
        bucket_id: "general".to_string(),
        status: TaskStatus::Completed,
        percent_complete: 100,
        start_date: None,
        due_date: None,
        completed_date: None, // violates the coupling invariant
        priority: 5,
        assignees: Vec::new(),
        assignee_names: Vec::new(),
        applied_categories: Vec::new(),
        description: None,
        order_hint: String::new(),
        created_at: t0,
        last_modified_at: t0,
        created_by: None,
        completed_by: None,
    };
    let err = db.create_task(task.clone(), None, t0).unwrap_err();
    assert!(matches!(err, PlannerError::InvalidInput { ref field, .. } if field == "completed_date"));

    task.completed_date = Some(t0);
    db.create_task(task, None, t0).expect("now consistent");
}

#[test]
fn duplicate_assignees_are_rejected() {
    let (_tmp, mut db) = create_test_database();
    let t0 = ts("2026-03-01T12:00:00Z");
    seed_plan(&mut db, "p1", t0);
    let task = Task {
        plan_id: "p1".to_string(),
        task_id: "t1".to_string(),
        title: "Double-booked".to_string(),
        bucket_id: "general".to_string(),
        status: TaskStatus::NotStarted,
        percent_complete: 0,
        start_date: None,
        due_date: None,
        completed_date: None,
        priority: 5,
        assignees: vec!["alice".to_string(), "alice".to_string()],
        assignee_names: Vec::new(),
        applied_categories: Vec::new(),
        description: None,
        order_hint: String::new(),
        created_at: t0,
        last_modified_at: t0,
        created_by: None,
        completed_by: None,
    };
    let err = db.create_task(task, None, t0).unwrap_err();
    assert!(matches!(err, PlannerError::InvalidInput { ref field, .. } if field == "assignees"));
}

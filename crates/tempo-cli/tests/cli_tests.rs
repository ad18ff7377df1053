//! CLI smoke tests driving the `tempo` binary against a temp database.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn tempo(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tempo").expect("binary exists");
    cmd.arg("--database-file")
        .arg(temp_dir.path().join("tempo.db"))
        .arg("--no-color");
    cmd
}

fn seed_plan(temp_dir: &TempDir) {
    tempo(temp_dir)
        .args(["plan", "create", "congress-2026", "--name", "Congress 2026"])
        .assert()
        .success();
    tempo(temp_dir)
        .args(["plan", "bucket", "congress-2026", "general", "General"])
        .assert()
        .success();
}

#[test]
fn version_flag_works() {
    Command::cargo_bin("tempo")
        .expect("binary exists")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tempo"));
}

#[test]
fn plan_create_and_list() {
    let temp_dir = TempDir::new().expect("temp dir");
    seed_plan(&temp_dir);
    tempo(&temp_dir)
        .args(["plan", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Congress 2026"));
}

#[test]
fn task_workflow_and_critical_path() {
    let temp_dir = TempDir::new().expect("temp dir");
    seed_plan(&temp_dir);
    for (task_id, title) in [("t1", "Book venue"), ("t2", "Send invitations")] {
        tempo(&temp_dir)
            .args([
                "task",
                "create",
                "congress-2026",
                task_id,
                title,
                "--bucket",
                "general",
            ])
            .assert()
            .success();
    }
    tempo(&temp_dir)
        .args(["dep", "add", "congress-2026", "t1", "t2"])
        .assert()
        .success();
    tempo(&temp_dir)
        .args(["analyze", "critical-path", "congress-2026"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Book venue"))
        .stdout(predicate::str::contains("Send invitations"));
}

#[test]
fn cycle_refusal_maps_to_exit_code() {
    let temp_dir = TempDir::new().expect("temp dir");
    seed_plan(&temp_dir);
    for task_id in ["t1", "t2"] {
        tempo(&temp_dir)
            .args([
                "task",
                "create",
                "congress-2026",
                task_id,
                "A task",
                "--bucket",
                "general",
            ])
            .assert()
            .success();
    }
    tempo(&temp_dir)
        .args(["dep", "add", "congress-2026", "t1", "t2"])
        .assert()
        .success();
    tempo(&temp_dir)
        .args(["dep", "add", "congress-2026", "t2", "t1"])
        .assert()
        .failure()
        .code(5)
        .stderr(predicate::str::contains("cycle"));
}

#[test]
fn missing_plan_maps_to_not_found_code() {
    let temp_dir = TempDir::new().expect("temp dir");
    tempo(&temp_dir)
        .args(["analyze", "attention", "nowhere"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn lock_contention_maps_to_conflict_code() {
    let temp_dir = TempDir::new().expect("temp dir");
    seed_plan(&temp_dir);
    tempo(&temp_dir)
        .args([
            "task",
            "create",
            "congress-2026",
            "t1",
            "A task",
            "--bucket",
            "general",
        ])
        .assert()
        .success();
    tempo(&temp_dir)
        .args(["lock", "acquire", "congress-2026", "t1", "alice"])
        .assert()
        .success();
    tempo(&temp_dir)
        .args(["lock", "acquire", "congress-2026", "t1", "bob"])
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("alice"));
}

#[test]
fn simulation_runs_with_seed() {
    let temp_dir = TempDir::new().expect("temp dir");
    seed_plan(&temp_dir);
    tempo(&temp_dir)
        .args([
            "task",
            "create",
            "congress-2026",
            "t1",
            "Only task",
            "--bucket",
            "general",
        ])
        .assert()
        .success();
    tempo(&temp_dir)
        .args([
            "analyze",
            "simulate",
            "congress-2026",
            "-n",
            "200",
            "--seed",
            "42",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Monte Carlo"))
        .stdout(predicate::str::contains("p50"));
}

//! Stable plan fingerprinting.
//!
//! A fingerprint is a SHA-256 digest over the materially-tracked fields of a
//! plan: tasks, subtasks and dependency edges in a canonical order. It drives
//! the "dirty since sync" flag and the advisory memoization cache; cosmetic
//! fields (display names of assignees, descriptions of buckets) are excluded.

use sha2::{Digest, Sha256};

use crate::snapshot::PlanSnapshot;

/// Hex-encoded SHA-256 fingerprint of a plan snapshot.
pub fn plan_fingerprint(snapshot: &PlanSnapshot) -> String {
    let mut hasher = Sha256::new();

    let mut tasks: Vec<_> = snapshot.tasks.iter().collect();
    tasks.sort_by(|a, b| a.task_id.cmp(&b.task_id));
    for task in tasks {
        hasher.update(task.task_id.as_bytes());
        hasher.update([0]);
        hasher.update(task.title.as_bytes());
        hasher.update([0]);
        hasher.update(task.bucket_id.as_bytes());
        hasher.update([0]);
        hasher.update(task.status.as_str().as_bytes());
        hasher.update([task.percent_complete, task.priority]);
        for ts in [task.start_date, task.due_date, task.completed_date] {
            match ts {
                Some(ts) => hasher.update(ts.as_second().to_le_bytes()),
                None => hasher.update(i64::MIN.to_le_bytes()),
            }
        }
        for assignee in &task.assignees {
            hasher.update(assignee.as_bytes());
            hasher.update([0]);
        }
        hasher.update(task.order_hint.as_bytes());
        hasher.update([0xff]);

        if let Some(subtasks) = snapshot.subtasks.get(&task.task_id) {
            for subtask in subtasks {
                hasher.update(subtask.subtask_id.as_bytes());
                hasher.update([0]);
                hasher.update(subtask.title.as_bytes());
                hasher.update([u8::from(subtask.is_checked)]);
                hasher.update(subtask.order_hint.as_bytes());
                hasher.update([0xff]);
            }
        }
    }

    let mut deps: Vec<_> = snapshot.dependencies.iter().collect();
    deps.sort_by(|a, b| {
        (&a.predecessor_id, &a.successor_id).cmp(&(&b.predecessor_id, &b.successor_id))
    });
    for dep in deps {
        hasher.update(dep.predecessor_id.as_bytes());
        hasher.update([0]);
        hasher.update(dep.successor_id.as_bytes());
        hasher.update([0]);
        hasher.update(dep.dep_type.as_str().as_bytes());
        hasher.update([0xff]);
    }

    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

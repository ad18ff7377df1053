//! Historical calibration: PERT fitting, throughput, block rates and
//! implicit-dependency mining over completed plans.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::dates::days_between;
use crate::models::{HistoricalSample, PertEstimate, Task, TaskStatus};

/// Samples below this count fall back to the global prior.
pub const MIN_SAMPLES_FOR_FIT: usize = 3;

/// Co-occurrence consistency required before an implicit dependency is
/// reported.
pub const IMPLICIT_DEP_THRESHOLD: f64 = 0.7;

/// Per-assignee delivery statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThroughputStats {
    pub tasks_completed: usize,
    pub avg_duration_days: f64,
    pub tasks_per_week: f64,
}

/// Per-assignee pickup latency (start - created).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatencyStats {
    pub avg_latency_days: f64,
    pub median_latency_days: f64,
    pub samples: usize,
}

/// Planned-vs-actual statistics per bucket (phase).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseStats {
    pub avg_planned_days: f64,
    pub avg_actual_days: f64,
    pub bias_factor: f64,
    pub sample_count: usize,
}

/// An ordered pair of title patterns that consistently occur with temporal
/// precedence across historical plans.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImplicitDependency {
    pub from_pattern: String,
    pub to_pattern: String,
    pub confidence: f64,
    pub occurrences: usize,
}

/// Everything the historical analyzer derives. A pure function of the input
/// tasks; maps are ordered so serialization is stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalInsights {
    pub pert_by_bucket: BTreeMap<String, PertEstimate>,
    pub pert_by_task_type: BTreeMap<String, PertEstimate>,
    pub assignee_throughput: BTreeMap<String, ThroughputStats>,
    pub response_latency: BTreeMap<String, LatencyStats>,
    pub block_rate_by_bucket: BTreeMap<String, f64>,
    pub phase_stats: BTreeMap<String, PhaseStats>,
    pub implicit_dependencies: Vec<ImplicitDependency>,
    pub sample_count: usize,
}

impl HistoricalInsights {
    /// PERT estimate for a bucket, falling back to the global prior.
    pub fn pert_for_bucket(&self, bucket: &str) -> PertEstimate {
        self.pert_by_bucket
            .get(bucket)
            .copied()
            .unwrap_or_else(PertEstimate::global_prior)
    }
}

/// First three words of a title, the pattern key used for task-type stats
/// and implicit-dependency mining.
pub fn title_pattern(title: &str) -> String {
    let words: Vec<&str> = title.split_whitespace().take(3).collect();
    if words.is_empty() {
        "Unknown".to_string()
    } else {
        words.join(" ")
    }
}

/// Extracts calibration samples from historical task rows. Only completed
/// tasks with a full date triple contribute duration samples.
pub fn extract_samples(tasks: &[Task], bucket_names: &HashMap<String, String>) -> Vec<HistoricalSample> {
    let mut samples = Vec::new();
    for task in tasks {
        let (Some(start), Some(due)) = (task.start_date, task.due_date) else {
            continue;
        };
        let Some(completed) = task.completed_date else {
            continue;
        };
        let planned = days_between(start, due);
        if planned <= 0.0 {
            continue;
        }
        let bucket = bucket_names
            .get(&task.bucket_id)
            .cloned()
            .unwrap_or_else(|| task.bucket_id.clone());
        samples.push(HistoricalSample {
            plan_id: task.plan_id.clone(),
            bucket,
            title_pattern: title_pattern(&task.title),
            planned_days: planned,
            actual_days: days_between(start, completed).max(0.0),
            assignees: task.assignees.clone(),
            terminal_state: task.status,
            block_count: u32::from(task.status == TaskStatus::Blocked),
        });
    }
    samples
}

/// Analyzes historical tasks into calibration insights.
///
/// `bucket_names` maps bucket ids to display names across all source plans;
/// analytics are keyed by display name since bucket ids are plan-scoped.
pub fn analyze(tasks: &[Task], bucket_names: &HashMap<String, String>) -> HistoricalInsights {
    let samples = extract_samples(tasks, bucket_names);

    let mut by_bucket: BTreeMap<String, Vec<&HistoricalSample>> = BTreeMap::new();
    let mut by_pattern: BTreeMap<String, Vec<&HistoricalSample>> = BTreeMap::new();
    for sample in &samples {
        by_bucket.entry(sample.bucket.clone()).or_default().push(sample);
        by_pattern
            .entry(sample.title_pattern.clone())
            .or_default()
            .push(sample);
    }

    let pert_by_bucket = by_bucket
        .iter()
        .map(|(bucket, samples)| (bucket.clone(), fit_pert(samples)))
        .collect();
    let pert_by_task_type = by_pattern
        .iter()
        .map(|(pattern, samples)| (pattern.clone(), fit_pert(samples)))
        .collect();

    HistoricalInsights {
        pert_by_bucket,
        pert_by_task_type,
        assignee_throughput: throughput(tasks),
        response_latency: response_latency(tasks),
        block_rate_by_bucket: block_rates(tasks, bucket_names),
        phase_stats: phase_stats(&samples),
        implicit_dependencies: implicit_dependencies(tasks),
        sample_count: samples.len(),
    }
}

// O = P10, M = median, P = P90 of actual durations; bias = mean(actual) /
// mean(planned). Fewer than MIN_SAMPLES_FOR_FIT samples fall back to the
// global prior.
fn fit_pert(samples: &[&HistoricalSample]) -> PertEstimate {
    if samples.len() < MIN_SAMPLES_FOR_FIT {
        return PertEstimate::global_prior();
    }
    let mut actuals: Vec<f64> = samples.iter().map(|s| s.actual_days).collect();
    actuals.sort_by(|a, b| a.total_cmp(b));

    let planned_sum: f64 = samples.iter().map(|s| s.planned_days).sum();
    let actual_sum: f64 = actuals.iter().sum();
    let bias_factor = if planned_sum > 0.0 {
        actual_sum / planned_sum
    } else {
        1.0
    };

    let optimistic = percentile(&actuals, 0.10);
    let most_likely = percentile(&actuals, 0.50);
    let pessimistic = percentile(&actuals, 0.90);
    PertEstimate {
        // enforce O <= M <= P even on skewed tiny samples
        optimistic: optimistic.min(most_likely),
        most_likely,
        pessimistic: pessimistic.max(most_likely),
        bias_factor,
        sample_count: samples.len(),
    }
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((sorted.len() as f64) * q) as usize;
    sorted[index.min(sorted.len() - 1)]
}

fn throughput(tasks: &[Task]) -> BTreeMap<String, ThroughputStats> {
    let mut durations: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for task in tasks {
        let Some(completed) = task.completed_date else {
            continue;
        };
        let days = days_between(task.created_at, completed);
        if days <= 0.0 {
            continue;
        }
        for assignee in &task.assignees {
            durations.entry(assignee.clone()).or_default().push(days);
        }
    }
    durations
        .into_iter()
        .map(|(assignee, days)| {
            let avg = days.iter().sum::<f64>() / days.len() as f64;
            (
                assignee,
                ThroughputStats {
                    tasks_completed: days.len(),
                    avg_duration_days: avg,
                    tasks_per_week: if avg > 0.0 { 7.0 / avg } else { 0.0 },
                },
            )
        })
        .collect()
}

fn response_latency(tasks: &[Task]) -> BTreeMap<String, LatencyStats> {
    let mut latencies: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for task in tasks {
        let Some(start) = task.start_date else {
            continue;
        };
        let days = days_between(task.created_at, start);
        if days < 0.0 {
            continue;
        }
        for assignee in &task.assignees {
            latencies.entry(assignee.clone()).or_default().push(days);
        }
    }
    latencies
        .into_iter()
        .map(|(assignee, mut days)| {
            days.sort_by(|a, b| a.total_cmp(b));
            let avg = days.iter().sum::<f64>() / days.len() as f64;
            (
                assignee,
                LatencyStats {
                    avg_latency_days: avg,
                    median_latency_days: days[days.len() / 2],
                    samples: days.len(),
                },
            )
        })
        .collect()
}

fn block_rates(
    tasks: &[Task],
    bucket_names: &HashMap<String, String>,
) -> BTreeMap<String, f64> {
    let mut blocked: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for task in tasks {
        let bucket = bucket_names
            .get(&task.bucket_id)
            .cloned()
            .unwrap_or_else(|| task.bucket_id.clone());
        let entry = blocked.entry(bucket).or_insert((0, 0));
        entry.1 += 1;
        if task.status == TaskStatus::Blocked {
            entry.0 += 1;
        }
    }
    blocked
        .into_iter()
        .map(|(bucket, (blocked, total))| (bucket, blocked as f64 / total.max(1) as f64))
        .collect()
}

fn phase_stats(samples: &[HistoricalSample]) -> BTreeMap<String, PhaseStats> {
    let mut grouped: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
    for sample in samples {
        grouped
            .entry(sample.bucket.clone())
            .or_default()
            .push((sample.planned_days, sample.actual_days));
    }
    grouped
        .into_iter()
        .map(|(bucket, pairs)| {
            let planned_sum: f64 = pairs.iter().map(|(p, _)| p).sum();
            let actual_sum: f64 = pairs.iter().map(|(_, a)| a).sum();
            let n = pairs.len() as f64;
            (
                bucket,
                PhaseStats {
                    avg_planned_days: planned_sum / n,
                    avg_actual_days: actual_sum / n,
                    bias_factor: if planned_sum > 0.0 {
                        actual_sum / planned_sum
                    } else {
                        1.0
                    },
                    sample_count: pairs.len(),
                },
            )
        })
        .collect()
}

// Pattern B follows pattern A when, within each plan, B's start is at or
// after A's completion; pairs above the consistency threshold are reported.
fn implicit_dependencies(tasks: &[Task]) -> Vec<ImplicitDependency> {
    let mut by_pattern: BTreeMap<String, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        by_pattern
            .entry(title_pattern(&task.title))
            .or_default()
            .push(task);
    }

    let mut deps = Vec::new();
    for (pattern_a, tasks_a) in &by_pattern {
        for (pattern_b, tasks_b) in &by_pattern {
            if pattern_a == pattern_b {
                continue;
            }
            let mut matches = 0usize;
            let mut total = 0usize;
            for a in tasks_a {
                let Some(completed_a) = a.completed_date else {
                    continue;
                };
                for b in tasks_b {
                    if a.plan_id != b.plan_id {
                        continue;
                    }
                    let Some(start_b) = b.start_date else {
                        continue;
                    };
                    total += 1;
                    if start_b >= completed_a {
                        matches += 1;
                    }
                }
            }
            if total > 0 {
                let confidence = matches as f64 / total as f64;
                if confidence > IMPLICIT_DEP_THRESHOLD {
                    deps.push(ImplicitDependency {
                        from_pattern: pattern_a.clone(),
                        to_pattern: pattern_b.clone(),
                        confidence,
                        occurrences: total,
                    });
                }
            }
        }
    }
    deps.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.from_pattern.cmp(&b.from_pattern))
            .then_with(|| a.to_pattern.cmp(&b.to_pattern))
    });
    deps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::task;
    use jiff::Timestamp;

    fn completed_task(
        id: &str,
        plan: &str,
        start: &str,
        due: &str,
        completed: &str,
        assignee: &str,
    ) -> Task {
        let mut t = task(id);
        t.plan_id = plan.into();
        t.status = TaskStatus::Completed;
        t.percent_complete = 100;
        t.start_date = Some(start.parse::<Timestamp>().unwrap());
        t.due_date = Some(due.parse::<Timestamp>().unwrap());
        t.completed_date = Some(completed.parse::<Timestamp>().unwrap());
        t.created_at = start.parse().unwrap();
        t.assignees = vec![assignee.into()];
        t
    }

    fn names() -> HashMap<String, String> {
        [("bucket-1".to_string(), "Registration".to_string())]
            .into_iter()
            .collect()
    }

    #[test]
    fn pert_fit_uses_percentiles() {
        // actual durations 1..=10 days, planned 5 days each
        let tasks: Vec<Task> = (1..=10)
            .map(|i| {
                completed_task(
                    &format!("t{i:02}"),
                    "hist-1",
                    "2025-01-01T00:00:00Z",
                    "2025-01-06T00:00:00Z",
                    &format!("2025-01-{:02}T00:00:00Z", 1 + i),
                    "alice",
                )
            })
            .collect();
        let insights = analyze(&tasks, &names());
        let pert = insights.pert_by_bucket.get("Registration").unwrap();
        assert_eq!(pert.optimistic, 2.0);
        assert_eq!(pert.most_likely, 6.0);
        assert_eq!(pert.pessimistic, 10.0);
        assert!((pert.bias_factor - 5.5 / 5.0).abs() < 1e-9);
        assert_eq!(pert.sample_count, 10);
    }

    #[test]
    fn too_few_samples_fall_back_to_prior() {
        let tasks = vec![completed_task(
            "t1",
            "hist-1",
            "2025-01-01T00:00:00Z",
            "2025-01-03T00:00:00Z",
            "2025-01-04T00:00:00Z",
            "alice",
        )];
        let insights = analyze(&tasks, &names());
        let pert = insights.pert_for_bucket("Registration");
        assert_eq!(pert.most_likely, 3.0);
        assert_eq!(pert.sample_count, 0);
    }

    #[test]
    fn throughput_counts_per_assignee() {
        let tasks = vec![
            completed_task(
                "t1",
                "hist-1",
                "2025-01-01T00:00:00Z",
                "2025-01-08T00:00:00Z",
                "2025-01-08T00:00:00Z",
                "alice",
            ),
            completed_task(
                "t2",
                "hist-1",
                "2025-02-01T00:00:00Z",
                "2025-02-08T00:00:00Z",
                "2025-02-08T00:00:00Z",
                "alice",
            ),
        ];
        let insights = analyze(&tasks, &names());
        let stats = insights.assignee_throughput.get("alice").unwrap();
        assert_eq!(stats.tasks_completed, 2);
        assert_eq!(stats.avg_duration_days, 7.0);
        assert!((stats.tasks_per_week - 1.0).abs() < 1e-9);
    }

    #[test]
    fn block_rate_counts_blocked_share() {
        let mut blocked = task("t1");
        blocked.status = TaskStatus::Blocked;
        let tasks = vec![blocked, task("t2"), task("t3"), task("t4")];
        let insights = analyze(&tasks, &names());
        assert_eq!(insights.block_rate_by_bucket["Registration"], 0.25);
    }

    #[test]
    fn implicit_dependency_requires_consistent_precedence() {
        let mut tasks = Vec::new();
        for (plan, month) in [("hist-1", 1), ("hist-2", 2), ("hist-3", 3)] {
            tasks.push(completed_task(
                "a",
                plan,
                &format!("2025-{month:02}-01T00:00:00Z"),
                &format!("2025-{month:02}-05T00:00:00Z"),
                &format!("2025-{month:02}-05T00:00:00Z"),
                "alice",
            ));
            let mut follow = completed_task(
                "b",
                plan,
                &format!("2025-{month:02}-06T00:00:00Z"),
                &format!("2025-{month:02}-09T00:00:00Z"),
                &format!("2025-{month:02}-09T00:00:00Z"),
                "bob",
            );
            follow.title = "Send invitations".into();
            tasks.push(follow);
        }
        // Titles: "Task a" precedes "Send invitations" in every plan.
        for t in tasks.iter_mut().filter(|t| t.task_id == "a") {
            t.title = "Book venue".into();
        }
        let insights = analyze(&tasks, &names());
        assert!(insights.implicit_dependencies.iter().any(|d| {
            d.from_pattern == "Book venue" && d.to_pattern == "Send invitations"
                && d.confidence == 1.0
        }));
    }

    #[test]
    fn insights_are_deterministic() {
        let tasks: Vec<Task> = (1..=5)
            .map(|i| {
                completed_task(
                    &format!("t{i}"),
                    "hist-1",
                    "2025-01-01T00:00:00Z",
                    "2025-01-04T00:00:00Z",
                    &format!("2025-01-{:02}T00:00:00Z", 3 + i),
                    "alice",
                )
            })
            .collect();
        let a = serde_json::to_string(&analyze(&tasks, &names())).unwrap();
        let b = serde_json::to_string(&analyze(&tasks, &names())).unwrap();
        assert_eq!(a, b);
    }
}

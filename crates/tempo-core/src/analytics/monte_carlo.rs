//! Monte Carlo schedule simulation.
//!
//! Samples task durations from bucket-calibrated Beta-PERT distributions,
//! walks the DAG in topological order with resource-contention queuing
//! delays, and aggregates plan-end percentiles, per-task critical-path
//! frequency, bucket variance and bottleneck rankings. Deterministic under a
//! fixed seed: the same seed and inputs reproduce bit-identical output.

use std::collections::{BTreeMap, HashMap};

use jiff::Timestamp;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::dates::{add_days, days_between};
use crate::error::{PlannerError, Result};
use crate::graph::TaskGraph;
use crate::models::{DependencyType, PertEstimate};
use crate::snapshot::PlanSnapshot;

use super::pert::BetaPert;

/// Queuing-delay coefficient: days of delay per unit of concurrent overload.
pub const QUEUING_DELAY_PER_OVERLOAD_DAYS: f64 = 0.25;

/// Cancellation is polled every this many iterations.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Simulation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of iterations (default 10,000)
    pub iterations: usize,
    /// RNG seed; omit for entropy seeding (then runs are not reproducible)
    pub seed: Option<u64>,
    /// Target event date; falls back to the plan's own event date
    pub event_date: Option<Timestamp>,
    /// Also report the p10/p90 band
    pub include_bands: bool,
    /// Queuing penalty in days per unit of concurrent assignee overload
    pub queuing_delay_days: f64,
    /// Cap for ranked lists (bottlenecks)
    pub max_listed: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            seed: None,
            event_date: None,
            include_bands: false,
            queuing_delay_days: QUEUING_DELAY_PER_OVERLOAD_DAYS,
            max_listed: 20,
        }
    }
}

/// Plan-end percentile dates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndDatePercentiles {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p10: Option<Timestamp>,
    pub p50: Timestamp,
    pub p75: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p90: Option<Timestamp>,
    pub p95: Timestamp,
}

/// A ranked bottleneck task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bottleneck {
    pub task_id: String,
    pub title: String,
    pub bucket: String,
    /// p90 - p10 spread of the task's simulated finish, in days
    pub spread_days: f64,
    pub cp_probability: f64,
}

/// Simulated finish percentiles for one task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TaskFinishPercentiles {
    pub p50: Timestamp,
    pub p95: Timestamp,
}

/// Aggregated simulation output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub plan_id: String,
    pub iterations: usize,
    /// Schedule origin the day offsets are anchored to
    pub origin: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_date: Option<Timestamp>,
    pub percentiles: EndDatePercentiles,
    /// Probability of finishing at or before the event date, 0-100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability_on_time_percent: Option<f64>,
    /// Empirical critical-path frequency per task, 0-1
    pub cp_probability: BTreeMap<String, f64>,
    pub bottlenecks: Vec<Bottleneck>,
    /// Sample variance of per-bucket duration sums across iterations, days²
    pub risk_heatmap: BTreeMap<String, f64>,
    /// Per-task simulated finish percentiles
    pub task_finish: BTreeMap<String, TaskFinishPercentiles>,
    pub diagnostics: Vec<String>,
}

// Per-task inputs resolved ahead of the iteration loop so the hot path only
// touches indexed vectors.
struct SimTask {
    id_index: usize,
    distribution: BetaPert,
    bias: f64,
    start_floor_days: f64,
    assignee_indices: Vec<usize>,
    predecessors: Vec<(usize, DependencyType)>,
    bucket_index: usize,
}

/// Runs the simulation. Fails with [`PlannerError::InsufficientCalibration`]
/// when a bucket lacks a PERT triple and `default_prior` is `None`, and with
/// [`PlannerError::Cancelled`] when the token fires.
pub fn run(
    snapshot: &PlanSnapshot,
    graph: &TaskGraph,
    pert_by_bucket: &HashMap<String, PertEstimate>,
    default_prior: Option<PertEstimate>,
    now: Timestamp,
    cancel: &CancelToken,
    config: &SimulationConfig,
) -> Result<SimulationReport> {
    let iterations = config.iterations.max(1);
    let event_date = config.event_date.or(snapshot.plan.event_date);
    log::debug!(
        "simulating plan {} over {} iterations (seed {:?})",
        snapshot.plan.plan_id,
        iterations,
        config.seed
    );

    // Anchor the schedule at the earliest known task start, else now.
    let origin = snapshot
        .tasks
        .iter()
        .filter_map(|t| t.start_date)
        .min()
        .unwrap_or(now)
        .min(now);

    let mut diagnostics: Vec<String> = graph
        .excluded_edges
        .iter()
        .map(|d| {
            format!(
                "excluded cyclic dependency {} -> {}",
                d.predecessor_id, d.successor_id
            )
        })
        .collect();

    // Resolve the per-task sampling inputs in topological order.
    let index_of: HashMap<&str, usize> = graph
        .topo_order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut bucket_names: Vec<String> = Vec::new();
    let mut assignee_ids: Vec<String> = Vec::new();
    let mut sim_tasks: Vec<SimTask> = Vec::with_capacity(graph.topo_order.len());

    for (position, task_id) in graph.topo_order.iter().enumerate() {
        let task = snapshot
            .task(task_id)
            .ok_or_else(|| PlannerError::task_not_found(&snapshot.plan.plan_id, task_id))?;
        let bucket = snapshot.bucket_name(&task.bucket_id).to_string();

        let estimate = match pert_by_bucket.get(&bucket) {
            Some(estimate) if estimate.sample_count > 0 => *estimate,
            _ => default_prior.ok_or_else(|| PlannerError::InsufficientCalibration {
                bucket: bucket.clone(),
            })?,
        };

        let bucket_index = match bucket_names.iter().position(|b| b == &bucket) {
            Some(i) => i,
            None => {
                bucket_names.push(bucket.clone());
                bucket_names.len() - 1
            }
        };

        let assignee_indices = task
            .assignees
            .iter()
            .map(|a| match assignee_ids.iter().position(|known| known == a) {
                Some(i) => i,
                None => {
                    assignee_ids.push(a.clone());
                    assignee_ids.len() - 1
                }
            })
            .collect();

        let predecessors = graph
            .predecessors(task_id)
            .iter()
            .filter_map(|pred| {
                index_of
                    .get(pred.as_str())
                    .map(|&i| (i, graph.edge_type(pred, task_id)))
            })
            .collect();

        sim_tasks.push(SimTask {
            id_index: position,
            distribution: BetaPert::new(
                estimate.optimistic,
                estimate.most_likely,
                estimate.pessimistic,
            ),
            bias: if estimate.bias_factor > 0.0 {
                estimate.bias_factor
            } else {
                1.0
            },
            start_floor_days: task
                .start_date
                .map(|s| days_between(origin, s).max(0.0))
                .unwrap_or(0.0),
            assignee_indices,
            predecessors,
            bucket_index,
        });
    }

    let task_count = sim_tasks.len();
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut end_offsets: Vec<f64> = Vec::with_capacity(iterations);
    let mut cp_counts: Vec<u64> = vec![0; task_count];
    let mut finish_samples: Vec<Vec<f64>> = vec![Vec::with_capacity(iterations); task_count];
    let mut bucket_sums: Vec<Vec<f64>> = vec![Vec::with_capacity(iterations); bucket_names.len()];

    // Scratch buffers reused across iterations.
    let mut starts = vec![0.0_f64; task_count];
    let mut finishes = vec![0.0_f64; task_count];
    let mut binding_pred: Vec<Option<usize>> = vec![None; task_count];
    let mut on_cp = vec![false; task_count];
    let mut intervals_per_assignee: Vec<Vec<(f64, f64)>> =
        vec![Vec::new(); assignee_ids.len()];
    let mut iteration_bucket_sum = vec![0.0_f64; bucket_names.len()];
    let mut tied: Vec<usize> = Vec::new();

    for iteration in 0..iterations {
        if iteration % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(PlannerError::Cancelled);
        }

        for list in &mut intervals_per_assignee {
            list.clear();
        }
        iteration_bucket_sum.iter_mut().for_each(|v| *v = 0.0);

        for (position, sim_task) in sim_tasks.iter().enumerate() {
            let duration = sim_task.distribution.sample(&mut rng) * sim_task.bias;

            let mut start = sim_task.start_floor_days;
            let mut best: Option<usize> = None;
            tied.clear();
            for &(pred, edge_type) in &sim_task.predecessors {
                let bound = match edge_type {
                    DependencyType::FinishToStart | DependencyType::StartToFinish => {
                        finishes[pred]
                    }
                    DependencyType::StartToStart => starts[pred],
                    DependencyType::FinishToFinish => finishes[pred] - duration,
                };
                if bound > start + 1e-12 {
                    start = bound;
                    best = Some(pred);
                    tied.clear();
                    tied.push(pred);
                } else if best.is_some() && (bound - start).abs() <= 1e-12 {
                    tied.push(pred);
                }
            }
            // Ties between equally binding predecessors are broken at
            // random so symmetric branches split the CP frequency.
            if tied.len() > 1 {
                best = Some(tied[rng.gen_range(0..tied.len())]);
            }

            // M/M/1-style contention penalty: overlapping in-progress tasks
            // sharing any assignee at this task's start.
            let mut concurrent = 0usize;
            for &assignee in &sim_task.assignee_indices {
                let overlapping = intervals_per_assignee[assignee]
                    .iter()
                    .filter(|(s, f)| *s <= start && start < *f)
                    .count();
                concurrent = concurrent.max(overlapping);
            }
            let delay = config.queuing_delay_days * concurrent as f64;

            let finish = start + duration + delay;
            starts[position] = start;
            finishes[position] = finish;
            binding_pred[position] = best;
            for &assignee in &sim_task.assignee_indices {
                intervals_per_assignee[assignee].push((start, finish));
            }
            iteration_bucket_sum[sim_task.bucket_index] += duration + delay;
            finish_samples[position].push(finish);
        }

        // Plan end and the simulated critical path for this run.
        let mut end_index = 0usize;
        let mut end_offset = 0.0_f64;
        for position in 0..task_count {
            if finishes[position] > end_offset {
                end_offset = finishes[position];
                end_index = position;
            }
        }
        end_offsets.push(end_offset);

        on_cp.iter_mut().for_each(|v| *v = false);
        if task_count > 0 {
            let mut cursor = end_index;
            loop {
                on_cp[cursor] = true;
                match binding_pred[cursor] {
                    Some(pred) => cursor = pred,
                    None => break,
                }
            }
        }
        for position in 0..task_count {
            if on_cp[position] {
                cp_counts[position] += 1;
            }
        }
        for (bucket, sum) in iteration_bucket_sum.iter().enumerate() {
            bucket_sums[bucket].push(*sum);
        }
    }

    // Aggregation.
    let mut sorted_ends = end_offsets.clone();
    sorted_ends.sort_by(|a, b| a.total_cmp(b));
    let pct = |q: f64| -> Timestamp {
        add_days(origin, percentile(&sorted_ends, q))
    };

    let probability_on_time_percent = event_date.map(|event| {
        let horizon = days_between(origin, event);
        let on_time = sorted_ends.iter().filter(|end| **end <= horizon).count();
        on_time as f64 / sorted_ends.len() as f64 * 100.0
    });

    let mut cp_probability = BTreeMap::new();
    let mut task_finish = BTreeMap::new();
    let mut bottlenecks = Vec::with_capacity(task_count);
    for (position, sim_task) in sim_tasks.iter().enumerate() {
        let task_id = &graph.topo_order[sim_task.id_index];
        let probability = cp_counts[position] as f64 / iterations as f64;
        cp_probability.insert(task_id.clone(), probability);

        let samples = &mut finish_samples[position];
        samples.sort_by(|a, b| a.total_cmp(b));
        task_finish.insert(
            task_id.clone(),
            TaskFinishPercentiles {
                p50: add_days(origin, percentile(samples, 0.50)),
                p95: add_days(origin, percentile(samples, 0.95)),
            },
        );

        let title = snapshot
            .task(task_id)
            .map(|t| t.title.clone())
            .unwrap_or_default();
        bottlenecks.push(Bottleneck {
            task_id: task_id.clone(),
            title,
            bucket: bucket_names[sim_task.bucket_index].clone(),
            spread_days: percentile(samples, 0.90) - percentile(samples, 0.10),
            cp_probability: probability,
        });
    }
    bottlenecks.sort_by(|a, b| {
        b.spread_days
            .total_cmp(&a.spread_days)
            .then_with(|| a.task_id.cmp(&b.task_id))
    });
    bottlenecks.truncate(config.max_listed);

    let risk_heatmap = bucket_names
        .iter()
        .enumerate()
        .map(|(i, bucket)| (bucket.clone(), sample_variance(&bucket_sums[i])))
        .collect();

    if task_count == 0 {
        diagnostics.push("plan has no tasks; end dates collapse to the origin".to_string());
    }

    Ok(SimulationReport {
        plan_id: snapshot.plan.plan_id.clone(),
        iterations,
        origin,
        event_date,
        percentiles: EndDatePercentiles {
            p10: config.include_bands.then(|| pct(0.10)),
            p50: pct(0.50),
            p75: pct(0.75),
            p90: config.include_bands.then(|| pct(0.90)),
            p95: pct(0.95),
        },
        probability_on_time_percent,
        cp_probability,
        bottlenecks,
        risk_heatmap,
        task_finish,
        diagnostics,
    })
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((sorted.len() as f64) * q) as usize;
    sorted[index.min(sorted.len() - 1)]
}

fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bucket, PertEstimate};
    use crate::testutil::{dep, now_fixture, snapshot, task};

    fn estimate(o: f64, m: f64, p: f64) -> PertEstimate {
        PertEstimate {
            optimistic: o,
            most_likely: m,
            pessimistic: p,
            bias_factor: 1.0,
            sample_count: 10,
        }
    }

    fn chain_snapshot() -> (crate::snapshot::PlanSnapshot, HashMap<String, PertEstimate>) {
        // S1 shape: T1 -> T2 -> T3 with PERT (1,2,3), (1,3,5), (2,4,6).
        let mut snap = snapshot(
            vec![task("t1"), task("t2"), task("t3")],
            vec![dep("t1", "t2"), dep("t2", "t3")],
        );
        snap.buckets = vec![
            Bucket { bucket_id: "b1".into(), name: "B1".into(), order_hint: String::new() },
            Bucket { bucket_id: "b2".into(), name: "B2".into(), order_hint: String::new() },
            Bucket { bucket_id: "b3".into(), name: "B3".into(), order_hint: String::new() },
        ];
        snap.tasks[0].bucket_id = "b1".into();
        snap.tasks[1].bucket_id = "b2".into();
        snap.tasks[2].bucket_id = "b3".into();
        let pert = [
            ("B1".to_string(), estimate(1.0, 2.0, 3.0)),
            ("B2".to_string(), estimate(1.0, 3.0, 5.0)),
            ("B3".to_string(), estimate(2.0, 4.0, 6.0)),
        ]
        .into_iter()
        .collect();
        (snap, pert)
    }

    #[test]
    fn linear_chain_percentiles_and_cp() {
        let (snap, pert) = chain_snapshot();
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let config = SimulationConfig {
            iterations: 10_000,
            seed: Some(42),
            ..Default::default()
        };
        let report = run(
            &snap,
            &graph,
            &pert,
            None,
            now_fixture(),
            &CancelToken::new(),
            &config,
        )
        .unwrap();

        let p50_days = days_between(report.origin, report.percentiles.p50);
        assert!(
            (p50_days - 9.0).abs() <= 0.2,
            "p50 {p50_days} not within 9.0 +/- 0.2"
        );
        assert_eq!(report.cp_probability["t2"], 1.0);
        assert_eq!(report.cp_probability["t1"], 1.0);
    }

    #[test]
    fn diamond_splits_cp_frequency() {
        // S2 shape: equal deterministic durations; the tie between branches
        // is broken at random, so each middle task lands near 0.5.
        let mut snap = snapshot(
            vec![task("t1"), task("t2"), task("t3"), task("t4")],
            vec![
                dep("t1", "t2"),
                dep("t1", "t3"),
                dep("t2", "t4"),
                dep("t3", "t4"),
            ],
        );
        snap.buckets[0].name = "All".into();
        for t in &mut snap.tasks {
            t.bucket_id = "bucket-1".into();
        }
        let pert: HashMap<String, PertEstimate> =
            [("All".to_string(), estimate(2.0, 2.0, 2.0))].into_iter().collect();
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let config = SimulationConfig {
            iterations: 10_000,
            seed: Some(42),
            ..Default::default()
        };
        let report = run(
            &snap,
            &graph,
            &pert,
            None,
            now_fixture(),
            &CancelToken::new(),
            &config,
        )
        .unwrap();

        let p2 = report.cp_probability["t2"];
        let p3 = report.cp_probability["t3"];
        assert!((p2 - 0.5).abs() <= 0.02, "t2 cp probability {p2}");
        assert!((p3 - 0.5).abs() <= 0.02, "t3 cp probability {p3}");
        assert_eq!(report.cp_probability["t1"], 1.0);
        assert_eq!(report.cp_probability["t4"], 1.0);
    }

    #[test]
    fn single_task_has_cp_probability_one() {
        let snap = snapshot(vec![task("only")], vec![]);
        let pert: HashMap<String, PertEstimate> =
            [("Registration".to_string(), estimate(1.0, 2.0, 4.0))]
                .into_iter()
                .collect();
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let config = SimulationConfig {
            iterations: 500,
            seed: Some(1),
            ..Default::default()
        };
        let report = run(
            &snap,
            &graph,
            &pert,
            None,
            now_fixture(),
            &CancelToken::new(),
            &config,
        )
        .unwrap();
        assert_eq!(report.cp_probability["only"], 1.0);
    }

    #[test]
    fn deterministic_under_seed() {
        let (snap, pert) = chain_snapshot();
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let run_with = |seed| {
            let config = SimulationConfig {
                iterations: 512,
                seed: Some(seed),
                include_bands: true,
                ..Default::default()
            };
            serde_json::to_string(
                &run(
                    &snap,
                    &graph,
                    &pert,
                    None,
                    now_fixture(),
                    &CancelToken::new(),
                    &config,
                )
                .unwrap(),
            )
            .unwrap()
        };
        assert_eq!(run_with(7), run_with(7));
        assert_ne!(run_with(7), run_with(8));
    }

    #[test]
    fn missing_calibration_fails_without_prior() {
        let snap = snapshot(vec![task("t1")], vec![]);
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let config = SimulationConfig {
            iterations: 10,
            seed: Some(1),
            ..Default::default()
        };
        let err = run(
            &snap,
            &graph,
            &HashMap::new(),
            None,
            now_fixture(),
            &CancelToken::new(),
            &config,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PlannerError::InsufficientCalibration { bucket } if bucket == "Registration"
        ));

        // With the global prior the run succeeds.
        assert!(run(
            &snap,
            &graph,
            &HashMap::new(),
            Some(PertEstimate::global_prior()),
            now_fixture(),
            &CancelToken::new(),
            &config,
        )
        .is_ok());
    }

    #[test]
    fn cancellation_stops_the_run() {
        let (snap, pert) = chain_snapshot();
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let config = SimulationConfig {
            iterations: 10_000,
            seed: Some(42),
            ..Default::default()
        };
        let err = run(&snap, &graph, &pert, None, now_fixture(), &cancel, &config).unwrap_err();
        assert!(matches!(err, PlannerError::Cancelled));
    }

    #[test]
    fn on_time_probability_against_event_date() {
        let (snap, pert) = chain_snapshot();
        let graph = TaskGraph::build(&snap.tasks, &snap.dependencies).unwrap();
        // 30 days out: essentially certain; 1 day out: essentially impossible.
        let run_for = |days: f64| {
            let config = SimulationConfig {
                iterations: 2_000,
                seed: Some(3),
                event_date: Some(add_days(now_fixture(), days)),
                ..Default::default()
            };
            run(
                &snap,
                &graph,
                &pert,
                None,
                now_fixture(),
                &CancelToken::new(),
                &config,
            )
            .unwrap()
            .probability_on_time_percent
            .unwrap()
        };
        assert_eq!(run_for(30.0), 100.0);
        assert_eq!(run_for(1.0), 0.0);
    }
}

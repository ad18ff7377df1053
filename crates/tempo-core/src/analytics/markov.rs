//! Markov state-transition analysis of task lifecycles.
//!
//! Task statuses form the chain's state space, with `Completed` and
//! `Cancelled` absorbing. Matrices are learned from historical task
//! lifecycles replayed at a uniform step size, Laplace-smoothed, and used to
//! compute the expected time to absorption via the fundamental matrix
//! N = (I - Q)^-1.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dates::days_between;
use crate::models::{Task, TaskStatus};

use super::linalg;

/// Laplace smoothing mass added to transitions out of non-absorbing states.
pub const LAPLACE_EPSILON: f64 = 0.01;

/// Default uniform step size between observed states, in days.
pub const DEFAULT_STEP_DAYS: f64 = 1.0;

/// Outgoing probabilities from a non-absorbing state must sum to one within
/// this tolerance.
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

const STATE_COUNT: usize = TaskStatus::ALL.len();
const TRANSIENT_COUNT: usize = 4; // NotStarted, InProgress, Blocked, UnderReview

/// Maps a task to its Markov state from status, percent complete and the
/// presence of an incomplete upstream dependency.
pub fn detect_state(task: &Task, has_incomplete_upstream: bool) -> TaskStatus {
    if task.status == TaskStatus::Completed || task.percent_complete >= 100 {
        return TaskStatus::Completed;
    }
    match task.status {
        TaskStatus::Cancelled => TaskStatus::Cancelled,
        TaskStatus::Blocked => TaskStatus::Blocked,
        TaskStatus::UnderReview => TaskStatus::UnderReview,
        _ if has_incomplete_upstream && task.percent_complete < 100 => TaskStatus::Blocked,
        _ if task.percent_complete > 0 || task.status == TaskStatus::InProgress => {
            TaskStatus::InProgress
        }
        _ => TaskStatus::NotStarted,
    }
}

/// A dense transition matrix for one calibration context (e.g. a bucket).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransitionMatrix {
    /// Context key, e.g. `bucket:Registration` or `plan`
    pub context: String,
    /// Uniform step size the probabilities are calibrated at, in days
    pub step_days: f64,
    /// Row-major probabilities in [`TaskStatus::ALL`] order
    pub probs: Vec<Vec<f64>>,
}

/// Expected time to absorption per transient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsorptionAnalysis {
    /// Expected days to reach `Completed` or `Cancelled`, keyed by state.
    /// NaN when the fundamental matrix is near-singular.
    pub expected_days: BTreeMap<String, f64>,
    /// Variance of the absorption time in days², keyed by state
    pub variance_days2: BTreeMap<String, f64>,
    pub diagnostics: Vec<String>,
}

impl TransitionMatrix {
    /// The fallback matrix used when a context has no learnable history.
    pub fn default_for(context: &str, step_days: f64) -> Self {
        let mut probs = vec![vec![0.0; STATE_COUNT]; STATE_COUNT];
        let idx = state_index;
        probs[idx(TaskStatus::NotStarted)][idx(TaskStatus::NotStarted)] = 0.3;
        probs[idx(TaskStatus::NotStarted)][idx(TaskStatus::InProgress)] = 0.7;
        probs[idx(TaskStatus::InProgress)][idx(TaskStatus::InProgress)] = 0.45;
        probs[idx(TaskStatus::InProgress)][idx(TaskStatus::Blocked)] = 0.15;
        probs[idx(TaskStatus::InProgress)][idx(TaskStatus::UnderReview)] = 0.4;
        probs[idx(TaskStatus::Blocked)][idx(TaskStatus::InProgress)] = 0.6;
        probs[idx(TaskStatus::Blocked)][idx(TaskStatus::Blocked)] = 0.4;
        probs[idx(TaskStatus::UnderReview)][idx(TaskStatus::InProgress)] = 0.3;
        probs[idx(TaskStatus::UnderReview)][idx(TaskStatus::Completed)] = 0.7;
        probs[idx(TaskStatus::Completed)][idx(TaskStatus::Completed)] = 1.0;
        probs[idx(TaskStatus::Cancelled)][idx(TaskStatus::Cancelled)] = 1.0;
        Self {
            context: context.to_string(),
            step_days,
            probs,
        }
    }

    /// Learns a matrix from historical task lifecycles.
    ///
    /// Each task's audit-less lifecycle is replayed as a daily state
    /// sequence (created → started → terminal), transition counts are
    /// accumulated, Laplace-smoothed with [`LAPLACE_EPSILON`] and
    /// normalized. Rows with no observations fall back to the default
    /// matrix row.
    pub fn learn(context: &str, tasks: &[Task], step_days: f64) -> Self {
        let step = if step_days > 0.0 {
            step_days
        } else {
            DEFAULT_STEP_DAYS
        };
        let mut counts = vec![vec![0.0_f64; STATE_COUNT]; STATE_COUNT];
        for task in tasks {
            let path = lifecycle_path(task, step);
            for pair in path.windows(2) {
                counts[state_index(pair[0])][state_index(pair[1])] += 1.0;
            }
        }

        let fallback = Self::default_for(context, step);
        let mut probs = vec![vec![0.0; STATE_COUNT]; STATE_COUNT];
        for (i, state) in TaskStatus::ALL.iter().enumerate() {
            if state.is_terminal() {
                probs[i][i] = 1.0;
                continue;
            }
            let observed: f64 = counts[i].iter().sum();
            if observed == 0.0 {
                probs[i].clone_from(&fallback.probs[i]);
                continue;
            }
            // Laplace smoothing over the non-terminal-source row keeps the
            // chain ergodic on transient states.
            let smoothed_total = observed + LAPLACE_EPSILON * STATE_COUNT as f64;
            for j in 0..STATE_COUNT {
                probs[i][j] = (counts[i][j] + LAPLACE_EPSILON) / smoothed_total;
            }
        }

        Self {
            context: context.to_string(),
            step_days: step,
            probs,
        }
    }

    /// Checks the stochastic-row invariant: every non-absorbing row sums to
    /// 1 within [`ROW_SUM_TOLERANCE`].
    pub fn is_stochastic(&self) -> bool {
        self.probs
            .iter()
            .all(|row| (row.iter().sum::<f64>() - 1.0).abs() <= ROW_SUM_TOLERANCE)
    }

    /// Probability of one transition.
    pub fn probability(&self, from: TaskStatus, to: TaskStatus) -> f64 {
        self.probs[state_index(from)][state_index(to)]
    }

    /// Expected time to absorption for every transient state, via the
    /// fundamental matrix N = (I - Q)^-1 with t = N·1 and variance
    /// (2N - I)t - t∘t. Near-singular (I - Q) yields NaN plus a diagnostic.
    pub fn expected_absorption(&self) -> AbsorptionAnalysis {
        let mut i_minus_q = vec![vec![0.0; TRANSIENT_COUNT]; TRANSIENT_COUNT];
        for row in 0..TRANSIENT_COUNT {
            for col in 0..TRANSIENT_COUNT {
                let identity = f64::from(u8::from(row == col));
                i_minus_q[row][col] = identity - self.probs[row][col];
            }
        }

        let mut diagnostics = Vec::new();
        let transient_names = || {
            TaskStatus::ALL[..TRANSIENT_COUNT]
                .iter()
                .map(|s| s.as_str().to_string())
        };

        let Some(fundamental) = linalg::invert(&i_minus_q) else {
            diagnostics.push(format!(
                "(I - Q) is near-singular for context '{}'; expected times are undefined",
                self.context
            ));
            return AbsorptionAnalysis {
                expected_days: transient_names().map(|name| (name, f64::NAN)).collect(),
                variance_days2: transient_names().map(|name| (name, f64::NAN)).collect(),
                diagnostics,
            };
        };

        // t = N·1 (expected steps); variance = (2N - I)t - t∘t, both in
        // step units, scaled to days by the calibration step size.
        let steps: Vec<f64> = fundamental.iter().map(|row| row.iter().sum()).collect();
        let mut two_n_minus_i = fundamental.clone();
        for row in 0..TRANSIENT_COUNT {
            for col in 0..TRANSIENT_COUNT {
                two_n_minus_i[row][col] =
                    2.0 * fundamental[row][col] - f64::from(u8::from(row == col));
            }
        }
        let variance_steps: Vec<f64> = linalg::mat_vec(&two_n_minus_i, &steps)
            .iter()
            .zip(&steps)
            .map(|(v, t)| v - t * t)
            .collect();

        let expected_days = transient_names()
            .zip(steps.iter().map(|t| t * self.step_days))
            .collect();
        let variance_days2 = transient_names()
            .zip(
                variance_steps
                    .iter()
                    .map(|v| v * self.step_days * self.step_days),
            )
            .collect();

        AbsorptionAnalysis {
            expected_days,
            variance_days2,
            diagnostics,
        }
    }
}

fn state_index(state: TaskStatus) -> usize {
    TaskStatus::ALL
        .iter()
        .position(|s| *s == state)
        .unwrap_or(0)
}

// Replays a task's lifecycle as a state-per-step sequence. Without an audit
// log the sequence is inferred from the date fields: created -> start as
// NotStarted, start -> completion as InProgress, with blocked and in-review
// detours injected from the terminal status.
fn lifecycle_path(task: &Task, step_days: f64) -> Vec<TaskStatus> {
    let steps_between = |from, to| -> usize {
        ((days_between(from, to) / step_days).round() as i64).clamp(0, 365) as usize
    };

    let mut path = Vec::new();
    let started = task.start_date.unwrap_or(task.created_at);
    path.extend(std::iter::repeat_n(
        TaskStatus::NotStarted,
        steps_between(task.created_at, started).max(1),
    ));

    match task.status {
        TaskStatus::Completed => {
            let completed = task.completed_date.unwrap_or(started);
            path.extend(std::iter::repeat_n(
                TaskStatus::InProgress,
                steps_between(started, completed).max(1),
            ));
            path.push(TaskStatus::UnderReview);
            path.push(TaskStatus::Completed);
        }
        TaskStatus::Cancelled => {
            path.push(TaskStatus::InProgress);
            path.push(TaskStatus::Cancelled);
        }
        TaskStatus::Blocked => {
            path.push(TaskStatus::InProgress);
            let overdue_steps = match task.due_date {
                Some(due) => steps_between(due, task.last_modified_at).max(1),
                None => 1,
            };
            path.extend(std::iter::repeat_n(TaskStatus::Blocked, overdue_steps));
            path.push(TaskStatus::InProgress);
        }
        TaskStatus::UnderReview => {
            path.push(TaskStatus::InProgress);
            path.push(TaskStatus::UnderReview);
        }
        TaskStatus::InProgress => {
            let reference = task.last_modified_at.max(started);
            path.extend(std::iter::repeat_n(
                TaskStatus::InProgress,
                steps_between(started, reference).max(1),
            ));
        }
        TaskStatus::NotStarted => {}
    }
    path
}

//! Historical calibration models.

use serde::{Deserialize, Serialize};

use super::TaskStatus;

/// One completed task from a past plan, as consumed by the historical
/// analyzer. Derived from task rows at load time; never stored separately.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricalSample {
    /// Source plan
    pub plan_id: String,

    /// Bucket name the task belonged to
    pub bucket: String,

    /// First three words of the title, used for implicit-dependency mining
    pub title_pattern: String,

    /// due - start, in days
    pub planned_days: f64,

    /// completed - start, in days
    pub actual_days: f64,

    /// Users the task was assigned to
    pub assignees: Vec<String>,

    /// Terminal state the task reached
    pub terminal_state: TaskStatus,

    /// Observed block occurrences
    pub block_count: u32,
}

/// PERT duration triple in days, with the multiplicative bias factor
/// observed against the plan of record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PertEstimate {
    /// 10th percentile of actual durations
    pub optimistic: f64,

    /// Median of actual durations
    pub most_likely: f64,

    /// 90th percentile of actual durations
    pub pessimistic: f64,

    /// mean(actual) / mean(planned)
    pub bias_factor: f64,

    /// Number of samples the estimate rests on
    pub sample_count: usize,
}

impl PertEstimate {
    /// The global fallback prior: a triangular (1, 3, 7)-day estimate with no
    /// bias. Used whenever a bucket has fewer than three samples.
    pub fn global_prior() -> Self {
        Self {
            optimistic: 1.0,
            most_likely: 3.0,
            pessimistic: 7.0,
            bias_factor: 1.0,
            sample_count: 0,
        }
    }
}

//! Plan and bucket model definitions.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Represents an event program plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Stable identifier for the plan
    pub plan_id: String,

    /// Display name of the plan
    pub name: String,

    /// Target event date (e.g. the congress opening day)
    pub event_date: Option<Timestamp>,

    /// Plan this one was cloned from, when created via template cloning
    pub source_plan_id: Option<String>,

    /// Timestamp when the plan was created (UTC)
    pub created_at: Timestamp,

    /// Timestamp when the plan was last modified (UTC)
    pub updated_at: Timestamp,
}

/// A workstream/phase grouping of tasks within a plan.
///
/// Buckets are the categorical dimension of the analytics: PERT calibration,
/// block rates and the variance heatmap are all keyed by bucket name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bucket {
    /// Identifier unique within the plan
    pub bucket_id: String,

    /// Display name
    pub name: String,

    /// Lexicographic ordering hint
    #[serde(default)]
    pub order_hint: String,
}

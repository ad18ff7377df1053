//! Dependency edge model definition.

use serde::{Deserialize, Serialize};

use super::DependencyType;

/// A directed dependency edge between two tasks of the same plan.
///
/// The edge set per plan must form a DAG; this is enforced on every
/// dependency mutation and repaired (edge excluded, reported in diagnostics)
/// on analytical loads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Dependency {
    /// ID of the owning plan
    pub plan_id: String,

    /// Task that must progress first
    pub predecessor_id: String,

    /// Task constrained by the predecessor
    pub successor_id: String,

    /// Scheduling semantics of the edge
    #[serde(default)]
    pub dep_type: DependencyType,
}

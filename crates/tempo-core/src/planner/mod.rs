//! High-level planner API.
//!
//! [`Planner`] is the central coordinator between interface layers and the
//! database, implementing the request-level operations: plan/task/subtask/
//! dependency mutations, locks, the external-event workflow, and the
//! analytical queries (critical path, attention, simulation, Markov,
//! impact, intelligence, cost).
//!
//! Each request runs as its own blocking task over a fresh connection, so
//! concurrent requests are independent units of execution; the lock table
//! is the only shared mutable state between them.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task;

use crate::cache::AnalysisCache;
use crate::db::Database;
use crate::error::{PlannerError, Result};

pub mod analysis_ops;
pub mod builder;
pub mod dependency_ops;
pub mod event_ops;
pub mod lock_ops;
pub mod plan_ops;
pub mod task_ops;

#[cfg(test)]
mod tests;

pub use builder::PlannerBuilder;

/// Main planner interface.
#[derive(Clone)]
pub struct Planner {
    pub(crate) db_path: PathBuf,
    pub(crate) cache: Arc<AnalysisCache>,
}

impl Planner {
    /// Creates a new planner with the specified database path.
    pub(crate) fn new(db_path: PathBuf) -> Self {
        Self {
            db_path,
            cache: Arc::new(AnalysisCache::new()),
        }
    }

    // Runs a closure against a fresh database connection on the blocking
    // pool. All planner operations funnel through here.
    pub(crate) async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            f(&mut db)
        })
        .await
        .map_err(|e| PlannerError::Configuration {
            message: format!("Task join error: {e}"),
        })?
    }

    /// Drops memoized analytical results for a plan. Called after every
    /// successful mutation.
    pub(crate) fn invalidate(&self, plan_id: &str) {
        self.cache.invalidate_plan(plan_id);
    }
}

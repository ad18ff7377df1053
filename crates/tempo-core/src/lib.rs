//! Core library for the Tempo event-program planner.
//!
//! Tempo turns a task graph into quantitative scheduling guidance: a
//! dependency and critical-path engine, a Monte Carlo schedule simulator
//! calibrated from historical plans, a Markov state-transition analyzer, a
//! task-intelligence aggregator, an impact analyzer for what-if previews,
//! and an external-event workflow with human-in-the-loop approval and
//! advisory task locking.
//!
//! # Architecture
//!
//! ```text
//! Interface → Handlers → Planner → Database (SQLite)
//!                          │
//!                          └─ PlanSnapshot → graph / analytics (pure)
//! ```
//!
//! - **Persistence** ([`db`]): rusqlite-backed repository; every mutation
//!   runs in one transaction and enforces the model invariants centrally.
//! - **Snapshots** ([`snapshot`]): analytical computations are pure
//!   functions of a snapshot loaded at entry, keeping the engines
//!   independent of the storage backend.
//! - **Analytics** ([`graph`], [`analytics`]): Kahn topological ordering,
//!   forward/backward critical-path passes, Beta-PERT sampling with
//!   resource-contention penalties, absorbing-chain fundamental matrices.
//! - **Workflow** ([`workflow`]): table-driven rules derive proposed
//!   actions from external events; approval applies the mutation in the
//!   same transaction as the decision.
//! - **Concurrency**: each request runs as an independent blocking task;
//!   the lock table is the only shared mutable state. Long computations
//!   poll a [`cancel::CancelToken`] and memoized results are keyed by the
//!   plan's content [`fingerprint`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tempo_core::{params::CreatePlan, PlannerBuilder};
//!
//! # async fn example() -> tempo_core::Result<()> {
//! let planner = PlannerBuilder::new()
//!     .with_database_path("tempo.db")
//!     .build()
//!     .await?;
//! let plan = planner
//!     .create_plan(&CreatePlan {
//!         plan_id: "congress-2027".into(),
//!         name: Some("Congress 2027".into()),
//!         event_date: Some("2027-03-15T00:00:00Z".into()),
//!     })
//!     .await?;
//! println!("created {}", plan.plan_id);
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod cache;
pub mod cancel;
pub mod dates;
pub mod db;
pub mod display;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod handlers;
pub mod models;
pub mod order_hint;
pub mod params;
pub mod planner;
pub mod snapshot;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use db::Database;
pub use display::{
    format_actions, format_attention, format_cost, format_critical_path, format_events,
    format_impact, format_intelligence, format_markov, format_plan_list, format_simulation,
    format_task_list,
};
pub use error::{PlannerError, Result};
pub use handlers::*;
pub use models::{
    ActionStatus, Bucket, Dependency, DependencyType, ExternalEvent, Plan, ProposedAction,
    Severity, Subtask, Task, TaskLock, TaskStatus, UpdateSubtaskRequest, UpdateTaskRequest,
};
pub use planner::{Planner, PlannerBuilder};
pub use snapshot::PlanSnapshot;

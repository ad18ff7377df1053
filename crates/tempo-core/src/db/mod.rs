//! SQLite persistence for plans, tasks, dependencies, locks, events and
//! proposed actions.
//!
//! The database layer is organized into specialized modules:
//!
//! - [`migrations`]: schema initialization
//! - [`plan_queries`]: plan and bucket operations, snapshot loads, cloning
//! - [`task_queries`]: task CRUD with central invariant enforcement
//! - [`subtask_queries`]: checklist items
//! - [`dependency_queries`]: dependency edges with cycle pre-checks
//! - [`lock_queries`]: advisory task locks with lazy expiry
//! - [`event_queries`]: external events and proposed actions
//! - [`sync_queries`]: per-plan sync state and fingerprint dirty tracking
//! - [`utils`]: row-mapping helpers
//!
//! Every mutation runs in one transaction; the domain invariants of the
//! data model (status/percent/completion coupling, date ordering, DAG-ness
//! of the dependency set) are enforced here on the write path, so callers
//! above this layer can trust loaded data. Analytical code never queries
//! the database directly; it consumes [`crate::snapshot::PlanSnapshot`]
//! values loaded in a single read transaction.

use std::path::Path;

use rusqlite::Connection;

use crate::error::{DatabaseResultExt, Result};

pub mod dependency_queries;
pub mod event_queries;
pub mod lock_queries;
pub mod migrations;
pub mod plan_queries;
pub mod subtask_queries;
pub mod sync_queries;
pub mod task_queries;
pub mod utils;

/// Database connection and operations handler.
pub struct Database {
    connection: Connection,
}

impl Database {
    /// Creates a new database connection and initializes the schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open(path).db_context("Failed to open database connection")?;
        let db = Self { connection };
        db.initialize_schema()?;
        Ok(db)
    }
}

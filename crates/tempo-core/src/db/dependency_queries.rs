//! Dependency edge operations with cycle pre-checks.

use jiff::Timestamp;
use rusqlite::{params, Connection};

use crate::error::{DatabaseResultExt, PlannerError, Result};
use crate::graph::TaskGraph;
use crate::models::{Dependency, DependencyType};

use super::utils::parse_enum;

const INSERT_DEPENDENCY_SQL: &str = "INSERT INTO dependencies (plan_id, predecessor_id, successor_id, dep_type) VALUES (?1, ?2, ?3, ?4)";
const DELETE_DEPENDENCY_SQL: &str =
    "DELETE FROM dependencies WHERE plan_id = ?1 AND predecessor_id = ?2 AND successor_id = ?3";
const SELECT_DEPENDENCIES_SQL: &str = "SELECT plan_id, predecessor_id, successor_id, dep_type FROM dependencies WHERE plan_id = ?1 ORDER BY predecessor_id, successor_id";
const CHECK_DEPENDENCY_SQL: &str = "SELECT EXISTS(SELECT 1 FROM dependencies WHERE plan_id = ?1 AND predecessor_id = ?2 AND successor_id = ?3)";

fn dependency_from_row(row: &rusqlite::Row) -> rusqlite::Result<Dependency> {
    Ok(Dependency {
        plan_id: row.get(0)?,
        predecessor_id: row.get(1)?,
        successor_id: row.get(2)?,
        dep_type: parse_enum::<DependencyType>(3, row.get(3)?)?,
    })
}

pub(super) fn load_dependencies(conn: &Connection, plan_id: &str) -> Result<Vec<Dependency>> {
    let mut stmt = conn
        .prepare(SELECT_DEPENDENCIES_SQL)
        .db_context("Failed to prepare dependency query")?;
    let deps = stmt
        .query_map(params![plan_id], dependency_from_row)
        .db_context("Failed to query dependencies")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .db_context("Failed to fetch dependencies")?;
    Ok(deps)
}

pub(super) fn insert_dependency(
    conn: &Connection,
    plan_id: &str,
    predecessor_id: &str,
    successor_id: &str,
    dep_type: DependencyType,
) -> Result<()> {
    conn.execute(
        INSERT_DEPENDENCY_SQL,
        params![plan_id, predecessor_id, successor_id, dep_type.as_str()],
    )
    .db_context("Failed to insert dependency")?;
    Ok(())
}

impl super::Database {
    /// Adds a dependency edge.
    ///
    /// Both endpoints must exist, the pair must be new, and the edge must
    /// not close a directed cycle; the cycle pre-check runs a DFS from the
    /// successor back toward the predecessor before anything is written.
    pub fn add_dependency(
        &mut self,
        plan_id: &str,
        predecessor_id: &str,
        successor_id: &str,
        dep_type: DependencyType,
        acting_user: Option<&str>,
        now: Timestamp,
    ) -> Result<Dependency> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        super::task_queries::require_task(&tx, plan_id, predecessor_id)?;
        super::task_queries::require_task(&tx, plan_id, successor_id)?;
        super::lock_queries::ensure_writable(&tx, plan_id, successor_id, acting_user, now)?;

        let exists: bool = tx
            .query_row(
                CHECK_DEPENDENCY_SQL,
                params![plan_id, predecessor_id, successor_id],
                |row| row.get(0),
            )
            .db_context("Failed to check for duplicate dependency")?;
        if exists {
            return Err(PlannerError::DuplicateDependency {
                predecessor_id: predecessor_id.to_string(),
                successor_id: successor_id.to_string(),
            });
        }

        let tasks = super::task_queries::load_tasks(&tx, plan_id)?;
        let dependencies = load_dependencies(&tx, plan_id)?;
        let graph = TaskGraph::build(&tasks, &dependencies)?;
        if graph.would_create_cycle(predecessor_id, successor_id) {
            let mut node_ids = graph.upstream_closure(predecessor_id);
            node_ids.push(predecessor_id.to_string());
            node_ids.push(successor_id.to_string());
            node_ids.sort();
            node_ids.dedup();
            return Err(PlannerError::CycleDetected { node_ids });
        }

        insert_dependency(&tx, plan_id, predecessor_id, successor_id, dep_type)?;
        super::plan_queries::touch_plan(&tx, plan_id, now)?;
        super::sync_queries::refresh_fingerprint(&tx, plan_id)?;
        tx.commit().db_context("Failed to commit transaction")?;

        Ok(Dependency {
            plan_id: plan_id.to_string(),
            predecessor_id: predecessor_id.to_string(),
            successor_id: successor_id.to_string(),
            dep_type,
        })
    }

    /// Removes a dependency edge.
    pub fn remove_dependency(
        &mut self,
        plan_id: &str,
        predecessor_id: &str,
        successor_id: &str,
        acting_user: Option<&str>,
        now: Timestamp,
    ) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        super::lock_queries::ensure_writable(&tx, plan_id, successor_id, acting_user, now)?;
        let deleted = tx
            .execute(
                DELETE_DEPENDENCY_SQL,
                params![plan_id, predecessor_id, successor_id],
            )
            .db_context("Failed to delete dependency")?;
        if deleted == 0 {
            return Err(PlannerError::DependencyNotFound {
                predecessor_id: predecessor_id.to_string(),
                successor_id: successor_id.to_string(),
            });
        }
        super::plan_queries::touch_plan(&tx, plan_id, now)?;
        super::sync_queries::refresh_fingerprint(&tx, plan_id)?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(())
    }

    /// All dependency edges of a plan.
    pub fn get_dependencies(&self, plan_id: &str) -> Result<Vec<Dependency>> {
        super::plan_queries::require_plan(&self.connection, plan_id)?;
        load_dependencies(&self.connection, plan_id)
    }
}

//! Per-plan sync state and fingerprint-based dirty tracking.

use jiff::Timestamp;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{DatabaseResultExt, Result};
use crate::fingerprint::plan_fingerprint;

use super::utils::parse_timestamp_opt;

/// The sync bookkeeping carried per plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    pub last_sync_at: Option<Timestamp>,
    pub previous_sync_at: Option<Timestamp>,
    /// Fingerprint recorded at the last sync
    pub fingerprint: Option<String>,
    /// Whether the plan content diverged from the synced fingerprint
    pub dirty: bool,
}

const SELECT_SYNC_SQL: &str =
    "SELECT last_sync_at, previous_sync_at, fingerprint, dirty FROM plan_sync_state WHERE plan_id = ?1";
const UPSERT_SYNC_SQL: &str = "INSERT INTO plan_sync_state (plan_id, last_sync_at, previous_sync_at, fingerprint, dirty) VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT (plan_id) DO UPDATE SET last_sync_at = excluded.last_sync_at, previous_sync_at = excluded.previous_sync_at, fingerprint = excluded.fingerprint, dirty = excluded.dirty";
const UPDATE_DIRTY_SQL: &str = "INSERT INTO plan_sync_state (plan_id, dirty) VALUES (?1, ?2) ON CONFLICT (plan_id) DO UPDATE SET dirty = excluded.dirty";

pub(super) fn load_sync_state(conn: &Connection, plan_id: &str) -> Result<SyncState> {
    let state = conn
        .query_row(SELECT_SYNC_SQL, params![plan_id], |row| {
            Ok(SyncState {
                last_sync_at: parse_timestamp_opt(0, row.get(0)?)?,
                previous_sync_at: parse_timestamp_opt(1, row.get(1)?)?,
                fingerprint: row.get(2)?,
                dirty: row.get(3)?,
            })
        })
        .optional()
        .db_context("Failed to query sync state")?;
    Ok(state.unwrap_or_default())
}

/// Recomputes the plan fingerprint and updates the dirty flag against the
/// fingerprint recorded at the last sync. Called at the end of every
/// mutation, inside its transaction.
pub(super) fn refresh_fingerprint(conn: &Connection, plan_id: &str) -> Result<String> {
    let snapshot = super::plan_queries::load_snapshot(conn, plan_id)?;
    let Some(snapshot) = snapshot else {
        return Ok(String::new());
    };
    let fingerprint = plan_fingerprint(&snapshot);
    let state = load_sync_state(conn, plan_id)?;
    let dirty = state.fingerprint.as_deref() != Some(fingerprint.as_str());
    conn.execute(UPDATE_DIRTY_SQL, params![plan_id, dirty])
        .db_context("Failed to update dirty flag")?;
    Ok(fingerprint)
}

impl super::Database {
    /// The sync bookkeeping for a plan.
    pub fn get_sync_state(&self, plan_id: &str) -> Result<SyncState> {
        load_sync_state(&self.connection, plan_id)
    }

    /// Records a sync: the current fingerprint becomes the synced baseline
    /// and the dirty flag clears. The previous last-sync instant shifts
    /// into `previous_sync_at`, bounding the "recently changed" window.
    pub fn mark_synced(&mut self, plan_id: &str, now: Timestamp) -> Result<SyncState> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        super::plan_queries::require_plan(&tx, plan_id)?;
        let old = load_sync_state(&tx, plan_id)?;
        let snapshot = super::plan_queries::load_snapshot(&tx, plan_id)?;
        let fingerprint = snapshot.map(|s| plan_fingerprint(&s)).unwrap_or_default();
        let state = SyncState {
            last_sync_at: Some(now),
            previous_sync_at: old.last_sync_at,
            fingerprint: Some(fingerprint),
            dirty: false,
        };
        tx.execute(
            UPSERT_SYNC_SQL,
            params![
                plan_id,
                state.last_sync_at.map(|t| t.to_string()),
                state.previous_sync_at.map(|t| t.to_string()),
                state.fingerprint,
                state.dirty
            ],
        )
        .db_context("Failed to write sync state")?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(state)
    }

    /// The current content fingerprint of a plan.
    pub fn current_fingerprint(&mut self, plan_id: &str) -> Result<String> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        let snapshot = super::plan_queries::load_snapshot(&tx, plan_id)?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(snapshot.map(|s| plan_fingerprint(&s)).unwrap_or_default())
    }
}

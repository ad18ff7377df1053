//! Advisory memoization for analytical results.
//!
//! Entries are keyed by `(plan id, plan fingerprint, parameter hash)`; any
//! successful mutation touching a plan invalidates its entries. The cache is
//! purely advisory: a miss only costs recomputation.

use std::collections::HashMap;
use std::sync::Mutex;

/// Serialized analytical results keyed by plan/fingerprint/params.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: Mutex<HashMap<CacheKey, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    plan_id: String,
    fingerprint: String,
    params: String,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a cached JSON payload for the exact key, if present.
    pub fn get(&self, plan_id: &str, fingerprint: &str, params: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(&CacheKey {
                plan_id: plan_id.to_string(),
                fingerprint: fingerprint.to_string(),
                params: params.to_string(),
            })
            .cloned()
    }

    /// Store a JSON payload. Silently drops the entry if the lock is poisoned.
    pub fn put(&self, plan_id: &str, fingerprint: &str, params: &str, value: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                CacheKey {
                    plan_id: plan_id.to_string(),
                    fingerprint: fingerprint.to_string(),
                    params: params.to_string(),
                },
                value,
            );
        }
    }

    /// Drop every entry belonging to a plan. Called after successful mutations.
    pub fn invalidate_plan(&self, plan_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            let before = entries.len();
            entries.retain(|key, _| key.plan_id != plan_id);
            if entries.len() < before {
                log::debug!(
                    "invalidated {} cached result(s) for plan {plan_id}",
                    before - entries.len()
                );
            }
        }
    }
}

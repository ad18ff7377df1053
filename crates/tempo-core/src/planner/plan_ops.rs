//! Plan, bucket, template and sync operations.

use jiff::Timestamp;

use super::Planner;
use crate::db::sync_queries::SyncState;
use crate::error::Result;
use crate::models::{Bucket, Plan};
use crate::params::{parse_instant, CloneTemplate, CreatePlan, PlanRef, UpsertBucket};
use crate::snapshot::PlanSnapshot;

impl Planner {
    /// Creates a new empty plan.
    pub async fn create_plan(&self, params: &CreatePlan) -> Result<Plan> {
        let plan_id = params.plan_id.clone();
        let name = params.name.clone().unwrap_or_else(|| plan_id.clone());
        let event_date = parse_instant("event_date", params.event_date.as_deref())?;
        self.with_db(move |db| db.create_plan(&plan_id, &name, event_date, Timestamp::now()))
            .await
    }

    /// Retrieves a plan by its ID.
    pub async fn get_plan(&self, params: &PlanRef) -> Result<Option<Plan>> {
        let plan_id = params.plan_id.clone();
        self.with_db(move |db| db.get_plan(&plan_id)).await
    }

    /// Lists all plans, most recently created first.
    pub async fn list_plans(&self) -> Result<Vec<Plan>> {
        self.with_db(|db| db.list_plans()).await
    }

    /// Permanently deletes a plan and everything it owns.
    pub async fn delete_plan(&self, params: &PlanRef) -> Result<()> {
        let plan_id = params.plan_id.clone();
        let result = self.with_db(move |db| db.delete_plan(&plan_id)).await;
        if result.is_ok() {
            self.invalidate(&params.plan_id);
        }
        result
    }

    /// Creates or renames a bucket.
    pub async fn upsert_bucket(&self, params: &UpsertBucket) -> Result<()> {
        let plan_id = params.plan_id.clone();
        let bucket = Bucket {
            bucket_id: params.bucket_id.clone(),
            name: params.name.clone(),
            order_hint: String::new(),
        };
        let result = self
            .with_db(move |db| db.upsert_bucket(&plan_id, &bucket, Timestamp::now()))
            .await;
        if result.is_ok() {
            self.invalidate(&params.plan_id);
        }
        result
    }

    /// Buckets of a plan.
    pub async fn get_buckets(&self, params: &PlanRef) -> Result<Vec<Bucket>> {
        let plan_id = params.plan_id.clone();
        self.with_db(move |db| db.get_buckets(&plan_id)).await
    }

    /// Loads a full snapshot of a plan.
    pub async fn get_snapshot(&self, params: &PlanRef) -> Result<PlanSnapshot> {
        let plan_id = params.plan_id.clone();
        self.with_db(move |db| db.get_snapshot(&plan_id)).await
    }

    /// Every plan can serve as a template; this lists them.
    pub async fn list_templates(&self) -> Result<Vec<Plan>> {
        self.list_plans().await
    }

    /// Clones a template into a new plan, shifting all dates so the latest
    /// source due date lands on the target event date.
    pub async fn clone_template(&self, params: &CloneTemplate) -> Result<Plan> {
        let source = params.source_plan_id.clone();
        let target = params.target_plan_id.clone();
        let name = params.name.clone();
        let preserve = params.preserve_task_ids;
        let event_date = parse_instant("event_date", Some(params.event_date.as_str()))?
            .ok_or_else(|| {
                crate::error::PlannerError::invalid_input("event_date", "must not be empty")
            })?;
        self.with_db(move |db| {
            db.clone_plan(
                &source,
                &target,
                event_date,
                name.as_deref(),
                preserve,
                Timestamp::now(),
            )
        })
        .await
    }

    /// Sync bookkeeping for a plan.
    pub async fn get_sync_state(&self, params: &PlanRef) -> Result<SyncState> {
        let plan_id = params.plan_id.clone();
        self.with_db(move |db| db.get_sync_state(&plan_id)).await
    }

    /// Records a sync point: the current content fingerprint becomes the
    /// baseline and the dirty flag clears.
    pub async fn mark_synced(&self, params: &PlanRef) -> Result<SyncState> {
        let plan_id = params.plan_id.clone();
        self.with_db(move |db| db.mark_synced(&plan_id, Timestamp::now()))
            .await
    }
}

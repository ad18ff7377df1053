//! Task and subtask mutation operations.

use jiff::Timestamp;

use super::Planner;
use crate::error::Result;
use crate::models::{Subtask, Task, TaskStatus};
use crate::params::{
    parse_instant, AddSubtask, CreateTask, DeleteSubtask, DeleteTask, TaskRef, UpdateSubtask,
    UpdateTask,
};

impl Planner {
    /// Creates a task in a plan.
    pub async fn create_task(&self, params: &CreateTask) -> Result<Task> {
        let now = Timestamp::now();
        let task = Task {
            plan_id: params.plan_id.clone(),
            task_id: params.task_id.clone(),
            title: params.title.clone(),
            bucket_id: params.bucket_id.clone(),
            status: TaskStatus::NotStarted,
            percent_complete: 0,
            start_date: parse_instant("start_date", params.start_date.as_deref())?,
            due_date: parse_instant("due_date", params.due_date.as_deref())?,
            completed_date: None,
            priority: params.priority.unwrap_or(5),
            assignees: params.assignees.clone(),
            assignee_names: params.assignee_names.clone(),
            applied_categories: Vec::new(),
            description: params.description.clone(),
            order_hint: String::new(),
            created_at: now,
            last_modified_at: now,
            created_by: params.acting_user.clone(),
            completed_by: None,
        };
        let acting_user = params.acting_user.clone();
        let result = self
            .with_db(move |db| db.create_task(task, acting_user.as_deref(), now))
            .await;
        if result.is_ok() {
            self.invalidate(&params.plan_id);
        }
        result
    }

    /// Retrieves a task.
    pub async fn get_task(&self, params: &TaskRef) -> Result<Option<Task>> {
        let plan_id = params.plan_id.clone();
        let task_id = params.task_id.clone();
        self.with_db(move |db| db.get_task(&plan_id, &task_id)).await
    }

    /// All tasks of a plan in order-hint order.
    pub async fn get_tasks(&self, params: &crate::params::PlanRef) -> Result<Vec<Task>> {
        let plan_id = params.plan_id.clone();
        self.with_db(move |db| db.get_tasks(&plan_id)).await
    }

    /// Applies a partial update to a task.
    pub async fn update_task(&self, params: &UpdateTask) -> Result<Task> {
        let request = params.validate()?;
        let plan_id = params.plan_id.clone();
        let task_id = params.task_id.clone();
        let result = self
            .with_db(move |db| db.update_task(&plan_id, &task_id, &request, Timestamp::now()))
            .await;
        if result.is_ok() {
            self.invalidate(&params.plan_id);
        }
        result
    }

    /// Deletes a task with its subtasks and dependency edges.
    pub async fn delete_task(&self, params: &DeleteTask) -> Result<()> {
        let plan_id = params.plan_id.clone();
        let task_id = params.task_id.clone();
        let acting_user = params.acting_user.clone();
        let result = self
            .with_db(move |db| {
                db.delete_task(&plan_id, &task_id, acting_user.as_deref(), Timestamp::now())
            })
            .await;
        if result.is_ok() {
            self.invalidate(&params.plan_id);
        }
        result
    }

    /// Adds a checklist item to a task.
    pub async fn add_subtask(&self, params: &AddSubtask) -> Result<Subtask> {
        let plan_id = params.plan_id.clone();
        let task_id = params.task_id.clone();
        let subtask_id = params.subtask_id.clone();
        let title = params.title.clone();
        let acting_user = params.acting_user.clone();
        let result = self
            .with_db(move |db| {
                db.add_subtask(
                    &plan_id,
                    &task_id,
                    &subtask_id,
                    &title,
                    acting_user.as_deref(),
                    Timestamp::now(),
                )
            })
            .await;
        if result.is_ok() {
            self.invalidate(&params.plan_id);
        }
        result
    }

    /// Applies a partial update to a checklist item.
    pub async fn update_subtask(&self, params: &UpdateSubtask) -> Result<Subtask> {
        let request = params.to_request();
        let plan_id = params.plan_id.clone();
        let task_id = params.task_id.clone();
        let subtask_id = params.subtask_id.clone();
        let acting_user = params.acting_user.clone();
        let result = self
            .with_db(move |db| {
                db.update_subtask(
                    &plan_id,
                    &task_id,
                    &subtask_id,
                    &request,
                    acting_user.as_deref(),
                    Timestamp::now(),
                )
            })
            .await;
        if result.is_ok() {
            self.invalidate(&params.plan_id);
        }
        result
    }

    /// Removes a checklist item.
    pub async fn delete_subtask(&self, params: &DeleteSubtask) -> Result<()> {
        let plan_id = params.plan_id.clone();
        let task_id = params.task_id.clone();
        let subtask_id = params.subtask_id.clone();
        let acting_user = params.acting_user.clone();
        let result = self
            .with_db(move |db| {
                db.delete_subtask(
                    &plan_id,
                    &task_id,
                    &subtask_id,
                    acting_user.as_deref(),
                    Timestamp::now(),
                )
            })
            .await;
        if result.is_ok() {
            self.invalidate(&params.plan_id);
        }
        result
    }

    /// Checklist items of a task.
    pub async fn get_subtasks(&self, params: &TaskRef) -> Result<Vec<Subtask>> {
        let plan_id = params.plan_id.clone();
        let task_id = params.task_id.clone();
        self.with_db(move |db| db.get_subtasks(&plan_id, &task_id))
            .await
    }
}

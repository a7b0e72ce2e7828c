//! Task service: validation, timestamps and persistence for task CRUD.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use mockable::Clock;
use shared::{
    validate_create, validate_update, CreateTaskRequest, Task, TaskId, UpdateTaskRequest,
};
use std::sync::Arc;

use crate::error::{TaskError, TaskResult};
use crate::store::SharedTaskStore;

/// CRUD operations over tasks. One instance lives for the whole process.
pub struct TaskService<C>
where
    C: Clock + Send + Sync,
{
    store: SharedTaskStore,
    clock: Arc<C>,
}

impl<C> TaskService<C>
where
    C: Clock + Send + Sync,
{
    pub fn new(store: SharedTaskStore, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Current time at the precision the store keeps.
    fn now(&self) -> DateTime<Utc> {
        self.clock.utc().trunc_subsecs(6)
    }

    /// Validates and inserts a new task.
    ///
    /// # Errors
    ///
    /// [`TaskError::Validation`] for bad input (nothing is written),
    /// [`TaskError::Persistence`] if the insert fails.
    pub async fn create(&self, request: &CreateTaskRequest) -> TaskResult<Task> {
        let new_task = validate_create(request)?;
        let task = self.store.insert(&new_task, self.now()).await?;
        tracing::info!(task_id = %task.id, "task created");
        Ok(task)
    }

    pub async fn list(&self) -> TaskResult<Vec<Task>> {
        Ok(self.store.list().await?)
    }

    pub async fn get(&self, id: TaskId) -> TaskResult<Task> {
        self.store.find(id).await?.ok_or_else(|| {
            tracing::debug!(task_id = %id, "task not found");
            TaskError::NotFound(id)
        })
    }

    /// Applies the supplied fields to an existing task.
    ///
    /// An unknown id is reported before any validation problem. `updatedAt`
    /// always moves forward, even if the clock has not.
    pub async fn update(&self, id: TaskId, request: &UpdateTaskRequest) -> TaskResult<Task> {
        let mut task = self.get(id).await?;
        let changes = validate_update(request)?;

        task.apply(changes);
        task.updated_at = advance(task.updated_at, self.now());

        self.store.update(&task).await?;
        tracing::info!(task_id = %id, "task updated");
        Ok(task)
    }

    pub async fn delete(&self, id: TaskId) -> TaskResult<()> {
        self.store.delete(id).await.map_err(|err| {
            let err = TaskError::from(err);
            if matches!(err, TaskError::NotFound(_)) {
                tracing::debug!(task_id = %id, "task not found");
            }
            err
        })?;
        tracing::info!(task_id = %id, "task deleted");
        Ok(())
    }

    /// Checks that the store answers.
    pub async fn health(&self) -> TaskResult<()> {
        Ok(self.store.ping().await?)
    }
}

fn advance(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

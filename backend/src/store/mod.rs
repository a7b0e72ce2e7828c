//! Task persistence.
//!
//! The service only talks to [`TaskStore`]; `SqliteTaskStore` is the
//! relational backend used in production and in tests (`:memory:`).

mod sqlite;

pub use sqlite::{SqliteTaskStore, IN_MEMORY};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{NewTask, Task, TaskId};
use std::sync::Arc;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Task persistence contract. Each mutating call is a single statement.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Inserts a new task and returns it with its store-assigned id.
    async fn insert(&self, task: &NewTask, created_at: DateTime<Utc>) -> StoreResult<Task>;

    /// Returns every task, ordered by id.
    async fn list(&self) -> StoreResult<Vec<Task>>;

    /// Returns `None` when no task has the given id.
    async fn find(&self, id: TaskId) -> StoreResult<Option<Task>>;

    /// Overwrites the stored row for `task.id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no row has that id.
    async fn update(&self, task: &Task) -> StoreResult<()>;

    /// Hard-deletes a task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no row has that id.
    async fn delete(&self, id: TaskId) -> StoreResult<()>;

    /// Cheap round-trip used by the health check.
    async fn ping(&self) -> StoreResult<()>;
}

/// Shared handle to a store implementation.
pub type SharedTaskStore = Arc<dyn TaskStore>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a backend error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::persistence(err)
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::persistence(err)
    }
}

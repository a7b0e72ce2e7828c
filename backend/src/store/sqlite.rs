//! SQLite-backed task store.

use super::{StoreError, StoreResult, TaskStore};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use shared::{NewTask, Task, TaskId};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT,
    status TEXT NOT NULL DEFAULT 'todo' CHECK (status IN ('todo', 'in_progress', 'done')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

const COLUMNS: &str = "id, title, description, status, created_at, updated_at";

pub const IN_MEMORY: &str = ":memory:";

pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    /// Opens (or creates) the database at `path` and applies the schema.
    /// `:memory:` gives a private in-memory database.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();

        if path.as_os_str() != IN_MEMORY {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(StoreError::persistence)?;
            }
        }

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path)?;
            conn.execute_batch(SCHEMA)?;
            tracing::debug!(path = %path.display(), "task database ready");
            Ok::<_, StoreError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn open_in_memory() -> StoreResult<Self> {
        Self::open(IN_MEMORY).await
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await?
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(3)?;
    Ok(Task {
        id: TaskId(row.get(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        status: status.parse().map_err(|e| conversion_error(3, e))?,
        created_at: timestamp_column(row, 4)?,
        updated_at: timestamp_column(row, 5)?,
    })
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn insert(&self, task: &NewTask, created_at: DateTime<Utc>) -> StoreResult<Task> {
        let task = task.clone();
        self.with_conn(move |conn| {
            let stamp = format_timestamp(created_at);
            conn.execute(
                "INSERT INTO tasks (title, description, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![task.title, task.description, task.status.as_str(), stamp],
            )?;
            let id = TaskId(conn.last_insert_rowid());
            Ok(task.into_task(id, created_at))
        })
        .await
    }

    async fn list(&self) -> StoreResult<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM tasks ORDER BY id"))?;
            let tasks = stmt
                .query_map([], row_to_task)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await
    }

    async fn find(&self, id: TaskId) -> StoreResult<Option<Task>> {
        self.with_conn(move |conn| {
            let task = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM tasks WHERE id = ?1"),
                    params![id.value()],
                    row_to_task,
                )
                .optional()?;
            Ok(task)
        })
        .await
    }

    async fn update(&self, task: &Task) -> StoreResult<()> {
        let task = task.clone();
        self.with_conn(move |conn| {
            let affected = conn.execute(
                "UPDATE tasks SET title = ?2, description = ?3, status = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    task.id.value(),
                    task.title,
                    task.description,
                    task.status.as_str(),
                    format_timestamp(task.updated_at),
                ],
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound(task.id));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: TaskId) -> StoreResult<()> {
        self.with_conn(move |conn| {
            let affected = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id.value()])?;
            if affected == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{SubsecRound, TimeZone};
    use shared::TaskStatus;

    fn new_task(title: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: None,
            status: TaskStatus::Todo,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids_from_one() {
        let store = SqliteTaskStore::open_in_memory().await.unwrap();

        let first = store.insert(&new_task("first"), at(8)).await.unwrap();
        let second = store.insert(&new_task("second"), at(9)).await.unwrap();

        assert_eq!(first.id, TaskId(1));
        assert_eq!(second.id, TaskId(2));
        assert_eq!(first.created_at, first.updated_at);
    }

    #[tokio::test]
    async fn find_returns_what_was_inserted() {
        let store = SqliteTaskStore::open_in_memory().await.unwrap();
        let created_at = Utc::now().trunc_subsecs(6);
        let task = NewTask {
            title: "Write report".to_string(),
            description: Some("quarterly".to_string()),
            status: TaskStatus::InProgress,
        };

        let inserted = store.insert(&task, created_at).await.unwrap();
        let found = store.find(inserted.id).await.unwrap();

        assert_eq!(found, Some(inserted));
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let store = SqliteTaskStore::open_in_memory().await.unwrap();
        assert_eq!(store.find(TaskId(42)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_overwrites_row() {
        let store = SqliteTaskStore::open_in_memory().await.unwrap();
        let mut task = store.insert(&new_task("draft"), at(8)).await.unwrap();

        task.title = "final".to_string();
        task.status = TaskStatus::Done;
        task.updated_at = at(10);
        store.update(&task).await.unwrap();

        assert_eq!(store.find(task.id).await.unwrap(), Some(task));
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let store = SqliteTaskStore::open_in_memory().await.unwrap();
        let ghost = new_task("ghost").into_task(TaskId(7), at(8));

        assert!(matches!(
            store.update(&ghost).await,
            Err(StoreError::NotFound(TaskId(7)))
        ));
        assert!(matches!(
            store.delete(TaskId(7)).await,
            Err(StoreError::NotFound(TaskId(7)))
        ));
    }

    #[tokio::test]
    async fn deleted_ids_are_not_reused() {
        let store = SqliteTaskStore::open_in_memory().await.unwrap();
        let first = store.insert(&new_task("a"), at(8)).await.unwrap();
        store.delete(first.id).await.unwrap();

        let next = store.insert(&new_task("b"), at(9)).await.unwrap();

        assert_eq!(store.find(first.id).await.unwrap(), None);
        assert_eq!(next.id, TaskId(2));
    }

    #[tokio::test]
    async fn list_is_ordered_by_id() {
        let store = SqliteTaskStore::open_in_memory().await.unwrap();
        for title in ["one", "two", "three"] {
            store.insert(&new_task(title), at(8)).await.unwrap();
        }

        let titles: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();

        assert_eq!(titles, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn schema_rejects_blank_title() {
        let store = SqliteTaskStore::open_in_memory().await.unwrap();
        let result = store.insert(&new_task("   "), at(8)).await;
        assert!(matches!(result, Err(StoreError::Persistence(_))));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tasks.db");

        let created = {
            let store = SqliteTaskStore::open(&path).await.unwrap();
            store.insert(&new_task("persisted"), at(8)).await.unwrap()
        };

        let reopened = SqliteTaskStore::open(&path).await.unwrap();
        assert_eq!(reopened.find(created.id).await.unwrap(), Some(created));
        reopened.ping().await.unwrap();
    }
}

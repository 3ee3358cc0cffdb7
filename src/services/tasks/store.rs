//! Task Persistence
//!
//! SQLite storage for background tasks and their output. Status changes are
//! guarded updates (`... WHERE status = 'pending'`), so a transition that is
//! not allowed from the current state simply affects no rows.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::task::{BackgroundTask, TaskStatus, TaskType};
use crate::storage::database::{unknown_value, DbConnection, DbPool};
use crate::utils::error::{AppError, AppResult};

/// Error recorded for tasks found unfinished at startup.
pub const INTERRUPTED_ERROR: &str = "interrupted by restart";

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[derive(Clone)]
pub struct TaskStore {
    pool: DbPool,
}

impl TaskStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn get_connection(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Insert a new `pending` task and return it.
    pub fn insert(
        &self,
        id: &str,
        workspace_id: &str,
        task_type: TaskType,
        command: &str,
    ) -> AppResult<BackgroundTask> {
        let conn = self.get_connection()?;
        let created_at = now_rfc3339();
        conn.execute(
            "INSERT INTO tasks (id, workspace_id, task_type, command, status, progress, created_at, seq)
             VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5,
                     (SELECT COALESCE(MAX(seq), 0) + 1 FROM tasks))",
            params![id, workspace_id, task_type.as_str(), command, created_at],
        )?;

        Ok(BackgroundTask {
            id: id.to_string(),
            workspace_id: workspace_id.to_string(),
            task_type,
            command: command.to_string(),
            status: TaskStatus::Pending,
            output: Vec::new(),
            progress: TaskStatus::Pending.progress(),
            created_at,
            started_at: None,
            completed_at: None,
            error: None,
        })
    }

    /// `pending -> running`. Returns false if the task was not pending.
    pub fn mark_running(&self, id: &str) -> AppResult<bool> {
        let conn = self.get_connection()?;
        let changed = conn.execute(
            "UPDATE tasks SET status = 'running', progress = ?2, started_at = ?3
             WHERE id = ?1 AND status = 'pending'",
            params![id, TaskStatus::Running.progress(), now_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    /// `running -> completed`. Returns false if the task was not running.
    pub fn mark_completed(&self, id: &str) -> AppResult<bool> {
        let conn = self.get_connection()?;
        let changed = conn.execute(
            "UPDATE tasks SET status = 'completed', progress = ?2, completed_at = ?3
             WHERE id = ?1 AND status = 'running'",
            params![id, TaskStatus::Completed.progress(), now_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    /// `pending|running -> failed`. Returns false if the task was already terminal.
    pub fn mark_failed(&self, id: &str, error: &str) -> AppResult<bool> {
        let conn = self.get_connection()?;
        let changed = conn.execute(
            "UPDATE tasks SET status = 'failed', progress = ?2, completed_at = ?3, error = ?4
             WHERE id = ?1 AND status IN ('pending', 'running')",
            params![id, TaskStatus::Failed.progress(), now_rfc3339(), error],
        )?;
        Ok(changed > 0)
    }

    /// `pending -> failed`. Returns false if the task had already started.
    pub fn fail_pending(&self, id: &str, error: &str) -> AppResult<bool> {
        let conn = self.get_connection()?;
        let changed = conn.execute(
            "UPDATE tasks SET status = 'failed', progress = ?2, completed_at = ?3, error = ?4
             WHERE id = ?1 AND status = 'pending'",
            params![id, TaskStatus::Failed.progress(), now_rfc3339(), error],
        )?;
        Ok(changed > 0)
    }

    /// Append output chunks after any already stored for the task.
    pub fn append_output(&self, id: &str, chunks: &[String]) -> AppResult<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let conn = self.get_connection()?;
        let tx = conn.unchecked_transaction()?;
        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), -1) + 1 FROM task_output WHERE task_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO task_output (task_id, seq, chunk) VALUES (?1, ?2, ?3)")?;
            for (offset, chunk) in chunks.iter().enumerate() {
                stmt.execute(params![id, next + offset as i64, chunk])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> AppResult<Option<BackgroundTask>> {
        let conn = self.get_connection()?;
        let task = conn
            .query_row(
                "SELECT id, workspace_id, task_type, command, status, progress,
                        created_at, started_at, completed_at, error
                 FROM tasks WHERE id = ?1",
                params![id],
                row_to_task,
            )
            .optional()?;

        match task {
            Some(mut task) => {
                task.output = load_output(&conn, &task.id)?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    /// Tasks for a workspace, newest first.
    pub fn list(
        &self,
        workspace_id: &str,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> AppResult<Vec<BackgroundTask>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, workspace_id, task_type, command, status, progress,
                    created_at, started_at, completed_at, error
             FROM tasks
             WHERE workspace_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY seq DESC
             LIMIT ?3",
        )?;
        let mut tasks: Vec<BackgroundTask> = stmt
            .query_map(
                params![workspace_id, status.map(|s| s.as_str()), limit as i64],
                row_to_task,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        for task in &mut tasks {
            task.output = load_output(&conn, &task.id)?;
        }
        Ok(tasks)
    }

    /// Fail every task left `pending` or `running` by a previous process.
    pub fn recover_interrupted(&self) -> AppResult<usize> {
        let conn = self.get_connection()?;
        let changed = conn.execute(
            "UPDATE tasks SET status = 'failed', progress = ?1, completed_at = ?2, error = ?3
             WHERE status IN ('pending', 'running')",
            params![TaskStatus::Failed.progress(), now_rfc3339(), INTERRUPTED_ERROR],
        )?;
        Ok(changed)
    }
}

fn load_output(conn: &Connection, task_id: &str) -> AppResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT chunk FROM task_output WHERE task_id = ?1 ORDER BY seq ASC")?;
    let rows = stmt
        .query_map(params![task_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<BackgroundTask> {
    let task_type: String = row.get(2)?;
    let status: String = row.get(4)?;
    let progress: i64 = row.get(5)?;
    Ok(BackgroundTask {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        task_type: TaskType::parse(&task_type)
            .ok_or_else(|| unknown_value(2, "task type", &task_type))?,
        command: row.get(3)?,
        status: TaskStatus::parse(&status).ok_or_else(|| unknown_value(4, "task status", &status))?,
        output: Vec::new(),
        progress: progress.clamp(0, 100) as u8,
        created_at: row.get(6)?,
        started_at: row.get(7)?,
        completed_at: row.get(8)?,
        error: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;

    fn store() -> TaskStore {
        TaskStore::new(Database::new_in_memory().unwrap().pool().clone())
    }

    #[test]
    fn test_insert_and_get() {
        let store = store();
        store.insert("t1", "ws1", TaskType::Build, "npm run build").unwrap();

        let task = store.get("t1").unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);
        assert_eq!(task.command, "npm run build");
        assert!(task.started_at.is_none());
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_guarded_transitions() {
        let store = store();
        store.insert("t1", "ws1", TaskType::Test, "npm test").unwrap();

        // Cannot complete before running
        assert!(!store.mark_completed("t1").unwrap());
        assert!(store.mark_running("t1").unwrap());
        assert!(!store.mark_running("t1").unwrap());
        assert!(store.mark_completed("t1").unwrap());
        // Terminal states never regress
        assert!(!store.mark_failed("t1", "late").unwrap());
        assert!(!store.mark_running("t1").unwrap());

        let task = store.get("t1").unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert!(task.started_at.is_some());
        assert!(task.completed_at.is_some());
        assert!(task.error.is_none());
    }

    #[test]
    fn test_pending_can_fail_directly() {
        let store = store();
        store.insert("t1", "ws1", TaskType::Lint, "npm run lint").unwrap();
        assert!(store.mark_failed("t1", "cancelled before start").unwrap());

        let task = store.get("t1").unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("cancelled before start"));
        assert!(task.started_at.is_none());
    }

    #[test]
    fn test_append_output_keeps_order() {
        let store = store();
        store.insert("t1", "ws1", TaskType::Custom, "echo").unwrap();
        store
            .append_output("t1", &["a".to_string(), "b".to_string()])
            .unwrap();
        store.append_output("t1", &["c".to_string()]).unwrap();
        store.append_output("t1", &[]).unwrap();

        let task = store.get("t1").unwrap().unwrap();
        assert_eq!(task.output, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_list_newest_first_with_filter() {
        let store = store();
        store.insert("t1", "ws1", TaskType::Build, "one").unwrap();
        store.insert("t2", "ws1", TaskType::Build, "two").unwrap();
        store.insert("t3", "ws2", TaskType::Build, "other").unwrap();
        store.insert("t4", "ws1", TaskType::Build, "four").unwrap();
        store.mark_running("t2").unwrap();

        let ids: Vec<String> = store
            .list("ws1", None, 10)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["t4", "t2", "t1"]);

        let running = store.list("ws1", Some(TaskStatus::Running), 10).unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, "t2");

        assert_eq!(store.list("ws1", None, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_recover_interrupted() {
        let store = store();
        store.insert("t1", "ws1", TaskType::Build, "a").unwrap();
        store.insert("t2", "ws1", TaskType::Build, "b").unwrap();
        store.insert("t3", "ws1", TaskType::Build, "c").unwrap();
        store.mark_running("t2").unwrap();
        store.mark_running("t3").unwrap();
        store.mark_completed("t3").unwrap();

        assert_eq!(store.recover_interrupted().unwrap(), 2);
        let t1 = store.get("t1").unwrap().unwrap();
        assert_eq!(t1.status, TaskStatus::Failed);
        assert_eq!(t1.error.as_deref(), Some(INTERRUPTED_ERROR));
        assert_eq!(store.get("t3").unwrap().unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn test_fail_pending_leaves_running_tasks() {
        let store = store();
        store.insert("t1", "ws1", TaskType::Build, "a").unwrap();
        store.insert("t2", "ws1", TaskType::Build, "b").unwrap();
        store.mark_running("t2").unwrap();

        assert!(store.fail_pending("t1", "cancelled before start").unwrap());
        assert!(!store.fail_pending("t2", "cancelled before start").unwrap());
        assert_eq!(store.get("t2").unwrap().unwrap().status, TaskStatus::Running);
    }

    #[test]
    fn test_unknown_status_is_an_error() {
        let store = store();
        store.insert("t1", "ws1", TaskType::Build, "a").unwrap();
        {
            let conn = store.get_connection().unwrap();
            conn.execute("UPDATE tasks SET status = 'paused' WHERE id = 't1'", [])
                .unwrap();
        }
        assert!(store.get("t1").is_err());
        assert!(store.list("ws1", None, 10).is_err());
    }
}

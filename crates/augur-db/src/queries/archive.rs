//! Archive of terminal tasks.
//!
//! Tasks are stored as JSON bodies alongside a few indexed columns.

use augur_types::task::{Task, TaskStatus};
use augur_types::TaskId;
use rusqlite::Connection;

use crate::{DbError, Result};

/// Archive a terminal task. Archived rows are never overwritten.
///
/// # Errors
///
/// Returns [`DbError::Serialization`] for open tasks or if the body cannot
/// be encoded, and [`DbError::AlreadyArchived`] if the id is already stored.
pub fn archive_task(conn: &Connection, task: &Task) -> Result<()> {
    if !task.status.is_terminal() {
        return Err(DbError::Serialization(format!(
            "task {} is still {}",
            task.id,
            task.status.as_str()
        )));
    }
    let body = serde_json::to_string(task).map_err(|e| DbError::Serialization(e.to_string()))?;
    conn.execute(
        "INSERT INTO task_archive
            (task_id, creator, status, created_at, expires_at, body)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            task.id.as_bytes().as_slice(),
            task.creator.as_bytes().as_slice(),
            task.status.as_str(),
            to_sql_height(task.created_at)?,
            to_sql_height(task.expires_at)?,
            body,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            DbError::AlreadyArchived(format!("task {}", task.id))
        }
        other => DbError::Sqlite(other),
    })?;
    tracing::debug!(task = %task.id, status = task.status.as_str(), "task archived");
    Ok(())
}

/// Load an archived task by id.
pub fn load_archived_task(conn: &Connection, id: &TaskId) -> Result<Task> {
    let body: String = conn
        .query_row(
            "SELECT body FROM task_archive WHERE task_id = ?1",
            [id.as_bytes().as_slice()],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("task {id}")),
            other => DbError::Sqlite(other),
        })?;
    serde_json::from_str(&body).map_err(|e| DbError::Serialization(e.to_string()))
}

/// Number of archived tasks.
pub fn count_archived(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM task_archive", [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// Number of archived tasks with the given terminal status.
pub fn count_by_status(conn: &Connection, status: TaskStatus) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM task_archive WHERE status = ?1",
        [status.as_str()],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

fn to_sql_height(height: u64) -> Result<i64> {
    i64::try_from(height).map_err(|_| DbError::Serialization(format!("height {height} out of range")))
}

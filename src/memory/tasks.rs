//! Agent task lifecycle: start, complete, and session teardown.
//!
//! Status only ever moves out of `running`. Completing an unknown or already
//! finished task is a successful no-op, since the host may fire completion
//! speculatively or more than once.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::begin_write;
use crate::error::StoreResult;
use crate::memory::types::{AgentTask, TaskStatus};

/// Result of [`task_complete`].
#[derive(Debug, Serialize)]
pub struct TaskCompletion {
    pub id: String,
    /// `false` when the task was unknown or already terminal.
    pub updated: bool,
    /// The task as stored after the call, if it exists.
    pub task: Option<AgentTask>,
}

/// Record a running task. An existing task with the same id is replaced, so a
/// retried start is harmless.
pub fn task_start(
    conn: &mut Connection,
    id: &str,
    description: &str,
    session_id: Option<&str>,
) -> StoreResult<AgentTask> {
    let now = super::now();
    let tx = begin_write(conn)?;
    tx.execute(
        "INSERT OR REPLACE INTO agent_tasks (id, session_id, description, status, started_at, completed_at, result) \
         VALUES (?1, ?2, ?3, 'running', ?4, NULL, NULL)",
        params![id, session_id, description, now],
    )?;
    tx.commit()?;

    tracing::debug!(task_id = id, session_id, "task started");

    Ok(AgentTask {
        id: id.to_string(),
        session_id: session_id.map(str::to_string),
        description: description.to_string(),
        status: TaskStatus::Running,
        started_at: now,
        completed_at: None,
        result: None,
    })
}

/// Terminalize a running task as `completed`, or `failed` when `failed` is set.
pub fn task_complete(
    conn: &mut Connection,
    id: &str,
    result: Option<&str>,
    failed: bool,
) -> StoreResult<TaskCompletion> {
    let status = if failed {
        TaskStatus::Failed
    } else {
        TaskStatus::Completed
    };

    let tx = begin_write(conn)?;
    let changed = tx.execute(
        "UPDATE agent_tasks SET status = ?1, completed_at = ?2, result = ?3 \
         WHERE id = ?4 AND status = 'running'",
        params![status.as_str(), super::now(), result, id],
    )?;
    let task = fetch_task(&tx, id)?;
    tx.commit()?;

    if changed == 0 {
        tracing::debug!(task_id = id, known = task.is_some(), "task completion was a no-op");
    }

    Ok(TaskCompletion {
        id: id.to_string(),
        updated: changed > 0,
        task,
    })
}

/// Mark every still-running task of a session as `interrupted`.
pub fn interrupt_session_tasks(conn: &mut Connection, session_id: &str) -> StoreResult<usize> {
    let tx = begin_write(conn)?;
    let changed = tx.execute(
        "UPDATE agent_tasks SET status = 'interrupted', completed_at = ?1 \
         WHERE session_id = ?2 AND status = 'running'",
        params![super::now(), session_id],
    )?;
    tx.commit()?;

    if changed > 0 {
        tracing::info!(session_id, tasks = changed, "interrupted running tasks");
    }
    Ok(changed)
}

pub fn get_task(conn: &Connection, id: &str) -> StoreResult<Option<AgentTask>> {
    fetch_task(conn, id)
}

fn fetch_task(conn: &Connection, id: &str) -> StoreResult<Option<AgentTask>> {
    let task = conn
        .query_row(
            &format!("SELECT {} FROM agent_tasks WHERE id = ?1", AgentTask::COLUMNS),
            params![id],
            AgentTask::from_row,
        )
        .optional()?;
    Ok(task)
}

/// Running tasks, newest first, optionally for a single session.
pub fn running_tasks(
    conn: &Connection,
    session_id: Option<&str>,
    limit: usize,
) -> StoreResult<Vec<AgentTask>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM agent_tasks \
         WHERE status = 'running' AND (?1 IS NULL OR session_id = ?1) \
         ORDER BY started_at DESC, id LIMIT ?2",
        AgentTask::COLUMNS
    ))?;
    let tasks = stmt
        .query_map(params![session_id, limit as i64], AgentTask::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

/// The `limit` most recently terminalized tasks.
pub fn recent_finished_tasks(conn: &Connection, limit: usize) -> StoreResult<Vec<AgentTask>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM agent_tasks WHERE completed_at IS NOT NULL \
         ORDER BY completed_at DESC, id LIMIT ?1",
        AgentTask::COLUMNS
    ))?;
    let tasks = stmt
        .query_map(params![limit as i64], AgentTask::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

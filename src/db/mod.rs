pub mod migrations;
pub mod schema;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// Open (or create) the store at the given path with WAL journaling, a bounded
/// busy timeout, and the schema initialized and migrated.
///
/// Safe to call from every short-lived hook process. Once the schema is
/// current, opening only reads.
pub fn open_database(path: impl AsRef<Path>, busy_timeout_ms: u64) -> StoreResult<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            StoreError::Unavailable(format!("failed to create directory {}: {e}", parent.display()))
        })?;
    }

    let conn = Connection::open(path).map_err(|e| {
        StoreError::Unavailable(format!("failed to open database at {}: {e}", path.display()))
    })?;

    // Busy timeout must precede the WAL switch, which also takes a lock
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
    let journal_mode: String = conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?;
    if !journal_mode.eq_ignore_ascii_case("wal") {
        conn.pragma_update(None, "journal_mode", "WAL")?;
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    // An up-to-date store is opened without writing, so readers never queue
    // behind a writer.
    if !migrations::is_current(&conn)? {
        schema::init_schema(&conn)?;
        migrations::run_migrations(&conn)?;
    }

    tracing::debug!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory store with schema and migrations applied.
pub fn open_memory_database() -> StoreResult<Connection> {
    let conn = Connection::open_in_memory()?;
    schema::init_schema(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

/// Begin a write transaction that takes the write lock up front, so contending
/// writers queue on the busy handler instead of failing a lock upgrade.
pub fn begin_write(conn: &mut Connection) -> StoreResult<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub schema_version: u32,
    pub journal_mode: String,
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub entry_count: u64,
    pub task_count: u64,
    pub running_tasks: u64,
    pub active_phases: u64,
    pub snapshot_count: u64,
    pub learning_count: u64,
    pub pending_learnings: u64,
}

/// Run `PRAGMA integrity_check` and gather row counts.
pub fn check_database_health(conn: &Connection) -> StoreResult<HealthReport> {
    let schema_version = migrations::get_schema_version(conn)?;
    let journal_mode: String = conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?;
    let integrity_details: String =
        conn.pragma_query_value(None, "integrity_check", |row| row.get(0))?;

    let count = |sql: &str| -> StoreResult<u64> {
        let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as u64)
    };

    Ok(HealthReport {
        schema_version,
        journal_mode,
        integrity_ok: integrity_details == "ok",
        integrity_details,
        entry_count: count("SELECT COUNT(*) FROM memory_entries")?,
        task_count: count("SELECT COUNT(*) FROM agent_tasks")?,
        running_tasks: count("SELECT COUNT(*) FROM agent_tasks WHERE status = 'running'")?,
        active_phases: count("SELECT COUNT(*) FROM work_phases WHERE status = 'active'")?,
        snapshot_count: count("SELECT COUNT(*) FROM snapshots")?,
        learning_count: count("SELECT COUNT(*) FROM learnings")?,
        pending_learnings: count("SELECT COUNT(*) FROM learnings WHERE exported = 0")?,
    })
}

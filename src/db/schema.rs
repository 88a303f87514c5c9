//! SQL DDL for all hivemind tables.
//!
//! Defines `memory_entries`, `agent_tasks`, `work_phases`, `snapshots`,
//! `learnings`, and `schema_meta`. All DDL uses `IF NOT EXISTS` so every hook process can run it
//! on startup.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- Key/value state
CREATE TABLE IF NOT EXISTS memory_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'general',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_category ON memory_entries(category);
CREATE INDEX IF NOT EXISTS idx_entries_updated ON memory_entries(updated_at);

-- Subagent / task lifecycle
CREATE TABLE IF NOT EXISTS agent_tasks (
    id TEXT PRIMARY KEY,
    session_id TEXT,
    description TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'running' CHECK(status IN ('running','completed','failed','interrupted')),
    started_at TEXT NOT NULL,
    completed_at TEXT,
    result TEXT
);

CREATE INDEX IF NOT EXISTS idx_tasks_status ON agent_tasks(status);
CREATE INDEX IF NOT EXISTS idx_tasks_session ON agent_tasks(session_id);
CREATE INDEX IF NOT EXISTS idx_tasks_completed ON agent_tasks(completed_at);

-- Named units of work, optionally nested
CREATE TABLE IF NOT EXISTS work_phases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active','completed')),
    context TEXT,
    parent_id INTEGER REFERENCES work_phases(id),
    started_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_work_phases_status ON work_phases(status);

-- Context snapshots (append-only)
CREATE TABLE IF NOT EXISTS snapshots (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    snapshot_type TEXT NOT NULL,
    summary TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_snapshots_session ON snapshots(session_id);
CREATE INDEX IF NOT EXISTS idx_snapshots_created ON snapshots(created_at);

CREATE TRIGGER IF NOT EXISTS snapshots_append_only
BEFORE UPDATE ON snapshots
BEGIN
    SELECT RAISE(ABORT, 'snapshots are append-only');
END;

-- Learnings awaiting export to the project document
CREATE TABLE IF NOT EXISTS learnings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    learning_type TEXT NOT NULL,
    content TEXT NOT NULL,
    exported INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_learnings_exported ON learnings(exported);

CREATE TRIGGER IF NOT EXISTS learnings_export_is_final
BEFORE UPDATE OF exported ON learnings
WHEN OLD.exported = 1 AND NEW.exported = 0
BEGIN
    SELECT RAISE(ABORT, 'learning export cannot be reverted');
END;

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

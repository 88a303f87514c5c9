//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring the database up to [`CURRENT_SCHEMA_VERSION`]. Every step runs in
//! its own IMMEDIATE transaction and re-reads the version under the lock, so
//! two hook processes initializing the same fresh store cannot both apply it.

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.and_then(|v| v.parse::<u32>().ok()).unwrap_or(0))
}

/// Whether the schema is already at [`CURRENT_SCHEMA_VERSION`]. Read-only.
pub fn is_current(conn: &Connection) -> rusqlite::Result<bool> {
    if !table_exists(conn, "schema_meta")? {
        return Ok(false);
    }
    Ok(get_schema_version(conn)? >= CURRENT_SCHEMA_VERSION)
}

fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [version.to_string()],
    )?;
    Ok(())
}

/// Run any pending forward-only migrations.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

        // Another process may have migrated while we waited for the lock.
        let current = get_schema_version(&tx)?;
        if current >= next {
            tx.commit()?;
            version = current;
            continue;
        }

        tracing::info!(from = current, to = next, "running migration");
        match next {
            2 => migrate_v1_to_v2(&tx)?,
            3 => migrate_v2_to_v3(&tx)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                break;
            }
        }

        update_schema_version(&tx, next)?;
        tx.commit()?;
        version = next;
    }

    Ok(())
}

pub(crate) fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )
}

/// Migration v1 → v2: adopt rows from the legacy script-era tables.
///
/// Earlier tooling wrote key/value state to `memory` and snapshots to
/// `context_snapshots`. Their rows are copied into the canonical tables; the
/// legacy tables are left in place untouched.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    let now = crate::memory::now();

    if table_exists(conn, "memory")? {
        let adopted = conn.execute(
            "INSERT OR IGNORE INTO memory_entries (key, value, category, created_at, updated_at) \
             SELECT key, value, COALESCE(category, 'general'), \
                    COALESCE(created_at, ?1), COALESCE(updated_at, ?1) \
             FROM memory",
            [&now],
        )?;
        tracing::info!(rows = adopted, "adopted legacy memory rows");
    }

    if table_exists(conn, "context_snapshots")? {
        let adopted = conn.execute(
            "INSERT OR IGNORE INTO snapshots (id, session_id, snapshot_type, summary, created_at) \
             SELECT 'legacy-' || id, snapshot_name, COALESCE(snapshot_type, 'manual'), \
                    context_data, COALESCE(created_at, ?1) \
             FROM context_snapshots",
            [&now],
        )?;
        tracing::info!(rows = adopted, "adopted legacy snapshot rows");
    }

    Ok(())
}

/// Migration v2 → v3: adopt the legacy `phases` table into `work_phases`.
///
/// Legacy ids are kept so parent links stay valid. Anything not completed,
/// including never-started `pending` rows, is adopted as active.
fn migrate_v2_to_v3(conn: &Connection) -> rusqlite::Result<()> {
    if !table_exists(conn, "phases")? {
        return Ok(());
    }
    let adopted = conn.execute(
        "INSERT OR IGNORE INTO work_phases (id, name, status, context, parent_id, started_at, completed_at) \
         SELECT id, phase_name, \
                CASE WHEN status = 'completed' THEN 'completed' ELSE 'active' END, \
                context, parent_phase_id, COALESCE(started_at, ?1), completed_at \
         FROM phases",
        [crate::memory::now()],
    )?;
    tracing::info!(rows = adopted, "adopted legacy phase rows");
    Ok(())
}

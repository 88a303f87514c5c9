//! Learnings: append, then drain exactly once.

use rusqlite::{params, Connection};

use crate::db::begin_write;
use crate::error::StoreResult;
use crate::memory::types::Learning;

const LEARNING_COLUMNS: &str = "id, learning_type, content, exported, created_at";

/// Record a learning. Returns its autoincrement id.
pub fn add_learning(conn: &Connection, learning_type: &str, content: &str) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO learnings (learning_type, content, exported, created_at) VALUES (?1, ?2, 0, ?3)",
        params![learning_type, content, super::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Atomically take every unexported learning and mark it exported.
///
/// Select and flip share one IMMEDIATE transaction, so concurrent exporters
/// serialize: each learning is returned by exactly one call, and a loser of the
/// race sees only what was added after the winner committed. The returned rows
/// carry their pre-flip `exported = false`.
pub fn export_learnings(conn: &mut Connection) -> StoreResult<Vec<Learning>> {
    let tx = begin_write(conn)?;

    let pending = {
        let mut stmt = tx.prepare(&format!(
            "SELECT {LEARNING_COLUMNS} FROM learnings WHERE exported = 0 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([], Learning::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    if let Some(max_id) = pending.last().map(|l| l.id) {
        tx.execute(
            "UPDATE learnings SET exported = 1 WHERE exported = 0 AND id <= ?1",
            params![max_id],
        )?;
    }
    tx.commit()?;

    if !pending.is_empty() {
        tracing::info!(count = pending.len(), "learnings exported from store");
    }
    Ok(pending)
}

pub fn pending_learning_count(conn: &Connection) -> StoreResult<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM learnings WHERE exported = 0",
        [],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

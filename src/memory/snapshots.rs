use rusqlite::{params, Connection};

use crate::error::StoreResult;
use crate::memory::types::ContextSnapshot;

const SNAPSHOT_COLUMNS: &str = "id, session_id, snapshot_type, summary, created_at";

/// Append a snapshot and return its new time-ordered id.
pub fn save_snapshot(
    conn: &Connection,
    session_id: &str,
    snapshot_type: &str,
    summary: &str,
) -> StoreResult<String> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO snapshots (id, session_id, snapshot_type, summary, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, session_id, snapshot_type, summary, super::now()],
    )?;

    tracing::info!(snapshot_id = %id, session_id, snapshot_type, "snapshot saved");
    Ok(id)
}

/// Newest snapshots first, optionally for a single session.
pub fn recent_snapshots(
    conn: &Connection,
    session_id: Option<&str>,
    limit: usize,
) -> StoreResult<Vec<ContextSnapshot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM snapshots \
         WHERE ?1 IS NULL OR session_id = ?1 \
         ORDER BY created_at DESC, id DESC LIMIT ?2"
    ))?;
    let snapshots = stmt
        .query_map(params![session_id, limit as i64], ContextSnapshot::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(snapshots)
}

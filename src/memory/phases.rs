//! Work phases: named, optionally nested stretches of work that stay
//! `active` until explicitly completed.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::begin_write;
use crate::error::StoreResult;
use crate::memory::types::{Phase, PhaseStatus};

/// Result of [`phase_complete`].
#[derive(Debug, Serialize)]
pub struct PhaseCompletion {
    pub id: i64,
    /// `false` when the phase was unknown or already completed.
    pub updated: bool,
    pub phase: Option<Phase>,
}

pub fn phase_start(
    conn: &mut Connection,
    name: &str,
    context: Option<&str>,
    parent_id: Option<i64>,
) -> StoreResult<Phase> {
    let now = super::now();
    let tx = begin_write(conn)?;
    tx.execute(
        "INSERT INTO work_phases (name, status, context, parent_id, started_at) \
         VALUES (?1, 'active', ?2, ?3, ?4)",
        params![name, context, parent_id, now],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    tracing::debug!(phase_id = id, phase = name, "phase started");

    Ok(Phase {
        id,
        name: name.to_string(),
        status: PhaseStatus::Active,
        context: context.map(str::to_string),
        parent_id,
        started_at: now,
        completed_at: None,
    })
}

/// Complete an active phase. Completing an unknown or finished phase is a
/// no-op reported as `updated: false`.
pub fn phase_complete(conn: &mut Connection, id: i64) -> StoreResult<PhaseCompletion> {
    let tx = begin_write(conn)?;
    let changed = tx.execute(
        "UPDATE work_phases SET status = 'completed', completed_at = ?1 \
         WHERE id = ?2 AND status = 'active'",
        params![super::now(), id],
    )?;
    let phase = get_phase(&tx, id)?;
    tx.commit()?;

    Ok(PhaseCompletion {
        id,
        updated: changed > 0,
        phase,
    })
}

pub fn get_phase(conn: &Connection, id: i64) -> StoreResult<Option<Phase>> {
    let phase = conn
        .query_row(
            &format!("SELECT {} FROM work_phases WHERE id = ?1", Phase::COLUMNS),
            params![id],
            Phase::from_row,
        )
        .optional()?;
    Ok(phase)
}

/// The `limit` most recently started phases, any status.
pub fn list_phases(conn: &Connection, limit: usize) -> StoreResult<Vec<Phase>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM work_phases ORDER BY id DESC LIMIT ?1",
        Phase::COLUMNS
    ))?;
    let phases = stmt
        .query_map(params![limit as i64], Phase::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(phases)
}

/// Active phases, oldest first so parents precede their children.
pub fn active_phases(conn: &Connection, limit: usize) -> StoreResult<Vec<Phase>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM work_phases WHERE status = 'active' ORDER BY id LIMIT ?1",
        Phase::COLUMNS
    ))?;
    let phases = stmt
        .query_map(params![limit as i64], Phase::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(phases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn start_then_complete() {
        let mut conn = db::open_memory_database().unwrap();
        let phase = phase_start(&mut conn, "schema design", Some("tables first"), None).unwrap();
        assert_eq!(phase.status, PhaseStatus::Active);

        let done = phase_complete(&mut conn, phase.id).unwrap();
        assert!(done.updated);
        let stored = done.phase.unwrap();
        assert_eq!(stored.status, PhaseStatus::Completed);
        assert_eq!(stored.context.as_deref(), Some("tables first"));
        assert!(stored.completed_at.is_some());
    }

    #[test]
    fn completing_twice_or_unknown_is_noop() {
        let mut conn = db::open_memory_database().unwrap();
        let phase = phase_start(&mut conn, "p", None, None).unwrap();
        phase_complete(&mut conn, phase.id).unwrap();

        assert!(!phase_complete(&mut conn, phase.id).unwrap().updated);
        let ghost = phase_complete(&mut conn, 999).unwrap();
        assert!(!ghost.updated);
        assert!(ghost.phase.is_none());
    }

    #[test]
    fn listings_split_active_from_all() {
        let mut conn = db::open_memory_database().unwrap();
        let parent = phase_start(&mut conn, "build", None, None).unwrap();
        let child = phase_start(&mut conn, "tests", None, Some(parent.id)).unwrap();
        let done = phase_start(&mut conn, "spike", None, None).unwrap();
        phase_complete(&mut conn, done.id).unwrap();

        let all: Vec<i64> = list_phases(&conn, 20).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(all, vec![done.id, child.id, parent.id]);

        let active = active_phases(&conn, 20).unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[1].parent_id, Some(parent.id));
    }
}

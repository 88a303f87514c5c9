//! Bounded views of recent store state: the JSON [`DumpReport`] and the
//! plain-text [`dump_compact`].

use rusqlite::Connection;
use serde::Serialize;

use super::learnings::pending_learning_count;
use super::phases::active_phases;
use super::snapshots::recent_snapshots;
use super::store::recent_entries;
use super::tasks::{recent_finished_tasks, running_tasks};
use super::types::{AgentTask, ContextSnapshot, MemoryEntry, Phase};
use super::{single_line, truncate_with_marker};
use crate::error::StoreResult;

pub const DUMP_MAX_ENTRIES: usize = 50;
pub const DUMP_MAX_RUNNING_TASKS: usize = 20;
pub const DUMP_MAX_RECENT_TASKS: usize = 10;
pub const DUMP_MAX_SNAPSHOTS: usize = 5;
pub const DUMP_MAX_SNAPSHOT_CHARS: usize = 500;
pub const DUMP_MAX_PHASES: usize = 20;
pub const COMPACT_MAX_VALUE_CHARS: usize = 200;

#[derive(Debug, Serialize)]
pub struct DumpReport {
    pub entries: Vec<MemoryEntry>,
    pub active_phases: Vec<Phase>,
    pub running_tasks: Vec<AgentTask>,
    pub recent_tasks: Vec<AgentTask>,
    /// Summaries cut to [`DUMP_MAX_SNAPSHOT_CHARS`].
    pub recent_snapshots: Vec<ContextSnapshot>,
    pub pending_learnings: u64,
}

/// Snapshot of recent state, bounded regardless of store size.
pub fn dump(conn: &Connection) -> StoreResult<DumpReport> {
    let recent_snapshots = recent_snapshots(conn, None, DUMP_MAX_SNAPSHOTS)?
        .into_iter()
        .map(|mut s| {
            s.summary = truncate_with_marker(&s.summary, DUMP_MAX_SNAPSHOT_CHARS);
            s
        })
        .collect();

    Ok(DumpReport {
        entries: recent_entries(conn, DUMP_MAX_ENTRIES)?,
        active_phases: active_phases(conn, DUMP_MAX_PHASES)?,
        running_tasks: running_tasks(conn, None, DUMP_MAX_RUNNING_TASKS)?,
        recent_tasks: recent_finished_tasks(conn, DUMP_MAX_RECENT_TASKS)?,
        recent_snapshots,
        pending_learnings: pending_learning_count(conn)?,
    })
}

/// One line per entry and active phase, for pasting into a prompt.
pub fn dump_compact(conn: &Connection) -> StoreResult<String> {
    let entries = recent_entries(conn, DUMP_MAX_ENTRIES)?;
    let phases = active_phases(conn, DUMP_MAX_PHASES)?;

    let mut lines = Vec::new();
    if !entries.is_empty() {
        lines.push("MEMORY:".to_string());
        for entry in &entries {
            lines.push(format!(
                "  {}: {}",
                entry.key,
                truncate_with_marker(&single_line(&entry.value), COMPACT_MAX_VALUE_CHARS)
            ));
        }
    }
    if !phases.is_empty() {
        lines.push("ACTIVE PHASES:".to_string());
        for phase in &phases {
            lines.push(format!("  - {} (#{})", phase.name, phase.id));
        }
    }

    if lines.is_empty() {
        return Ok("No memory state".to_string());
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::memory::{learnings, phases, snapshots, store, tasks};

    #[test]
    fn dump_of_empty_store_is_empty() {
        let conn = db::open_memory_database().unwrap();
        let report = dump(&conn).unwrap();
        assert!(report.entries.is_empty());
        assert!(report.running_tasks.is_empty());
        assert!(report.active_phases.is_empty());
        assert_eq!(report.pending_learnings, 0);
        assert_eq!(dump_compact(&conn).unwrap(), "No memory state");
    }

    #[test]
    fn dump_lists_only_active_phases() {
        let mut conn = db::open_memory_database().unwrap();
        let open = phases::phase_start(&mut conn, "build", None, None).unwrap();
        let closed = phases::phase_start(&mut conn, "spike", None, None).unwrap();
        phases::phase_complete(&mut conn, closed.id).unwrap();

        let report = dump(&conn).unwrap();
        assert_eq!(report.active_phases.len(), 1);
        assert_eq!(report.active_phases[0].id, open.id);
    }

    #[test]
    fn compact_dump_renders_entries_and_phases() {
        let mut conn = db::open_memory_database().unwrap();
        store::set_entry(&mut conn, "auth_decision", "Chose\nJWT", None).unwrap();
        store::set_entry(&mut conn, "blob", &"x".repeat(1000), None).unwrap();
        let phase = phases::phase_start(&mut conn, "build", None, None).unwrap();

        let text = dump_compact(&conn).unwrap();
        assert!(text.starts_with("MEMORY:\n"));
        assert!(text.contains("  auth_decision: Chose JWT"));
        assert!(text.ends_with(&format!("ACTIVE PHASES:\n  - build (#{})", phase.id)));
        let blob = text.lines().find(|l| l.starts_with("  blob: ")).unwrap();
        assert!(blob.chars().count() <= "  blob: ".len() + COMPACT_MAX_VALUE_CHARS);
    }

    #[test]
    fn dump_is_bounded() {
        let mut conn = db::open_memory_database().unwrap();
        for i in 0..(DUMP_MAX_ENTRIES + 25) {
            store::set_entry(&mut conn, &format!("k{i}"), "v", None).unwrap();
        }
        snapshots::save_snapshot(&conn, "s", "manual", &"x".repeat(5000)).unwrap();
        tasks::task_start(&mut conn, "t", "d", None).unwrap();
        learnings::add_learning(&conn, "pattern", "p").unwrap();

        let report = dump(&conn).unwrap();
        assert_eq!(report.entries.len(), DUMP_MAX_ENTRIES);
        assert_eq!(report.running_tasks.len(), 1);
        assert_eq!(report.pending_learnings, 1);
        assert!(report.recent_snapshots[0].summary.chars().count() <= DUMP_MAX_SNAPSHOT_CHARS);
    }
}

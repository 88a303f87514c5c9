//! Core record definitions.
//!
//! [`MemoryEntry`] (key/value state), [`AgentTask`] with its [`TaskStatus`]
//! lifecycle, [`Phase`] (named units of work), [`ContextSnapshot`]
//! (append-only captures), and [`Learning`] (export-once notes).

use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an [`AgentTask`]. Only `Running` may transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
    /// Still running when its session ended.
    Interrupted,
}

impl TaskStatus {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "interrupted" => Ok(Self::Interrupted),
            _ => Err(format!("unknown task status: {s}")),
        }
    }
}

/// A key/value record, matching the `memory_entries` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub key: String,
    pub value: String,
    pub category: String,
    /// RFC 3339 timestamp of the last `set`.
    pub updated_at: String,
}

impl MemoryEntry {
    /// Map a `key, value, category, updated_at` row.
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            value: row.get(1)?,
            category: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }
}

/// A unit of delegated work tracked across hook invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: String,
    pub session_id: Option<String>,
    pub description: String,
    pub status: TaskStatus,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub result: Option<String>,
}

impl AgentTask {
    pub(crate) const COLUMNS: &'static str =
        "id, session_id, description, status, started_at, completed_at, result";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get(3)?;
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            description: row.get(2)?,
            status: status.parse().map_err(|_| {
                rusqlite::Error::InvalidColumnType(3, "status".into(), rusqlite::types::Type::Text)
            })?,
            started_at: row.get(4)?,
            completed_at: row.get(5)?,
            result: row.get(6)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Active,
    Completed,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("unknown phase status: {s}")),
        }
    }
}

/// A named stretch of work. Phases nest through `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: i64,
    pub name: String,
    pub status: PhaseStatus,
    pub context: Option<String>,
    pub parent_id: Option<i64>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

impl Phase {
    pub(crate) const COLUMNS: &'static str =
        "id, name, status, context, parent_id, started_at, completed_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get(2)?;
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            status: status.parse().map_err(|_| {
                rusqlite::Error::InvalidColumnType(2, "status".into(), rusqlite::types::Type::Text)
            })?,
            context: row.get(3)?,
            parent_id: row.get(4)?,
            started_at: row.get(5)?,
            completed_at: row.get(6)?,
        })
    }
}

/// An immutable capture of summarized state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// UUID v7, so ids sort by creation time.
    pub id: String,
    pub session_id: String,
    pub snapshot_type: String,
    /// Opaque payload, usually JSON. Never parsed by the store.
    pub summary: String,
    pub created_at: String,
}

impl ContextSnapshot {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            snapshot_type: row.get(2)?,
            summary: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

/// A note destined for the project's learnings document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learning {
    pub id: i64,
    #[serde(rename = "type")]
    pub learning_type: String,
    pub content: String,
    pub exported: bool,
    pub created_at: String,
}

impl Learning {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            learning_type: row.get(1)?,
            content: row.get(2)?,
            exported: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

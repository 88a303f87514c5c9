//! Key/value entries: upsert, point lookup, listing, and keyword search.

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::begin_write;
use crate::error::StoreResult;
use crate::memory::types::MemoryEntry;

pub const DEFAULT_CATEGORY: &str = "general";

const ENTRY_COLUMNS: &str = "key, value, category, updated_at";

/// Upsert an entry. Last writer wins; category and timestamp are always refreshed.
pub fn set_entry(
    conn: &mut Connection,
    key: &str,
    value: &str,
    category: Option<&str>,
) -> StoreResult<MemoryEntry> {
    let category = category.filter(|c| !c.is_empty()).unwrap_or(DEFAULT_CATEGORY);
    let now = super::now();

    let tx = begin_write(conn)?;
    tx.execute(
        "INSERT INTO memory_entries (key, value, category, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?4) \
         ON CONFLICT(key) DO UPDATE SET \
             value = excluded.value, \
             category = excluded.category, \
             updated_at = excluded.updated_at",
        params![key, value, category, now],
    )?;
    tx.commit()?;

    tracing::debug!(key, category, value_len = value.len(), "entry set");

    Ok(MemoryEntry {
        key: key.to_string(),
        value: value.to_string(),
        category: category.to_string(),
        updated_at: now,
    })
}

/// Fetch one entry. Unknown keys are `None`, not an error.
pub fn get_entry(conn: &Connection, key: &str) -> StoreResult<Option<MemoryEntry>> {
    let entry = conn
        .query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM memory_entries WHERE key = ?1"),
            params![key],
            MemoryEntry::from_row,
        )
        .optional()?;
    Ok(entry)
}

/// All entries, most recently updated first, optionally limited to one category.
pub fn list_entries(conn: &Connection, category: Option<&str>) -> StoreResult<Vec<MemoryEntry>> {
    let entries = match category {
        Some(category) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM memory_entries WHERE category = ?1 \
                 ORDER BY updated_at DESC, key"
            ))?;
            let rows = stmt
                .query_map(params![category], MemoryEntry::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM memory_entries ORDER BY updated_at DESC, key"
            ))?;
            let rows = stmt
                .query_map([], MemoryEntry::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(entries)
}

/// The `limit` most recently updated entries.
pub fn recent_entries(conn: &Connection, limit: usize) -> StoreResult<Vec<MemoryEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM memory_entries ORDER BY updated_at DESC, key LIMIT ?1"
    ))?;
    let entries = stmt
        .query_map(params![limit as i64], MemoryEntry::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Case-sensitive substring search over key, value, and category.
pub fn search_entries(conn: &Connection, query: &str, limit: usize) -> StoreResult<Vec<MemoryEntry>> {
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM memory_entries \
         WHERE instr(key, ?1) > 0 OR instr(value, ?1) > 0 OR instr(category, ?1) > 0 \
         ORDER BY updated_at DESC, key LIMIT ?2"
    ))?;
    let entries = stmt
        .query_map(params![query, limit as i64], MemoryEntry::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

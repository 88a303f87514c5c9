//! Operator commands. Each prints one JSON document on stdout.

pub mod learnings;
pub mod phases;
pub mod status;
pub mod store;
pub mod tasks;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;

use hivemind::config::HivemindConfig;
use hivemind::db;

/// Open (creating if needed) the store of the configured project.
pub fn open_store(config: &HivemindConfig) -> Result<Connection> {
    let path = config.resolved_db_path(None);
    db::open_database(&path, config.storage.busy_timeout_ms)
        .with_context(|| format!("failed to open store: {}", path.display()))
}

pub fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{json}");
    Ok(())
}

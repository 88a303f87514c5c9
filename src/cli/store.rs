use anyhow::Result;
use serde_json::json;

use hivemind::config::HivemindConfig;
use hivemind::db::migrations::get_schema_version;
use hivemind::memory::{dump, store};
use hivemind::statute::{generate_statute, topic_context};

use super::{open_store, print_json};

/// Create the store and schema for the project.
pub fn init(config: &HivemindConfig) -> Result<()> {
    let conn = open_store(config)?;
    print_json(&json!({
        "status": "initialized",
        "db_path": config.resolved_db_path(None),
        "schema_version": get_schema_version(&conn)?,
    }))
}

pub fn set(config: &HivemindConfig, key: &str, value: &str, category: Option<&str>) -> Result<()> {
    let mut conn = open_store(config)?;
    let entry = store::set_entry(&mut conn, key, value, category)?;
    print_json(&entry)
}

/// An unknown key prints `"value": null` rather than failing.
pub fn get(config: &HivemindConfig, key: &str) -> Result<()> {
    let conn = open_store(config)?;
    match store::get_entry(&conn, key)? {
        Some(entry) => print_json(&entry),
        None => print_json(&json!({ "key": key, "value": null })),
    }
}

pub fn list(config: &HivemindConfig, category: Option<&str>) -> Result<()> {
    let conn = open_store(config)?;
    let entries = store::list_entries(&conn, category)?;
    print_json(&json!({ "count": entries.len(), "entries": entries }))
}

pub fn search(config: &HivemindConfig, query: &str, limit: usize) -> Result<()> {
    let conn = open_store(config)?;
    let entries = store::search_entries(&conn, query, limit)?;
    print_json(&json!({ "query": query, "count": entries.len(), "entries": entries }))
}

pub fn dump(config: &HivemindConfig) -> Result<()> {
    let conn = open_store(config)?;
    print_json(&dump::dump(&conn)?)
}

/// Plain-text one-line-per-item dump.
pub fn dump_compact(config: &HivemindConfig) -> Result<()> {
    let conn = open_store(config)?;
    println!("{}", dump::dump_compact(&conn)?);
    Ok(())
}

/// Print the topic block as plain text; nothing when no entry matches.
pub fn context_for(config: &HivemindConfig, topic: &str, max_tokens: usize) -> Result<()> {
    let conn = open_store(config)?;
    let text = topic_context(&conn, topic, max_tokens)?;
    if !text.is_empty() {
        println!("{text}");
    }
    Ok(())
}

/// Print the statute as plain text, as it would be injected.
pub fn statute(config: &HivemindConfig) -> Result<()> {
    let conn = open_store(config)?;
    let text = generate_statute(&conn, &config.statute)?;
    if !text.is_empty() {
        println!("{text}");
    }
    Ok(())
}

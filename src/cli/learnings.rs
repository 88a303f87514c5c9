use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use hivemind::config::HivemindConfig;
use hivemind::export;
use hivemind::memory::learnings;

use super::{open_store, print_json};

pub fn learning_add(config: &HivemindConfig, learning_type: &str, content: &str) -> Result<()> {
    let conn = open_store(config)?;
    let id = learnings::add_learning(&conn, learning_type, content)?;
    print_json(&json!({ "id": id, "type": learning_type, "status": "added" }))
}

/// Drain pending learnings into the project's learnings document.
pub fn learnings_export(config: &HivemindConfig) -> Result<()> {
    let mut conn = open_store(config)?;
    let document = config.learnings_document(None);
    let report = export::export_learnings(&mut conn, &document, Utc::now())?;
    print_json(&report)
}

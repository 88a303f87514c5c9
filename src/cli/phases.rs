use anyhow::Result;
use serde_json::json;

use hivemind::config::HivemindConfig;
use hivemind::memory::phases;

use super::{open_store, print_json};

/// Phases listed by `phase-list`.
const PHASE_LIST_LIMIT: usize = 20;

pub fn phase_start(
    config: &HivemindConfig,
    name: &str,
    context: Option<&str>,
    parent_id: Option<i64>,
) -> Result<()> {
    let mut conn = open_store(config)?;
    let phase = phases::phase_start(&mut conn, name, context, parent_id)?;
    print_json(&phase)
}

pub fn phase_complete(config: &HivemindConfig, id: i64) -> Result<()> {
    let mut conn = open_store(config)?;
    let completion = phases::phase_complete(&mut conn, id)?;
    print_json(&completion)
}

pub fn phase_list(config: &HivemindConfig) -> Result<()> {
    let conn = open_store(config)?;
    let phases = phases::list_phases(&conn, PHASE_LIST_LIMIT)?;
    print_json(&json!({ "count": phases.len(), "phases": phases }))
}

use anyhow::Result;
use serde_json::json;

use hivemind::config::HivemindConfig;
use hivemind::memory::{snapshots, tasks};

use super::{open_store, print_json};

pub fn task_start(
    config: &HivemindConfig,
    id: &str,
    description: &str,
    session_id: Option<&str>,
) -> Result<()> {
    let mut conn = open_store(config)?;
    let task = tasks::task_start(&mut conn, id, description, session_id)?;
    print_json(&task)
}

pub fn task_complete(config: &HivemindConfig, id: &str, result: Option<&str>, failed: bool) -> Result<()> {
    let mut conn = open_store(config)?;
    let completion = tasks::task_complete(&mut conn, id, result, failed)?;
    print_json(&completion)
}

pub fn snapshot_save(
    config: &HivemindConfig,
    session_id: &str,
    snapshot_type: &str,
    summary: &str,
) -> Result<()> {
    let conn = open_store(config)?;
    let id = snapshots::save_snapshot(&conn, session_id, snapshot_type, summary)?;
    print_json(&json!({ "id": id, "session_id": session_id, "snapshot_type": snapshot_type }))
}

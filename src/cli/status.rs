//! CLI `status` command: store diagnostics as JSON.

use anyhow::{Context, Result};
use serde_json::json;

use hivemind::config::HivemindConfig;
use hivemind::db;
use hivemind::watcher::pidfile::read_pid;

use super::print_json;

/// Report store health and watcher liveness. A missing store is reported,
/// not created.
pub fn status(config: &HivemindConfig) -> Result<()> {
    let db_path = config.resolved_db_path(None);
    let pid_file = config.resolved_pid_file();
    let watcher = json!({
        "pid_file": pid_file,
        "pid": read_pid(&pid_file),
    });

    if !db_path.exists() {
        return print_json(&json!({
            "db_path": db_path,
            "exists": false,
            "watcher": watcher,
        }));
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    let conn = db::open_database(&db_path, config.storage.busy_timeout_ms)
        .context("failed to open store (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    if !report.integrity_ok {
        tracing::warn!(details = %report.integrity_details, "store integrity check failed");
    }

    print_json(&json!({
        "db_path": db_path,
        "exists": true,
        "file_size_bytes": file_size,
        "health": report,
        "watcher": watcher,
    }))
}

#![allow(dead_code)]

use hivemind::config::HivemindConfig;
use hivemind::db;
use hivemind::hooks::HookAdapter;
use rusqlite::Connection;
use std::path::Path;

/// Open a fresh in-memory store with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// Config whose fallback project root and watcher PID file live under `root`.
/// Nothing is pinned, so a payload `cwd` still selects the store.
pub fn test_config(root: &Path) -> HivemindConfig {
    let mut config = HivemindConfig::default();
    config.launch_dir = root.to_path_buf();
    config.watcher.pid_file = root.join("watcher.pid").to_string_lossy().into_owned();
    config.watcher.transcripts_dir = root.join("transcripts").to_string_lossy().into_owned();
    config
}

/// Open the on-disk store a hook with `cwd = project` would use.
pub fn project_store(config: &HivemindConfig, project: &Path) -> Connection {
    db::open_database(
        config.resolved_db_path(Some(project)),
        config.storage.busy_timeout_ms,
    )
    .unwrap()
}

/// Run one hook invocation and return (exit code, parsed stdout).
pub fn run_hook(config: &HivemindConfig, event: &str, payload: &str) -> (i32, serde_json::Value) {
    let mut out = Vec::new();
    let code = HookAdapter::new(config).run(event, payload.as_bytes(), &mut out);
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 1, "exactly one JSON line: {text:?}");
    (code, serde_json::from_str(&text).unwrap())
}

/// Payload JSON for a project directory plus extra fields.
pub fn payload(project: &Path, extra: serde_json::Value) -> String {
    let mut value = serde_json::json!({
        "session_id": "sess-1",
        "cwd": project,
    });
    if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    value.to_string()
}

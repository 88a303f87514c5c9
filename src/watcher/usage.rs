//! Usage extraction from the tail of a JSONL transcript.

use serde_json::Value;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Bytes read from the end of a transcript per poll.
pub const TAIL_BYTES: u64 = 256 * 1024;

/// What the newest lines of a transcript say about its session.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TranscriptTail {
    /// Context tokens reported by the latest usage record, 0 if none.
    pub usage_tokens: u64,
    pub session_id: Option<String>,
    pub cwd: Option<PathBuf>,
}

/// Read at most `max_bytes` from the end of `path`. A leading partial line is
/// dropped when the read did not start at offset 0.
pub fn read_tail(path: &Path, max_bytes: u64) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(max_bytes);
    file.seek(SeekFrom::Start(start))?;

    let mut buf = Vec::with_capacity((len - start) as usize);
    file.take(max_bytes).read_to_end(&mut buf)?;
    let text = String::from_utf8_lossy(&buf).into_owned();

    if start == 0 {
        return Ok(text);
    }
    Ok(match text.find('\n') {
        Some(pos) => text[pos + 1..].to_string(),
        None => String::new(),
    })
}

/// Scan lines newest first. Malformed lines are skipped.
pub fn parse_tail(text: &str) -> TranscriptTail {
    let mut tail = TranscriptTail::default();
    let mut usage_found = false;

    for line in text.lines().rev() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(record) = serde_json::from_str::<Value>(line) else {
            continue;
        };

        if !usage_found {
            if let Some(tokens) = usage_tokens(&record) {
                tail.usage_tokens = tokens;
                usage_found = true;
            }
        }
        if tail.session_id.is_none() {
            tail.session_id = string_field(&record, &["sessionId", "session_id"]);
        }
        if tail.cwd.is_none() {
            tail.cwd = string_field(&record, &["cwd"]).map(PathBuf::from);
        }
        if usage_found && tail.session_id.is_some() && tail.cwd.is_some() {
            break;
        }
    }
    tail
}

/// Context tokens of one record: `message.usage` or top-level `usage`,
/// summing fresh input and both cache counters.
pub fn usage_tokens(record: &Value) -> Option<u64> {
    let usage = record
        .pointer("/message/usage")
        .or_else(|| record.get("usage"))
        .filter(|u| u.is_object())?;
    let count = |name: &str| usage.get(name).and_then(Value::as_u64).unwrap_or(0);
    Some(
        count("input_tokens")
            .saturating_add(count("cache_creation_input_tokens"))
            .saturating_add(count("cache_read_input_tokens")),
    )
}

fn string_field(record: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| record.get(*name).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

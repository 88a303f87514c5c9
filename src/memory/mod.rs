//! The memory store proper: key/value entries, tasks, phases, snapshots,
//! learnings, and the bounded diagnostic dump.

pub mod dump;
pub mod learnings;
pub mod phases;
pub mod snapshots;
pub mod store;
pub mod tasks;
pub mod types;

use chrono::SecondsFormat;

/// Appended wherever text is cut to a budget.
pub const TRUNCATION_MARKER: &str = "…[truncated]";

/// Current UTC time as fixed-width RFC 3339, so string order is time order.
pub fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Cut `text` to at most `max_chars` characters, marker included.
pub fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_len {
        return text.chars().take(max_chars).collect();
    }
    let mut out: String = text.chars().take(max_chars - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Collapse whitespace runs, newlines included, to single spaces.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

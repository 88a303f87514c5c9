//! Statute: the bounded text digest injected into the host's context.
//!
//! Built from the most recently updated entries, the active phases, and the
//! most recently finished tasks. Every field is truncated to its own budget and the whole digest is
//! hard-capped, so output size never depends on store size. An empty store
//! yields an empty string, which callers treat as "inject nothing".
//!
//! [`topic_context`] renders the same kind of block for entries matching a
//! topic, budgeted in estimated tokens.

use rusqlite::Connection;

use crate::config::StatuteConfig;
use crate::error::StoreResult;
use crate::memory::phases::active_phases;
use crate::memory::store::{recent_entries, search_entries};
use crate::memory::tasks::recent_finished_tasks;
use crate::memory::types::{AgentTask, MemoryEntry, Phase};
use crate::memory::{single_line, truncate_with_marker};

/// Entries considered for a topic block.
pub const TOPIC_MAX_RESULTS: usize = 10;
/// Per-value cut inside a topic block.
pub const TOPIC_MAX_VALUE_CHARS: usize = 500;
pub const TOPIC_DEFAULT_MAX_TOKENS: usize = 2000;
/// Rough characters per token for budgeting.
const CHARS_PER_TOKEN: usize = 4;

/// Read the store and render the digest.
pub fn generate_statute(conn: &Connection, config: &StatuteConfig) -> StoreResult<String> {
    let entries = recent_entries(conn, config.max_entries)?;
    let phases = active_phases(conn, config.max_phases)?;
    let tasks = recent_finished_tasks(conn, config.max_tasks)?;
    Ok(render_statute(&entries, &phases, &tasks, config))
}

pub fn render_statute(
    entries: &[MemoryEntry],
    phases: &[Phase],
    tasks: &[AgentTask],
    config: &StatuteConfig,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    if !entries.is_empty() {
        lines.push("State:".into());
        for entry in entries.iter().take(config.max_entries) {
            lines.push(format!(
                "- {} [{}]: {}",
                truncate_with_marker(&entry.key, config.max_key_chars),
                truncate_with_marker(&entry.category, config.max_key_chars),
                truncate_with_marker(&single_line(&entry.value), config.max_value_chars),
            ));
        }
    }

    if !phases.is_empty() {
        lines.push("Active phases:".into());
        for phase in phases.iter().take(config.max_phases) {
            let mut line = format!("- #{} {}", phase.id, truncate_with_marker(&phase.name, config.max_key_chars));
            if let Some(context) = phase.context.as_deref().filter(|c| !c.is_empty()) {
                line.push_str(": ");
                line.push_str(&truncate_with_marker(&single_line(context), config.max_value_chars));
            }
            lines.push(line);
        }
    }

    if !tasks.is_empty() {
        lines.push("Recent tasks:".into());
        for task in tasks.iter().take(config.max_tasks) {
            let mut line = format!(
                "- {} ({}): {}",
                truncate_with_marker(&task.id, config.max_key_chars),
                task.status,
                truncate_with_marker(&single_line(&task.description), config.max_value_chars),
            );
            if let Some(result) = task.result.as_deref().filter(|r| !r.is_empty()) {
                line.push_str(" => ");
                line.push_str(&truncate_with_marker(&single_line(result), config.max_value_chars));
            }
            lines.push(line);
        }
    }

    truncate_with_marker(&lines.join("\n"), config.max_chars)
}

/// Entries matching `topic`, newest first, until the token budget runs out.
/// No match yields an empty string.
pub fn topic_context(conn: &Connection, topic: &str, max_tokens: usize) -> StoreResult<String> {
    let entries = search_entries(conn, topic, TOPIC_MAX_RESULTS)?;
    Ok(render_topic_context(topic, &entries, max_tokens))
}

pub fn render_topic_context(topic: &str, entries: &[MemoryEntry], max_tokens: usize) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let budget = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    let heading = format!("Relevant memory: {}", single_line(topic));
    let mut used = heading.chars().count();
    let mut lines = vec![heading];

    for entry in entries {
        let line = format!(
            "- {} [{}]: {}",
            entry.key,
            entry.category,
            truncate_with_marker(&single_line(&entry.value), TOPIC_MAX_VALUE_CHARS)
        );
        let cost = line.chars().count() + 1;
        if used + cost > budget {
            break;
        }
        used += cost;
        lines.push(line);
    }

    if lines.len() == 1 {
        return String::new();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::{PhaseStatus, TaskStatus};

    fn entry(key: &str, value: &str) -> MemoryEntry {
        MemoryEntry {
            key: key.into(),
            value: value.into(),
            category: "general".into(),
            updated_at: "2026-01-01T00:00:00.000000Z".into(),
        }
    }

    fn finished(id: &str, result: Option<&str>) -> AgentTask {
        AgentTask {
            id: id.into(),
            session_id: None,
            description: "Refactor db layer".into(),
            status: TaskStatus::Completed,
            started_at: "2026-01-01T00:00:00.000000Z".into(),
            completed_at: Some("2026-01-01T00:01:00.000000Z".into()),
            result: result.map(str::to_string),
        }
    }

    #[test]
    fn empty_input_renders_empty_string() {
        assert_eq!(render_statute(&[], &[], &[], &StatuteConfig::default()), "");
    }

    #[test]
    fn sections_are_labeled() {
        let out = render_statute(
            &[entry("auth_decision", "Chose JWT")],
            &[],
            &[finished("t1", Some("done, 3 files changed"))],
            &StatuteConfig::default(),
        );
        assert_eq!(
            out,
            "State:\n- auth_decision [general]: Chose JWT\n\
             Recent tasks:\n- t1 (completed): Refactor db layer => done, 3 files changed"
        );
    }

    #[test]
    fn active_phases_sit_between_state_and_tasks() {
        let phase = Phase {
            id: 3,
            name: "migration".into(),
            status: PhaseStatus::Active,
            context: Some("move to\nWAL".into()),
            parent_id: None,
            started_at: "2026-01-01T00:00:00.000000Z".into(),
            completed_at: None,
        };
        let out = render_statute(
            &[entry("k", "v")],
            &[phase],
            &[finished("t1", None)],
            &StatuteConfig::default(),
        );
        assert_eq!(
            out,
            "State:\n- k [general]: v\n\
             Active phases:\n- #3 migration: move to WAL\n\
             Recent tasks:\n- t1 (completed): Refactor db layer"
        );
    }

    #[test]
    fn topic_context_respects_token_budget() {
        let entries: Vec<_> = (0..10)
            .map(|i| entry(&format!("auth_{i}"), &"token rotation ".repeat(20)))
            .collect();

        let full = render_topic_context("auth", &entries, TOPIC_DEFAULT_MAX_TOKENS);
        assert!(full.starts_with("Relevant memory: auth\n- auth_0 [general]: "));
        assert_eq!(full.lines().count(), 11);

        let tight = render_topic_context("auth", &entries, 200);
        assert!(tight.chars().count() <= 200 * 4);
        assert!(tight.lines().count() < 11);
        assert!(tight.lines().count() > 1);
    }

    #[test]
    fn topic_context_without_room_or_matches_is_empty() {
        assert_eq!(render_topic_context("auth", &[], 2000), "");
        assert_eq!(render_topic_context("auth", &[entry("auth", &"x".repeat(400))], 10), "");
    }

    #[test]
    fn long_values_carry_marker() {
        let config = StatuteConfig::default();
        let out = render_statute(&[entry("k", &"v".repeat(1000))], &[], &[], &config);
        assert!(out.contains(crate::memory::TRUNCATION_MARKER));
        assert!(out.chars().count() < config.max_value_chars + 32);
    }

    #[test]
    fn multiline_values_are_flattened() {
        let out = render_statute(&[entry("k", "line one\nline two")], &[], &[], &StatuteConfig::default());
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn whole_digest_is_capped() {
        let config = StatuteConfig {
            max_chars: 100,
            ..StatuteConfig::default()
        };
        let entries: Vec<_> = (0..15).map(|i| entry(&format!("key{i}"), "value")).collect();
        let out = render_statute(&entries, &[], &[], &config);
        assert_eq!(out.chars().count(), 100);
    }
}

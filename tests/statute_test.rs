mod helpers;

use hivemind::config::StatuteConfig;
use hivemind::memory::phases::{phase_complete, phase_start};
use hivemind::memory::store::set_entry;
use hivemind::memory::tasks::{task_complete, task_start};
use hivemind::statute::{generate_statute, topic_context};

#[test]
fn empty_store_yields_empty_statute() {
    let conn = helpers::test_db();
    assert_eq!(generate_statute(&conn, &StatuteConfig::default()).unwrap(), "");
}

#[test]
fn statute_stays_bounded_for_large_store() {
    let mut conn = helpers::test_db();
    {
        let tx = conn.transaction().unwrap();
        for i in 0..10_000 {
            tx.execute(
                "INSERT INTO memory_entries (key, value, category, created_at, updated_at) \
                 VALUES (?1, ?2, 'general', ?3, ?3)",
                rusqlite::params![
                    format!("key-{i:05}"),
                    "x".repeat(500),
                    format!("2026-01-01T00:00:00.{i:06}Z")
                ],
            )
            .unwrap();
        }
        tx.commit().unwrap();
    }
    for i in 0..20 {
        let id = format!("task-{i}");
        task_start(&mut conn, &id, &"long description ".repeat(40), None).unwrap();
        task_complete(&mut conn, &id, Some(&"result ".repeat(100)), false).unwrap();
    }

    let config = StatuteConfig::default();
    let statute = generate_statute(&conn, &config).unwrap();
    assert!(statute.chars().count() <= config.max_chars);
    assert!(statute.contains("key-09999"), "newest entry leads");
    assert!(!statute.contains("key-00000"));
}

#[test]
fn statute_reflects_latest_value() {
    let mut conn = helpers::test_db();
    set_entry(&mut conn, "db", "postgres", None).unwrap();
    set_entry(&mut conn, "db", "sqlite", None).unwrap();

    let statute = generate_statute(&conn, &StatuteConfig::default()).unwrap();
    assert!(statute.contains("db [general]: sqlite"));
    assert!(!statute.contains("postgres"));
}

#[test]
fn statute_shows_only_active_phases() {
    let mut conn = helpers::test_db();
    let build = phase_start(&mut conn, "build", Some("wire the hook adapter"), None).unwrap();
    let spike = phase_start(&mut conn, "spike", None, None).unwrap();
    phase_complete(&mut conn, spike.id).unwrap();

    let statute = generate_statute(&conn, &StatuteConfig::default()).unwrap();
    assert!(statute.contains(&format!("Active phases:\n- #{} build: wire the hook adapter", build.id)));
    assert!(!statute.contains("spike"));
}

#[test]
fn topic_context_selects_matching_entries() {
    let mut conn = helpers::test_db();
    set_entry(&mut conn, "auth_decision", "Chose JWT", Some("decision")).unwrap();
    set_entry(&mut conn, "db_choice", "sqlite", Some("decision")).unwrap();
    set_entry(&mut conn, "session_store", "redis for auth sessions", None).unwrap();

    let text = topic_context(&conn, "auth", 2000).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Relevant memory: auth");
    assert!(lines.contains(&"- session_store [general]: redis for auth sessions"));
    assert!(lines.contains(&"- auth_decision [decision]: Chose JWT"));
    assert!(!text.contains("db_choice"));
    assert_eq!(topic_context(&conn, "kubernetes", 2000).unwrap(), "");
}

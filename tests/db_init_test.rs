mod helpers;

use hivemind::db;
use hivemind::db::migrations::CURRENT_SCHEMA_VERSION;
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join(".hivemind").join("memory.db");
    assert!(!db_path.exists());

    let conn = db::open_database(&db_path, 5000).unwrap();
    assert!(db_path.exists());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM memory_entries", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn busy_timeout_and_wal_are_set() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("test.db"), 5000).unwrap();

    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);

    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .unwrap();
    assert_eq!(mode, "wal");
}

#[test]
fn reopening_keeps_data() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("test.db");
    {
        let mut conn = db::open_database(&path, 5000).unwrap();
        hivemind::memory::store::set_entry(&mut conn, "k", "v", None).unwrap();
    }
    let conn = db::open_database(&path, 5000).unwrap();
    let entry = hivemind::memory::store::get_entry(&conn, "k").unwrap().unwrap();
    assert_eq!(entry.value, "v");
}

#[test]
fn health_check_passes_on_fresh_db() {
    let conn = helpers::test_db();
    let report = db::check_database_health(&conn).unwrap();
    assert!(report.integrity_ok);
    assert_eq!(report.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(report.entry_count, 0);
    assert_eq!(report.running_tasks, 0);
    assert_eq!(report.pending_learnings, 0);
}

#[test]
fn unopenable_path_is_unavailable() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();

    let err = db::open_database(blocker.join("memory.db"), 5000).unwrap_err();
    assert_eq!(err.kind(), "store_unavailable");
}

#[test]
fn open_and_read_proceed_while_writer_holds_lock() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("memory.db");
    let mut holder = db::open_database(&path, 300).unwrap();
    hivemind::memory::store::set_entry(&mut holder, "k", "v", None).unwrap();
    let write = db::begin_write(&mut holder).unwrap();
    write
        .execute("UPDATE memory_entries SET value = 'pending'", [])
        .unwrap();

    let reader = db::open_database(&path, 300).unwrap();
    let entry = hivemind::memory::store::get_entry(&reader, "k").unwrap().unwrap();
    assert_eq!(entry.value, "v", "readers see the last committed value");
    assert_eq!(hivemind::memory::store::list_entries(&reader, None).unwrap().len(), 1);
    hivemind::statute::generate_statute(&reader, &Default::default()).unwrap();
    db::check_database_health(&reader).unwrap();
}

#[test]
fn outdated_schema_is_upgraded_on_open() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("memory.db");
    {
        let conn = db::open_database(&path, 5000).unwrap();
        conn.execute("UPDATE schema_meta SET value = '1' WHERE key = 'schema_version'", [])
            .unwrap();
    }
    let conn = db::open_database(&path, 5000).unwrap();
    assert_eq!(
        db::migrations::get_schema_version(&conn).unwrap(),
        CURRENT_SCHEMA_VERSION
    );
}

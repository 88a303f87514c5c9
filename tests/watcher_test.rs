mod helpers;

use hivemind::memory::snapshots::recent_snapshots;
use hivemind::watcher::pidfile::{PidLock, PidLockStatus};
use hivemind::watcher::{
    ContextWatcher, FsPollSource, Notifier, Observation, PollSource, SnapshotSink, StoreSink, Tier,
};
use std::cell::{Cell, RefCell};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingSink {
    snapshots: RefCell<Vec<(String, String)>>,
}

impl SnapshotSink for RecordingSink {
    fn snapshot(&self, obs: &Observation, snapshot_type: &str, _summary: &str) -> anyhow::Result<String> {
        self.snapshots
            .borrow_mut()
            .push((obs.session_id.clone(), snapshot_type.to_string()));
        Ok(format!("snap-{}", self.snapshots.borrow().len()))
    }
}

#[derive(Default)]
struct CountingNotifier {
    calls: Cell<usize>,
}

impl Notifier for CountingNotifier {
    fn notify(&self, _obs: &Observation, _tier: Tier, _ratio: f64) {
        self.calls.set(self.calls.get() + 1);
    }
}

/// Capacity 200k, so 1% is 2000 tokens.
fn append_usage(path: &Path, cwd: &Path, pct: u64) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    let record = serde_json::json!({
        "sessionId": "sess-1",
        "cwd": cwd,
        "message": { "usage": { "input_tokens": pct * 1000, "cache_read_input_tokens": pct * 1000 } },
    });
    writeln!(file, "{record}").unwrap();
}

/// Observation straight from the file, bypassing the mtime filter.
fn observe_file(path: &Path) -> Observation {
    let mut source = FsPollSource::new(path.parent().unwrap(), Duration::from_secs(900));
    source
        .poll()
        .unwrap()
        .into_iter()
        .find(|o| o.path == path)
        .unwrap()
}

fn setup() -> (TempDir, ContextWatcher, std::path::PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config = helpers::test_config(tmp.path());
    let transcripts = config.resolved_transcripts_dir();
    std::fs::create_dir_all(&transcripts).unwrap();
    let watcher = ContextWatcher::new(&config.watcher);
    (tmp, watcher, transcripts.join("sess-1.jsonl"))
}

#[test]
fn usage_below_critical_takes_no_snapshot() {
    let (tmp, mut watcher, log) = setup();
    let sink = RecordingSink::default();
    let notifier = CountingNotifier::default();

    append_usage(&log, tmp.path(), 76);
    let fired = watcher.observe(&observe_file(&log), &sink, &notifier);

    assert_eq!(fired, Some(Tier::Warn));
    assert!(sink.snapshots.borrow().is_empty());
    assert_eq!(notifier.calls.get(), 0);
}

#[test]
fn critical_usage_snapshots_once_and_notifies_once() {
    let (tmp, mut watcher, log) = setup();
    let sink = RecordingSink::default();
    let notifier = CountingNotifier::default();

    append_usage(&log, tmp.path(), 91);
    watcher.observe(&observe_file(&log), &sink, &notifier);
    watcher.observe(&observe_file(&log), &sink, &notifier);

    assert_eq!(
        *sink.snapshots.borrow(),
        vec![("sess-1".to_string(), "critical".to_string())]
    );
    assert_eq!(notifier.calls.get(), 1);
}

#[test]
fn oscillating_usage_yields_one_snapshot() {
    let (tmp, mut watcher, log) = setup();
    let sink = RecordingSink::default();
    let notifier = CountingNotifier::default();

    for pct in [85, 91, 88, 93, 89, 95, 90] {
        append_usage(&log, tmp.path(), pct);
        watcher.observe(&observe_file(&log), &sink, &notifier);
    }

    assert_eq!(sink.snapshots.borrow().len(), 1);
    assert_eq!(notifier.calls.get(), 1);
}

#[test]
fn replaced_transcript_rearms_critical() {
    let (tmp, mut watcher, log) = setup();
    let sink = RecordingSink::default();
    let notifier = CountingNotifier::default();

    append_usage(&log, tmp.path(), 91);
    append_usage(&log, tmp.path(), 92);
    watcher.observe(&observe_file(&log), &sink, &notifier);

    std::fs::remove_file(&log).unwrap();
    append_usage(&log, tmp.path(), 95);
    watcher.observe(&observe_file(&log), &sink, &notifier);

    assert_eq!(sink.snapshots.borrow().len(), 2);
}

#[test]
fn tick_polls_source_and_skips_unchanged_files() {
    let (tmp, mut watcher, log) = setup();
    let sink = RecordingSink::default();
    let notifier = CountingNotifier::default();
    let mut source = FsPollSource::new(log.parent().unwrap(), Duration::from_secs(900));

    append_usage(&log, tmp.path(), 91);
    let fired = watcher.tick(&mut source, &sink, &notifier).unwrap();
    assert_eq!(fired, vec![("sess-1".to_string(), Tier::Critical)]);

    assert!(watcher.tick(&mut source, &sink, &notifier).unwrap().is_empty());
}

#[test]
fn sidechain_transcript_shares_session_dedupe() {
    let (tmp, mut watcher, log) = setup();
    let sidechain = log.with_file_name("agent-a1b2.jsonl");
    let sink = RecordingSink::default();
    let notifier = CountingNotifier::default();
    let mut source = FsPollSource::new(log.parent().unwrap(), Duration::from_secs(900));

    for _ in 0..5 {
        append_usage(&log, tmp.path(), 95);
        append_usage(&sidechain, tmp.path(), 95);
        watcher.tick(&mut source, &sink, &notifier).unwrap();
        // Let the next append land on a later mtime.
        std::thread::sleep(Duration::from_millis(20));
    }

    assert_eq!(sink.snapshots.borrow().len(), 1);
    assert_eq!(notifier.calls.get(), 1);
    assert_eq!(watcher.tracked_sessions(), 1);
}

#[test]
fn store_sink_writes_to_transcript_project() {
    let (tmp, mut watcher, log) = setup();
    let project = tmp.path().join("project");
    std::fs::create_dir_all(&project).unwrap();
    let config = helpers::test_config(tmp.path());
    let notifier = CountingNotifier::default();

    append_usage(&log, &project, 91);
    watcher.observe(&observe_file(&log), &StoreSink::new(&config), &notifier);

    let conn = helpers::project_store(&config, &project);
    let snaps = recent_snapshots(&conn, Some("sess-1"), 10).unwrap();
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].snapshot_type, "critical");
    assert_eq!(notifier.calls.get(), 1);
}

#[test]
fn second_watcher_is_refused_while_first_runs() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("watcher.pid");

    let first = PidLock::acquire(&path).unwrap();
    assert!(matches!(first, PidLockStatus::Acquired(_)));

    match PidLock::acquire(&path).unwrap() {
        PidLockStatus::HeldBy { pid } => assert_eq!(pid, Some(std::process::id())),
        PidLockStatus::Acquired(_) => panic!("second holder must be refused"),
    }

    drop(first);
    assert!(!path.exists(), "pid file removed on shutdown");
    assert!(matches!(PidLock::acquire(&path).unwrap(), PidLockStatus::Acquired(_)));
}

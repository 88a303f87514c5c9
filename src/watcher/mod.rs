//! Context watcher: the long-lived poller that snapshots before compaction.
//!
//! The host's own pre-compaction signal is unreliable, so the watcher
//! estimates context usage from transcript tails and takes a `critical`
//! snapshot itself once usage crosses the critical ratio. Each tier fires at
//! most once per session until the transcript is rotated.

pub mod pidfile;
pub mod source;
pub mod usage;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::config::{HivemindConfig, WatcherConfig};
use crate::db;
use crate::memory::dump::dump;
use crate::memory::snapshots::save_snapshot;
use pidfile::{PidLock, PidLockStatus};
pub use source::{Fingerprint, FsPollSource, Observation, PollSource};

/// Usage band gating watcher side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Warn,
    Critical,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Warn => "warn",
            Tier::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination of threshold snapshots.
pub trait SnapshotSink {
    /// Persist a snapshot for the observed session and return its id.
    fn snapshot(&self, observation: &Observation, snapshot_type: &str, summary: &str) -> Result<String>;
}

/// User-facing side effect of a critical crossing.
pub trait Notifier {
    fn notify(&self, observation: &Observation, tier: Tier, ratio: f64);
}

/// Notifies through the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, observation: &Observation, tier: Tier, ratio: f64) {
        tracing::warn!(
            session_id = %observation.session_id,
            tier = %tier,
            usage_pct = %format!("{:.1}", ratio * 100.0),
            "context nearly full, state snapshot saved"
        );
    }
}

/// Writes snapshots to the store of the project the transcript belongs to.
pub struct StoreSink<'a> {
    config: &'a HivemindConfig,
}

impl<'a> StoreSink<'a> {
    pub fn new(config: &'a HivemindConfig) -> Self {
        Self { config }
    }
}

impl SnapshotSink for StoreSink<'_> {
    fn snapshot(&self, observation: &Observation, snapshot_type: &str, summary: &str) -> Result<String> {
        let path = self.config.resolved_db_path(observation.cwd.as_deref());
        let conn = db::open_database(&path, self.config.storage.busy_timeout_ms)
            .with_context(|| format!("failed to open store: {}", path.display()))?;

        let state = serde_json::to_value(dump(&conn)?)?;
        let payload = serde_json::json!({
            "summary": summary,
            "transcript_path": observation.path,
            "usage_tokens": observation.usage_tokens,
            "state": state,
        });
        let id = save_snapshot(&conn, &observation.session_id, snapshot_type, &payload.to_string())?;
        Ok(id)
    }
}

/// Fired tiers of one session. A session can own several transcripts (the
/// main log plus sidechains), so rotation is judged per file.
#[derive(Debug)]
struct SessionState {
    transcripts: HashMap<PathBuf, Fingerprint>,
    warn_fired: bool,
    critical_fired: bool,
    last_modified: SystemTime,
}

impl SessionState {
    fn new(modified: SystemTime) -> Self {
        Self {
            transcripts: HashMap::new(),
            warn_fired: false,
            critical_fired: false,
            last_modified: modified,
        }
    }
}

/// Threshold state machine over a stream of observations.
pub struct ContextWatcher {
    capacity_tokens: u64,
    warn_threshold: f64,
    critical_threshold: f64,
    recent_window: Duration,
    sessions: HashMap<String, SessionState>,
}

impl ContextWatcher {
    pub fn new(config: &WatcherConfig) -> Self {
        Self {
            capacity_tokens: config.context_capacity_tokens,
            warn_threshold: config.warn_threshold,
            critical_threshold: config.critical_threshold,
            recent_window: Duration::from_secs(config.recent_window_secs),
            sessions: HashMap::new(),
        }
    }

    /// Apply one observation. Returns the tier that newly fired, if any.
    pub fn observe(
        &mut self,
        observation: &Observation,
        sink: &dyn SnapshotSink,
        notifier: &dyn Notifier,
    ) -> Option<Tier> {
        if self.capacity_tokens == 0 {
            return None;
        }
        let ratio = observation.usage_tokens as f64 / self.capacity_tokens as f64;

        let state = self
            .sessions
            .entry(observation.session_id.clone())
            .or_insert_with(|| SessionState::new(observation.modified));
        let previous = state
            .transcripts
            .insert(observation.path.clone(), observation.fingerprint);
        if previous.is_some_and(|fp| observation.fingerprint.is_rotation_of(&fp)) {
            tracing::info!(
                session_id = %observation.session_id,
                path = %observation.path.display(),
                "transcript rotated, resetting tiers"
            );
            state.warn_fired = false;
            state.critical_fired = false;
        }
        state.last_modified = state.last_modified.max(observation.modified);

        if ratio >= self.critical_threshold && !state.critical_fired {
            let summary = format!(
                "context usage at {:.1}% ({} of {} tokens)",
                ratio * 100.0,
                observation.usage_tokens,
                self.capacity_tokens
            );
            return match sink.snapshot(observation, Tier::Critical.as_str(), &summary) {
                Ok(snapshot_id) => {
                    tracing::info!(
                        session_id = %observation.session_id,
                        snapshot_id = %snapshot_id,
                        "critical snapshot saved"
                    );
                    state.critical_fired = true;
                    state.warn_fired = true;
                    notifier.notify(observation, Tier::Critical, ratio);
                    Some(Tier::Critical)
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %observation.session_id,
                        error = %e,
                        "critical snapshot failed, will retry next poll"
                    );
                    None
                }
            };
        }

        if ratio >= self.warn_threshold && !state.warn_fired {
            tracing::info!(
                session_id = %observation.session_id,
                usage_pct = %format!("{:.1}", ratio * 100.0),
                "context usage crossed warn threshold"
            );
            state.warn_fired = true;
            return Some(Tier::Warn);
        }
        None
    }

    /// Poll once and apply every observation. Returns the tiers that fired.
    pub fn tick(
        &mut self,
        source: &mut dyn PollSource,
        sink: &dyn SnapshotSink,
        notifier: &dyn Notifier,
    ) -> Result<Vec<(String, Tier)>> {
        let observations = source.poll()?;
        let fired = observations
            .iter()
            .filter_map(|obs| {
                self.observe(obs, sink, notifier)
                    .map(|tier| (obs.session_id.clone(), tier))
            })
            .collect();
        self.prune(SystemTime::now());
        Ok(fired)
    }

    /// Forget sessions whose transcripts have not changed within the recent
    /// window. The poll source stops reporting them at the same age.
    pub fn prune(&mut self, now: SystemTime) {
        let window = self.recent_window;
        self.sessions
            .retain(|_, state| now.duration_since(state.last_modified).unwrap_or_default() <= window);
    }

    /// Number of sessions with tier state.
    pub fn tracked_sessions(&self) -> usize {
        self.sessions.len()
    }
}

/// Run the watcher until SIGINT or SIGTERM. Returns immediately if another
/// instance holds the PID lock.
pub async fn run_watcher(config: &HivemindConfig) -> Result<()> {
    let pid_path = config.resolved_pid_file();
    let _lock = match PidLock::acquire(&pid_path)? {
        PidLockStatus::Acquired(lock) => lock,
        PidLockStatus::HeldBy { pid } => {
            tracing::info!(pid_file = %pid_path.display(), ?pid, "watcher already running");
            return Ok(());
        }
    };

    let transcripts = config.resolved_transcripts_dir();
    let interval = Duration::from_secs(config.watcher.poll_interval_secs.max(1));
    let mut source = FsPollSource::new(
        &transcripts,
        Duration::from_secs(config.watcher.recent_window_secs),
    );
    let sink = StoreSink::new(config);
    let notifier = LogNotifier;
    let mut watcher = ContextWatcher::new(&config.watcher);
    let mut shutdown = Shutdown::install()?;

    tracing::info!(
        transcripts = %transcripts.display(),
        interval_secs = interval.as_secs(),
        "watcher started"
    );

    loop {
        match watcher.tick(&mut source, &sink, &notifier) {
            Ok(fired) if !fired.is_empty() => tracing::debug!(fired = fired.len(), "tick complete"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "poll failed"),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            signal = shutdown.recv() => {
                tracing::info!(signal, "watcher shutting down");
                break;
            }
        }
    }
    Ok(())
}

/// SIGINT and SIGTERM as one stream.
struct Shutdown {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl Shutdown {
    fn install() -> Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            sigterm: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("failed to install SIGTERM handler")?,
        })
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        let _ = tokio::signal::ctrl_c().await;
        "SIGINT"
    }
}

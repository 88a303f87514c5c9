//! Poll sources: where the watcher's observations come from.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::usage::{parse_tail, read_tail, TAIL_BYTES};

/// Identity of a transcript file between polls. A different inode or a
/// shorter length means the file was rotated or replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fingerprint {
    pub inode: u64,
    pub len: u64,
}

impl Fingerprint {
    pub fn of(metadata: &std::fs::Metadata) -> Self {
        Self {
            inode: inode(metadata),
            len: metadata.len(),
        }
    }

    pub fn is_rotation_of(&self, previous: &Fingerprint) -> bool {
        self.inode != previous.inode || self.len < previous.len
    }
}

#[cfg(unix)]
fn inode(metadata: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn inode(_metadata: &std::fs::Metadata) -> u64 {
    0
}

/// One transcript's state at poll time.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub session_id: String,
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    pub modified: SystemTime,
    pub usage_tokens: u64,
    /// Project directory recorded in the transcript, if any.
    pub cwd: Option<PathBuf>,
}

/// Yields observations of transcripts that changed since the last poll.
pub trait PollSource {
    fn poll(&mut self) -> anyhow::Result<Vec<Observation>>;
}

/// Scans `*.jsonl` files under a directory tree.
pub struct FsPollSource {
    root: PathBuf,
    recent_window: Duration,
    max_depth: usize,
    /// Last mtime seen per file.
    last_checked: HashMap<PathBuf, SystemTime>,
}

impl FsPollSource {
    pub const MAX_DEPTH: usize = 3;

    pub fn new(root: impl Into<PathBuf>, recent_window: Duration) -> Self {
        Self {
            root: root.into(),
            recent_window,
            max_depth: Self::MAX_DEPTH,
            last_checked: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn observe_file(&self, path: &Path, metadata: &std::fs::Metadata, modified: SystemTime) -> Observation {
        let tail = match read_tail(path, TAIL_BYTES) {
            Ok(text) => parse_tail(&text),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "failed to read transcript tail");
                Default::default()
            }
        };
        let session_id = tail.session_id.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        Observation {
            session_id,
            path: path.to_path_buf(),
            fingerprint: Fingerprint::of(metadata),
            modified,
            usage_tokens: tail.usage_tokens,
            cwd: tail.cwd,
        }
    }
}

impl PollSource for FsPollSource {
    fn poll(&mut self) -> anyhow::Result<Vec<Observation>> {
        if !self.root.is_dir() {
            tracing::debug!(root = %self.root.display(), "transcripts directory missing");
            return Ok(Vec::new());
        }

        let now = SystemTime::now();
        let mut observations = Vec::new();

        for entry in walkdir::WalkDir::new(&self.root).max_depth(self.max_depth) {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_file() || entry.path().extension() != Some(OsStr::new("jsonl")) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else { continue };
            let Ok(modified) = metadata.modified() else { continue };

            let age = now.duration_since(modified).unwrap_or_default();
            if age > self.recent_window {
                continue;
            }
            if self
                .last_checked
                .get(entry.path())
                .is_some_and(|last| modified <= *last)
            {
                continue;
            }

            observations.push(self.observe_file(entry.path(), &metadata, modified));
            self.last_checked.insert(entry.path().to_path_buf(), modified);
        }

        self.last_checked
            .retain(|_, seen| now.duration_since(*seen).unwrap_or_default() <= self.recent_window);
        Ok(observations)
    }
}

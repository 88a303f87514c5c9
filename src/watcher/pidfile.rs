//! Single-instance liveness marker for the watcher.
//!
//! The PID file carries an advisory `flock(2)` lock for as long as the
//! watcher runs. A second watcher fails to take the lock and reports the
//! holder's PID instead of starting. The lock dies with the process, so a
//! stale file left by a crash never blocks a restart.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Lock attempts before giving up on a PID file that keeps being replaced.
const LOCK_ATTEMPTS: usize = 3;

#[derive(Debug, Serialize, Deserialize)]
struct PidRecord {
    pid: u32,
    started_at: DateTime<Utc>,
}

/// Outcome of [`PidLock::acquire`].
#[derive(Debug)]
pub enum PidLockStatus {
    Acquired(PidLock),
    /// Another live process holds the lock.
    HeldBy { pid: Option<u32> },
}

/// Held PID lock. Unlocks and removes the file on drop.
pub struct PidLock {
    file: File,
    path: PathBuf,
}

impl std::fmt::Debug for PidLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PidLock").field("path", &self.path).finish()
    }
}

impl PidLock {
    pub fn acquire(path: &Path) -> Result<PidLockStatus> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create pid directory: {}", parent.display()))?;
        }

        for _ in 0..LOCK_ATTEMPTS {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .with_context(|| format!("failed to open pid file: {}", path.display()))?;

            if !try_lock_exclusive(&file) {
                return Ok(PidLockStatus::HeldBy {
                    pid: read_pid(path),
                });
            }
            // The previous holder unlinks before unlocking. A lock taken on
            // the unlinked inode guards nothing.
            if !is_file_at(&file, path) {
                tracing::debug!(path = %path.display(), "pid file replaced while locking, retrying");
                continue;
            }
            return Self::write_record(file, path);
        }
        bail!("pid file kept changing while locking: {}", path.display())
    }

    fn write_record(mut file: File, path: &Path) -> Result<PidLockStatus> {
        let record = PidRecord {
            pid: std::process::id(),
            started_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).context("failed to serialize pid record")?;
        file.set_len(0).context("failed to truncate pid file")?;
        file.write_all(json.as_bytes())
            .context("failed to write pid file")?;
        file.flush().context("failed to flush pid file")?;

        Ok(PidLockStatus::Acquired(PidLock {
            file,
            path: path.to_path_buf(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        // Unlink while still locked so no new opener can reach this inode.
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "failed to remove pid file");
        }
        unlock(&self.file);
    }
}

/// PID recorded in the file, if it parses.
pub fn read_pid(path: &Path) -> Option<u32> {
    let contents = fs::read_to_string(path).ok()?;
    serde_json::from_str::<PidRecord>(&contents)
        .map(|record| record.pid)
        .ok()
}

/// Whether `file` is still the file linked at `path`.
#[cfg(unix)]
fn is_file_at(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(linked)) => held.dev() == linked.dev() && held.ino() == linked.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_file_at(_file: &File, _path: &Path) -> bool {
    true
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> bool {
    use std::os::unix::io::AsRawFd;
    // SAFETY: the fd is owned by `file` and stays open for the call.
    unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) == 0 }
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;
    // SAFETY: the fd is owned by `file`. Closing it would release the lock
    // anyway; this only makes release happen before the file is closed.
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> bool {
    true
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the per-project directory holding the store file.
pub const STORE_DIR_NAME: &str = ".hivemind";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HivemindConfig {
    pub log: LogConfig,
    pub storage: StorageConfig,
    pub statute: StatuteConfig,
    pub hooks: HooksConfig,
    pub watcher: WatcherConfig,
    /// Directory the process was launched from. Last-resort project root.
    #[serde(skip)]
    pub launch_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Forces the project root instead of deriving it from the hook payload `cwd`.
    pub project_dir: Option<String>,
    /// Forces the directory holding the store file.
    pub store_dir: Option<String>,
    pub db_file: String,
    /// Upper bound on how long a write waits for the lock.
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StatuteConfig {
    pub max_entries: usize,
    pub max_tasks: usize,
    pub max_phases: usize,
    pub max_key_chars: usize,
    pub max_value_chars: usize,
    /// Hard cap on the whole digest.
    pub max_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HooksConfig {
    /// Document (relative to the project root) that exported learnings are appended to.
    pub learnings_document: String,
    /// When set, `Stop` is blocked while the session still has running tasks.
    pub block_stop_while_tasks_running: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WatcherConfig {
    pub transcripts_dir: String,
    pub poll_interval_secs: u64,
    pub recent_window_secs: u64,
    pub context_capacity_tokens: u64,
    pub warn_threshold: f64,
    pub critical_threshold: f64,
    pub pid_file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            project_dir: None,
            store_dir: None,
            db_file: "memory.db".into(),
            busy_timeout_ms: 5000,
        }
    }
}

impl Default for StatuteConfig {
    fn default() -> Self {
        Self {
            max_entries: 15,
            max_tasks: 5,
            max_phases: 5,
            max_key_chars: 64,
            max_value_chars: 160,
            max_chars: 2000,
        }
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            learnings_document: "CLAUDE.md".into(),
            block_stop_while_tasks_running: false,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            transcripts_dir: "~/.claude/projects".into(),
            poll_interval_secs: 30,
            recent_window_secs: 900,
            context_capacity_tokens: 200_000,
            warn_threshold: 0.75,
            critical_threshold: 0.90,
            pid_file: default_hivemind_dir()
                .join("watcher.pid")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

/// Returns `~/.hivemind/`
pub fn default_hivemind_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STORE_DIR_NAME)
}

/// Returns the default config file path: `~/.hivemind/config.toml`
pub fn default_config_path() -> PathBuf {
    default_hivemind_dir().join("config.toml")
}

impl HivemindConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            HivemindConfig::default()
        };

        config.apply_env_overrides();
        config.launch_dir = std::env::current_dir().context("failed to read current directory")?;
        Ok(config)
    }

    /// Defaults plus env overrides, for when the config file is unusable.
    pub fn fallback() -> Self {
        let mut config = HivemindConfig::default();
        config.apply_env_overrides();
        config.launch_dir = std::env::current_dir().unwrap_or_default();
        config
    }

    /// Apply environment variable overrides
    /// (HIVEMIND_PROJECT_DIR, HIVEMIND_STORE_DIR, HIVEMIND_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HIVEMIND_PROJECT_DIR") {
            self.storage.project_dir = Some(val);
        }
        if let Ok(val) = std::env::var("HIVEMIND_STORE_DIR") {
            self.storage.store_dir = Some(val);
        }
        if let Ok(val) = std::env::var("HIVEMIND_LOG_LEVEL") {
            self.log.level = val;
        }
    }

    /// Project root: configured override, then the caller's `cwd`, then the launch directory.
    pub fn project_root(&self, cwd: Option<&Path>) -> PathBuf {
        if let Some(dir) = self.storage.project_dir.as_deref().filter(|d| !d.is_empty()) {
            return expand_tilde(dir);
        }
        match cwd {
            Some(cwd) if !cwd.as_os_str().is_empty() => cwd.to_path_buf(),
            _ => self.launch_dir.clone(),
        }
    }

    /// Resolve the store file for a project, expanding `~` if needed.
    pub fn resolved_db_path(&self, cwd: Option<&Path>) -> PathBuf {
        let dir = match self.storage.store_dir.as_deref().filter(|d| !d.is_empty()) {
            Some(dir) => expand_tilde(dir),
            None => self.project_root(cwd).join(STORE_DIR_NAME),
        };
        dir.join(&self.storage.db_file)
    }

    /// Resolve the learnings document for a project.
    pub fn learnings_document(&self, cwd: Option<&Path>) -> PathBuf {
        let doc = expand_tilde(&self.hooks.learnings_document);
        if doc.is_absolute() {
            doc
        } else {
            self.project_root(cwd).join(doc)
        }
    }

    pub fn resolved_transcripts_dir(&self) -> PathBuf {
        expand_tilde(&self.watcher.transcripts_dir)
    }

    pub fn resolved_pid_file(&self) -> PathBuf {
        expand_tilde(&self.watcher.pid_file)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

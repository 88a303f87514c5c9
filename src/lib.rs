//! Session memory and context preservation for agent CLI lifecycle hooks.
//!
//! An agent host spawns `hivemind hook <event>` at fixed points of a session
//! (start, prompt submit, pre-compaction, delegated task start and stop,
//! stop, teardown). Each invocation is a short-lived process that reads one
//! JSON payload, touches a per-project SQLite store, and writes one JSON
//! object back. A separate long-lived `hivemind watch` process estimates
//! context usage from transcripts and snapshots state before the host
//! compacts it.
//!
//! | Table | Contents | Mutability |
//! |-------|----------|------------|
//! | `memory_entries` | key/value state with a category | upserted by key |
//! | `agent_tasks` | delegated task lifecycle | status leaves `running` once |
//! | `work_phases` | named, nestable units of work | `active` until completed |
//! | `snapshots` | opaque state captures | append-only |
//! | `learnings` | insights queued for the project document | `exported` flips once |
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite open, schema, migrations, and health checks
//! - [`error`]: Store error taxonomy
//! - [`memory`]: Entries, tasks, phases, snapshots, learnings, and the dumps
//! - [`statute`]: Bounded digests: the injected statute and per-topic context
//! - [`export`]: Learning export to the project document
//! - [`hooks`]: Lifecycle event adapter and loop guard
//! - [`watcher`]: Context usage watcher

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod hooks;
pub mod memory;
pub mod statute;
pub mod watcher;

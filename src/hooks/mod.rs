//! Hook adapter: the entrypoint the host spawns at each lifecycle event.
//!
//! One invocation reads one JSON payload from stdin, writes exactly one JSON
//! object to stdout, and exits. The loop guard runs before anything touches
//! the store. Failures become an `error` field with exit code 0; the only
//! non-zero exit is a deliberate block decision on `Stop`.

pub mod event;
pub mod guard;
pub mod protocol;

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use std::io::{Read, Write};

use crate::config::HivemindConfig;
use crate::db;
use crate::error::{StoreError, StoreResult};
use crate::export;
use crate::memory::dump::dump;
use crate::memory::snapshots::save_snapshot;
use crate::memory::tasks::{interrupt_session_tasks, running_tasks, task_complete, task_start};
use crate::statute::generate_statute;

pub use event::HookEvent;
pub use guard::{GuardDecision, LoopGuard, ReentryToken};
pub use protocol::{HookErrorBody, HookOutput, HookPayload, InjectedContext, EXIT_BLOCK, EXIT_OK};

/// Upper bound on running tasks listed in a block reason.
const BLOCK_REASON_MAX_TASKS: usize = 20;

#[derive(thiserror::Error, Debug)]
pub enum HookError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("cannot encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl HookError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store(e) => e.kind(),
            Self::MissingField(_) => "malformed_input",
            Self::Encode(_) => "malformed_data",
        }
    }
}

pub struct HookAdapter<'a> {
    config: &'a HivemindConfig,
    token: ReentryToken,
}

impl<'a> HookAdapter<'a> {
    pub fn new(config: &'a HivemindConfig) -> Self {
        Self::with_token(config, ReentryToken::new())
    }

    /// Share a re-entry token with an enclosing dispatcher.
    pub fn with_token(config: &'a HivemindConfig, token: ReentryToken) -> Self {
        Self { config, token }
    }

    /// Read the payload from `input`, handle it, write the result to `output`,
    /// and return the process exit code.
    pub fn run(&self, event_name: &str, mut input: impl Read, mut output: impl Write) -> i32 {
        let mut raw = String::new();
        let read_error = input.read_to_string(&mut raw).err();
        if let Some(e) = &read_error {
            tracing::warn!(error = %e, "failed to read hook payload from stdin");
            raw.clear();
        }

        let mut response = self.handle(event_name, &raw);
        if let (Some(e), None) = (read_error, &response.error) {
            response.error = Some(HookErrorBody {
                kind: "malformed_input".into(),
                message: e.to_string(),
            });
        }

        let json = serde_json::to_string(&response).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to encode hook output");
            "{}".to_string()
        });
        if let Err(e) = writeln!(output, "{json}").and_then(|()| output.flush()) {
            tracing::warn!(error = %e, "failed to write hook output");
        }
        response.exit_code()
    }

    /// Handle one raw payload for `event_name`.
    pub fn handle(&self, event_name: &str, raw: &str) -> HookOutput {
        let (payload, parse_error) = HookPayload::parse(raw);

        if LoopGuard::check(payload.reentry_active, Some(&self.token)) == GuardDecision::Reentered {
            tracing::debug!(event = event_name, "re-entry detected, skipping");
            return HookOutput::noop();
        }
        let Some(_hold) = self.token.enter() else {
            tracing::debug!(event = event_name, "re-entry detected, skipping");
            return HookOutput::noop();
        };

        let event = match event_name.parse::<HookEvent>() {
            Ok(event) => event,
            Err(msg) => return HookOutput::error("unknown_event", msg),
        };

        let mut response = match self.dispatch(event, &payload) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(event = %event, kind = e.kind(), error = %e, "hook handler failed");
                HookOutput::error(e.kind(), e.to_string())
            }
        };

        if let Some(message) = parse_error {
            tracing::warn!(event = %event, error = %message, "malformed hook payload");
            if response.error.is_none() {
                response.error = Some(HookErrorBody {
                    kind: "malformed_input".into(),
                    message,
                });
            }
        }
        response
    }

    fn dispatch(&self, event: HookEvent, payload: &HookPayload) -> Result<HookOutput, HookError> {
        tracing::debug!(event = %event, session_id = payload.session(), "dispatching hook");
        match event {
            HookEvent::SessionStart | HookEvent::UserPromptSubmit => Ok(self.inject(event, payload)),
            HookEvent::PreCompact => self.pre_compact(payload),
            HookEvent::SubagentStart => self.subagent_start(payload),
            HookEvent::SubagentStop => self.subagent_stop(payload),
            HookEvent::Stop => self.stop(payload),
            HookEvent::SessionEnd => self.session_end(payload),
        }
    }

    fn open_store(&self, payload: &HookPayload) -> StoreResult<Connection> {
        let path = self.config.resolved_db_path(payload.cwd.as_deref());
        db::open_database(path, self.config.storage.busy_timeout_ms)
    }

    /// Statute injection. Degrades to `{}` on an empty digest or any store
    /// failure, and never creates a store that does not exist yet.
    fn inject(&self, event: HookEvent, payload: &HookPayload) -> HookOutput {
        let path = self.config.resolved_db_path(payload.cwd.as_deref());
        if !path.exists() {
            return HookOutput::noop();
        }
        let statute = self
            .open_store(payload)
            .and_then(|conn| generate_statute(&conn, &self.config.statute));
        match statute {
            Ok(text) => with_context(HookOutput::noop(), event, text),
            Err(e) => {
                tracing::warn!(event = %event, error = %e, "statute unavailable, injecting nothing");
                HookOutput::noop()
            }
        }
    }

    fn pre_compact(&self, payload: &HookPayload) -> Result<HookOutput, HookError> {
        let conn = self.open_store(payload)?;
        let summary = serde_json::json!({
            "trigger": payload.trigger,
            "transcript_path": payload.transcript_path,
            "state": serde_json::to_value(dump(&conn)?)?,
        });
        let snapshot_id = save_snapshot(&conn, payload.session(), "pre_compact", &summary.to_string())?;
        let response = result_output(&serde_json::json!({ "snapshot_id": snapshot_id }))?;

        match generate_statute(&conn, &self.config.statute) {
            Ok(text) => Ok(with_context(response, HookEvent::PreCompact, text)),
            Err(e) => {
                tracing::warn!(error = %e, "statute unavailable after pre-compact snapshot");
                Ok(response)
            }
        }
    }

    fn subagent_start(&self, payload: &HookPayload) -> Result<HookOutput, HookError> {
        let task_id = required(payload.task_id.as_deref(), "task_id")?;
        let mut conn = self.open_store(payload)?;
        let task = task_start(
            &mut conn,
            task_id,
            payload.description.as_deref().unwrap_or_default(),
            payload.session_id.as_deref(),
        )?;
        result_output(&task)
    }

    fn subagent_stop(&self, payload: &HookPayload) -> Result<HookOutput, HookError> {
        let task_id = required(payload.task_id.as_deref(), "task_id")?;
        let mut conn = self.open_store(payload)?;
        let completion = task_complete(
            &mut conn,
            task_id,
            payload.result.as_deref(),
            payload.task_failed(),
        )?;
        result_output(&completion)
    }

    fn stop(&self, payload: &HookPayload) -> Result<HookOutput, HookError> {
        let mut conn = self.open_store(payload)?;
        let document = self.config.learnings_document(payload.cwd.as_deref());
        let report = export::export_learnings(&mut conn, &document, Utc::now())?;
        let mut response = result_output(&report)?;

        if !self.config.hooks.block_stop_while_tasks_running {
            return Ok(response);
        }
        let Some(session) = payload.session_id.as_deref() else {
            return Ok(response);
        };
        let running = running_tasks(&conn, Some(session), BLOCK_REASON_MAX_TASKS)?;
        if !running.is_empty() {
            let ids: Vec<&str> = running.iter().map(|t| t.id.as_str()).collect();
            tracing::info!(session_id = session, tasks = running.len(), "blocking stop");
            let block = HookOutput::block(format!(
                "{} delegated task(s) still running: {}",
                running.len(),
                ids.join(", ")
            ));
            response.decision = block.decision;
            response.reason = block.reason;
        }
        Ok(response)
    }

    fn session_end(&self, payload: &HookPayload) -> Result<HookOutput, HookError> {
        let mut conn = self.open_store(payload)?;
        let session = payload.session();
        let interrupted = interrupt_session_tasks(&mut conn, session)?;
        let summary = serde_json::json!({
            "reason": payload.reason,
            "interrupted_tasks": interrupted,
            "state": serde_json::to_value(dump(&conn)?)?,
        });
        let snapshot_id = save_snapshot(&conn, session, "session_end", &summary.to_string())?;
        result_output(&serde_json::json!({
            "interrupted_tasks": interrupted,
            "snapshot_id": snapshot_id,
        }))
    }
}

fn required<'p>(value: Option<&'p str>, field: &'static str) -> Result<&'p str, HookError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(HookError::MissingField(field))
}

fn result_output(value: &impl Serialize) -> Result<HookOutput, HookError> {
    Ok(HookOutput {
        result: Some(serde_json::to_value(value)?),
        ..HookOutput::default()
    })
}

fn with_context(mut response: HookOutput, event: HookEvent, text: String) -> HookOutput {
    if !text.is_empty() {
        response.context = Some(InjectedContext {
            event: event.as_str().to_string(),
            text,
        });
    }
    response
}

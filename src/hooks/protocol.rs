//! JSON shapes exchanged with the host on stdin/stdout.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Exit code for every handled invocation, including guarded no-ops and
/// recovered internal errors.
pub const EXIT_OK: i32 = 0;
/// Exit code reserved for a deliberate block decision.
pub const EXIT_BLOCK: i32 = 2;

/// Event payload read from stdin. Unknown fields are ignored.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct HookPayload {
    pub session_id: Option<String>,
    pub cwd: Option<PathBuf>,
    #[serde(alias = "stop_hook_active")]
    pub reentry_active: bool,
    #[serde(alias = "agent_id")]
    pub task_id: Option<String>,
    pub description: Option<String>,
    pub result: Option<String>,
    pub failed: bool,
    pub exit_code: Option<i64>,
    pub transcript_path: Option<PathBuf>,
    /// `PreCompact` trigger (`manual` or `auto`).
    pub trigger: Option<String>,
    /// `SessionEnd` reason.
    pub reason: Option<String>,
}

impl HookPayload {
    /// Parse stdin. Empty input is an empty payload. Input that is not a
    /// payload object still yields whatever fields can be salvaged, plus the
    /// parse error.
    pub fn parse(raw: &str) -> (Self, Option<String>) {
        if raw.trim().is_empty() {
            return (Self::default(), None);
        }
        match serde_json::from_str::<Self>(raw) {
            Ok(payload) => (payload, None),
            Err(e) => {
                let salvaged = serde_json::from_str::<serde_json::Value>(raw)
                    .map(|value| Self::salvage(&value))
                    .unwrap_or_default();
                (salvaged, Some(e.to_string()))
            }
        }
    }

    /// Best-effort extraction when typed parsing fails on one field. The
    /// re-entry flag in particular must survive a malformed neighbour.
    fn salvage(value: &serde_json::Value) -> Self {
        let text = |name: &str| value.get(name).and_then(|v| v.as_str()).map(str::to_string);
        let flag = |name: &str| value.get(name).and_then(|v| v.as_bool()).unwrap_or(false);
        Self {
            session_id: text("session_id"),
            cwd: text("cwd").map(PathBuf::from),
            reentry_active: flag("reentry_active") || flag("stop_hook_active"),
            task_id: text("task_id").or_else(|| text("agent_id")),
            ..Self::default()
        }
    }

    /// Session id, or `"unknown"` when the host sent none.
    pub fn session(&self) -> &str {
        self.session_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown")
    }

    /// A task failed if flagged so or if it reported a non-zero exit code.
    pub fn task_failed(&self) -> bool {
        self.failed || self.exit_code.is_some_and(|code| code != 0)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InjectedContext {
    pub event: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HookErrorBody {
    pub kind: String,
    pub message: String,
}

/// The single JSON object written to stdout. An all-`None` value serializes
/// as `{}`.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct HookOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<InjectedContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<HookErrorBody>,
}

impl HookOutput {
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: Some(HookErrorBody {
                kind: kind.into(),
                message: message.into(),
            }),
            ..Self::default()
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            decision: Some("block".into()),
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn is_block(&self) -> bool {
        self.decision.as_deref() == Some("block")
    }

    /// [`EXIT_BLOCK`] for a block decision, [`EXIT_OK`] for everything else.
    pub fn exit_code(&self) -> i32 {
        if self.is_block() {
            EXIT_BLOCK
        } else {
            EXIT_OK
        }
    }
}

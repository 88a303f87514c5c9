//! Host lifecycle events understood by the hook adapter.

/// A named point in the host's lifecycle at which `hivemind hook` is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// New or resumed session. Injects the statute.
    SessionStart,
    /// A prompt is about to be processed. Injects the statute.
    UserPromptSubmit,
    /// The host is about to compact its context. Snapshots, then injects.
    PreCompact,
    /// A delegated task began.
    SubagentStart,
    /// A delegated task finished.
    SubagentStop,
    /// The main agent is about to stop. Exports learnings; may block.
    Stop,
    /// The session is being torn down.
    SessionEnd,
}

impl HookEvent {
    pub const ALL: [HookEvent; 7] = [
        HookEvent::SessionStart,
        HookEvent::UserPromptSubmit,
        HookEvent::PreCompact,
        HookEvent::SubagentStart,
        HookEvent::SubagentStop,
        HookEvent::Stop,
        HookEvent::SessionEnd,
    ];

    /// The host's spelling of the event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::SessionStart => "SessionStart",
            HookEvent::UserPromptSubmit => "UserPromptSubmit",
            HookEvent::PreCompact => "PreCompact",
            HookEvent::SubagentStart => "SubagentStart",
            HookEvent::SubagentStop => "SubagentStop",
            HookEvent::Stop => "Stop",
            HookEvent::SessionEnd => "SessionEnd",
        }
    }

    /// Events that end a unit of work. Their side effects are the kind that
    /// can re-trigger the same event, so they carry `reentry_active`.
    pub fn is_terminating(&self) -> bool {
        matches!(self, HookEvent::SubagentStop | HookEvent::Stop)
    }

    /// Events whose contract lets a handler halt the host's current action.
    pub fn can_block(&self) -> bool {
        matches!(self, HookEvent::Stop)
    }

    /// Events whose output is a context injection.
    pub fn injects_context(&self) -> bool {
        matches!(
            self,
            HookEvent::SessionStart | HookEvent::UserPromptSubmit | HookEvent::PreCompact
        )
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HookEvent {
    type Err = String;

    /// Accepts `PreCompact`, `pre-compact`, and `pre_compact` alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        HookEvent::ALL
            .into_iter()
            .find(|event| event.as_str().to_lowercase() == normalized)
            .ok_or_else(|| format!("unknown hook event: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_cli_spellings() {
        assert_eq!("PreCompact".parse::<HookEvent>().unwrap(), HookEvent::PreCompact);
        assert_eq!("pre-compact".parse::<HookEvent>().unwrap(), HookEvent::PreCompact);
        assert_eq!("user_prompt_submit".parse::<HookEvent>().unwrap(), HookEvent::UserPromptSubmit);
        assert_eq!("stop".parse::<HookEvent>().unwrap(), HookEvent::Stop);
        assert!("PostToolUse".parse::<HookEvent>().is_err());
    }

    #[test]
    fn every_event_round_trips() {
        for event in HookEvent::ALL {
            assert_eq!(event.as_str().parse::<HookEvent>().unwrap(), event);
        }
    }

    #[test]
    fn only_stop_can_block() {
        let blocking: Vec<_> = HookEvent::ALL.into_iter().filter(|e| e.can_block()).collect();
        assert_eq!(blocking, vec![HookEvent::Stop]);
        assert!(HookEvent::SubagentStop.is_terminating());
        assert!(!HookEvent::SessionStart.is_terminating());
    }
}

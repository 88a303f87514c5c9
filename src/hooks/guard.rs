//! Loop guard: stops a hook-triggered chain from re-entering itself.
//!
//! Two signals count as re-entry: the host's `reentry_active` payload flag,
//! and a process-local [`ReentryToken`] that is held for the duration of a
//! dispatch. The check touches no storage and must run before anything else.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    /// Short-circuit with a successful no-op.
    Reentered,
}

pub struct LoopGuard;

impl LoopGuard {
    pub fn check(reentry_active: bool, token: Option<&ReentryToken>) -> GuardDecision {
        if reentry_active || token.is_some_and(ReentryToken::is_held) {
            GuardDecision::Reentered
        } else {
            GuardDecision::Proceed
        }
    }
}

/// Process-local re-entry marker. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ReentryToken(Arc<AtomicBool>);

impl ReentryToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Take the token. `None` if it is already held.
    pub fn enter(&self) -> Option<ReentryHold> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ReentryHold(Arc::clone(&self.0)))
    }
}

/// Releases the token on drop.
#[derive(Debug)]
pub struct ReentryHold(Arc<AtomicBool>);

impl Drop for ReentryHold {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

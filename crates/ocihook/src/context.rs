//! Caller-supplied cancellation scope for a lifecycle call.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation, deadline, and the container facts reported to hooks for
/// one lifecycle call.
///
/// Cloning shares the cancellation token.
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    pid: Option<u32>,
    annotations: BTreeMap<String, String>,
}

impl HookContext {
    /// A context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing token, so cancelling it aborts the running hook.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Bound the whole call by an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Bound the whole call by a duration from now.
    ///
    /// A timeout too large to represent as an instant leaves the call unbounded.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Process id reported to hooks of stages that carry one.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Add annotations reported to hooks. Later entries replace earlier keys.
    pub fn with_annotations<I>(mut self, annotations: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.annotations.extend(annotations);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Which bound ends a hook invocation first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeadlineSource {
    /// The hook's own declared timeout.
    Hook(Duration),
    /// The caller's context deadline.
    Caller,
}

/// Combine the caller's deadline with a hook timeout measured from `start`.
///
/// Ties go to the hook. A hook timeout past the representable range of
/// `Instant` imposes no hook deadline.
pub(crate) fn effective_deadline(
    caller: Option<Instant>,
    hook_timeout: Option<Duration>,
    start: Instant,
) -> Option<(Instant, DeadlineSource)> {
    let hook = hook_timeout
        .and_then(|t| start.checked_add(t).map(|at| (at, DeadlineSource::Hook(t))));
    let caller = caller.map(|d| (d, DeadlineSource::Caller));
    match (hook, caller) {
        (Some(h), Some(c)) => Some(if h.0 <= c.0 { h } else { c }),
        (h, c) => h.or(c),
    }
}

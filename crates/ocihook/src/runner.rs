//! Single-hook execution: state on stdin, bounded wait, outcome classification.

use std::time::Duration;

use ocihook_core::{ExitReason, Hook, HookError, HookResult, Stage, build_state};
use tokio::time::Instant;
use tracing::Instrument;

use crate::config::EngineConfig;
use crate::context::{DeadlineSource, HookContext, effective_deadline};
use crate::launcher::{HookExit, HookLauncher, ProcessLauncher, RunningHook};

/// Runs hooks through a [`HookLauncher`].
#[derive(Debug, Clone, Default)]
pub struct HookRunner<L = ProcessLauncher> {
    launcher: L,
}

impl HookRunner<ProcessLauncher> {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            launcher: ProcessLauncher::new(config),
        }
    }
}

impl<L: HookLauncher> HookRunner<L> {
    pub fn with_launcher(launcher: L) -> Self {
        Self { launcher }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Run one hook to completion.
    ///
    /// Returns `Ok(())` only if the hook exited with status zero before the
    /// effective deadline. On timeout or cancellation the hook's process
    /// group is killed before returning.
    pub async fn run_hook(
        &self,
        ctx: &HookContext,
        stage: Stage,
        hook: &Hook,
        id: &str,
        bundle: &str,
    ) -> HookResult<()> {
        let span = tracing::debug_span!("hook", %stage, path = %hook.path.display());
        self.run_hook_inner(ctx, stage, hook, id, bundle)
            .instrument(span)
            .await
    }

    async fn run_hook_inner(
        &self,
        ctx: &HookContext,
        stage: Stage,
        hook: &Hook,
        id: &str,
        bundle: &str,
    ) -> HookResult<()> {
        if let Err(reason) = hook.validate() {
            return Err(HookError::invalid(hook.path.clone(), reason));
        }
        if ctx.is_cancelled() {
            return Err(HookError::Cancelled {
                path: hook.path.clone(),
            });
        }

        let state =
            build_state(stage, id, bundle, ctx.pid()).with_annotations(ctx.annotations().clone());
        let payload = state.to_json().map_err(|e| HookError::LaunchFailure {
            path: hook.path.clone(),
            source: e.into(),
        })?;

        let start = Instant::now();
        let deadline = effective_deadline(ctx.deadline(), hook.timeout_duration(), start);
        tracing::debug!(timeout_secs = ?hook.timeout, args = ?hook.args, "Executing hook");

        let mut child = self
            .launcher
            .launch(hook, payload)
            .await
            .map_err(|source| HookError::LaunchFailure {
                path: hook.path.clone(),
                source,
            })?;

        let outcome = tokio::select! {
            biased;
            exit = child.wait() => Outcome::Exited(exit),
            _ = ctx.token().cancelled() => Outcome::Interrupted(None),
            source = sleep_until(deadline) => Outcome::Interrupted(Some(source)),
        };

        match outcome {
            Outcome::Exited(Ok(exit)) => classify(hook, exit, start.elapsed()),
            Outcome::Exited(Err(source)) => {
                terminate(&mut *child, hook).await;
                Err(HookError::LaunchFailure {
                    path: hook.path.clone(),
                    source,
                })
            }
            Outcome::Interrupted(source) => {
                // The child may have exited in the same instant; its own status wins.
                if let Ok(Some(exit)) = child.try_wait() {
                    tracing::debug!("Hook exited as its deadline fired");
                    return classify(hook, exit, start.elapsed());
                }
                terminate(&mut *child, hook).await;
                match source {
                    Some(DeadlineSource::Hook(timeout)) => {
                        tracing::warn!(timeout_secs = timeout.as_secs(), "Hook timed out, killed");
                        Err(HookError::Timeout {
                            path: hook.path.clone(),
                            timeout,
                        })
                    }
                    Some(DeadlineSource::Caller) | None => {
                        tracing::warn!("Hook cancelled by caller, killed");
                        Err(HookError::Cancelled {
                            path: hook.path.clone(),
                        })
                    }
                }
            }
        }
    }
}

enum Outcome {
    Exited(std::io::Result<HookExit>),
    /// `None` when the caller's token was cancelled.
    Interrupted(Option<DeadlineSource>),
}

async fn sleep_until(deadline: Option<(Instant, DeadlineSource)>) -> DeadlineSource {
    match deadline {
        Some((at, source)) => {
            tokio::time::sleep_until(at).await;
            source
        }
        None => std::future::pending().await,
    }
}

async fn terminate(child: &mut dyn RunningHook, hook: &Hook) {
    if let Err(e) = child.kill().await {
        tracing::warn!(path = %hook.path.display(), "Failed to kill hook: {e}");
    }
}

fn classify(hook: &Hook, exit: HookExit, elapsed: Duration) -> HookResult<()> {
    if exit.success() {
        tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "Hook completed successfully");
        return Ok(());
    }

    let reason = match (exit.code, exit.signal) {
        (Some(code), _) => ExitReason::Code(code),
        (None, Some(signal)) => ExitReason::Signal(signal),
        (None, None) => ExitReason::Code(-1),
    };
    let summary = ocihook_process::failure_summary(&exit.stdout, &exit.stderr);
    tracing::warn!(%reason, summary = summary.as_deref().unwrap_or(""), "Hook failed");
    Err(HookError::NonZeroExit {
        path: hook.path.clone(),
        reason,
        stdout: exit.stdout,
        stderr: exit.stderr,
    })
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;

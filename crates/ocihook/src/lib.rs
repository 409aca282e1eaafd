//! Lifecycle hook engine for OCI-style container runtimes.
//!
//! Hooks are external programs run at three lifecycle points:
//! - `prestart`: before the container process starts
//! - `poststart`: right after it started
//! - `poststop`: after it stopped
//!
//! ## Execution Model
//!
//! Each hook receives the invocation state as JSON on stdin:
//!
//! ```json
//! {"ociVersion":"1.0.2","id":"sandbox-1","status":"created","pid":4242,"bundle":"/run/bundle"}
//! ```
//!
//! Hooks of one stage run sequentially in declaration order. The first
//! failure aborts the stage. A hook succeeds only by exiting with status
//! zero before its `timeout` (seconds) and before the caller's own deadline.
//! Timed-out or cancelled hooks are killed together with their process group.
//!
//! ## Configuration
//!
//! Engine behavior is tuned through `hooks.toml`:
//!
//! ```toml
//! output_limit_bytes = 65536
//! kill_process_group = true
//! inherit_env_when_unset = true
//! ```

pub mod config;
pub mod context;
pub mod launcher;
pub mod runner;
pub mod stage;

pub use config::{EngineConfig, EngineConfigLayer, global_config_path, load_engine_config};
pub use context::HookContext;
pub use launcher::{HookExit, HookLauncher, ProcessLauncher, RunningHook};
pub use ocihook_core::{
    ExitReason, Hook, HookError, HookErrorKind, HookResult, Hooks, InvocationState, Spec, Stage,
    build_state,
};
pub use runner::HookRunner;

/// Run a single hook with the default process launcher.
pub async fn run_hook(
    ctx: &HookContext,
    stage: Stage,
    hook: &Hook,
    id: &str,
    bundle: &str,
) -> HookResult<()> {
    HookRunner::new(EngineConfig::default())
        .run_hook(ctx, stage, hook, id, bundle)
        .await
}

/// Run the `prestart` hooks of `spec` with the default process launcher.
pub async fn pre_start_hooks(
    ctx: &HookContext,
    spec: &Spec,
    id: &str,
    bundle: &str,
) -> HookResult<()> {
    HookRunner::new(EngineConfig::default())
        .pre_start_hooks(ctx, spec, id, bundle)
        .await
}

/// Run the `poststart` hooks of `spec` with the default process launcher.
pub async fn post_start_hooks(
    ctx: &HookContext,
    spec: &Spec,
    id: &str,
    bundle: &str,
) -> HookResult<()> {
    HookRunner::new(EngineConfig::default())
        .post_start_hooks(ctx, spec, id, bundle)
        .await
}

/// Run the `poststop` hooks of `spec` with the default process launcher.
pub async fn post_stop_hooks(
    ctx: &HookContext,
    spec: &Spec,
    id: &str,
    bundle: &str,
) -> HookResult<()> {
    HookRunner::new(EngineConfig::default())
        .post_stop_hooks(ctx, spec, id, bundle)
        .await
}

#[cfg(test)]
mod test_support;

//! Handlers for `run`, `state` and `exec`.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use ocihook::{
    EngineConfig, EngineConfigLayer, Hook, HookContext, HookResult, HookRunner, Spec, Stage,
    build_state, global_config_path, load_engine_config,
};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Every hook succeeded (or none were declared).
pub(crate) const EXIT_OK: i32 = 0;
/// A hook failed, timed out, or was cancelled.
pub(crate) const EXIT_HOOK_FAILED: i32 = 1;
/// The bundle or config could not be used.
pub(crate) const EXIT_USAGE: i32 = 2;

pub(crate) async fn handle_run(
    stage: Stage,
    bundle: PathBuf,
    id: String,
    pid: Option<u32>,
    config: Option<PathBuf>,
) -> Result<i32> {
    let spec = Spec::load(&bundle)
        .with_context(|| format!("Failed to load bundle {}", bundle.display()))?;
    let runner = HookRunner::new(engine_config(config.as_deref(), None)?);
    let ctx = signal_context(pid)?;
    let bundle = bundle_str(&bundle);

    info!(%stage, id = %id, "Running lifecycle hooks");
    let result = match stage {
        Stage::Prestart => runner.pre_start_hooks(&ctx, &spec, &id, &bundle).await,
        Stage::Poststart => runner.post_start_hooks(&ctx, &spec, &id, &bundle).await,
        Stage::Poststop => runner.post_stop_hooks(&ctx, &spec, &id, &bundle).await,
    };
    Ok(report(result))
}

pub(crate) fn handle_state(
    stage: Stage,
    bundle: PathBuf,
    id: String,
    pid: Option<u32>,
) -> Result<i32> {
    let state = build_state(stage, &id, &bundle_str(&bundle), pid);
    let json = state.to_json().context("Failed to serialize state")?;

    let mut out = std::io::stdout().lock();
    out.write_all(&json)?;
    writeln!(out)?;
    Ok(EXIT_OK)
}

pub(crate) async fn handle_exec(
    bundle: PathBuf,
    id: String,
    timeout: Option<i64>,
    command: Vec<String>,
) -> Result<i32> {
    let Some(path) = command.first() else {
        bail!("missing hook path");
    };
    // `env` stays unset so the command inherits our environment byte for byte.
    let mut hook = Hook::new(path).with_args(command.iter().cloned());
    if let Some(secs) = timeout {
        hook = hook.with_timeout(secs);
    }

    let inherit = EngineConfigLayer {
        inherit_env_when_unset: Some(true),
        ..EngineConfigLayer::default()
    };
    let runner = HookRunner::new(engine_config(None, Some(&inherit))?);
    let ctx = signal_context(None)?;
    let result = runner
        .run_hook(&ctx, Stage::Prestart, &hook, &id, &bundle_str(&bundle))
        .await;
    Ok(report(result))
}

fn engine_config(
    explicit: Option<&Path>,
    overrides: Option<&EngineConfigLayer>,
) -> Result<EngineConfig> {
    if let Some(path) = explicit
        && !path.is_file()
    {
        bail!("Config file not found: {}", path.display());
    }
    Ok(load_engine_config(
        explicit,
        global_config_path().as_deref(),
        overrides,
    ))
}

/// Context cancelled by the first SIGTERM or SIGINT.
fn signal_context(pid: Option<u32>) -> Result<HookContext> {
    let token = CancellationToken::new();
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, cancelling hooks"),
            _ = sigint.recv() => info!("Received SIGINT, cancelling hooks"),
        }
        cancel.cancel();
    });

    let ctx = HookContext::new().with_cancellation(token);
    Ok(match pid {
        Some(pid) => ctx.with_pid(pid),
        None => ctx,
    })
}

fn bundle_str(bundle: &Path) -> String {
    bundle.to_string_lossy().into_owned()
}

fn report(result: HookResult<()>) -> i32 {
    match result {
        Ok(()) => EXIT_OK,
        Err(e) => {
            eprintln!("Error: {e}");
            EXIT_HOOK_FAILED
        }
    }
}

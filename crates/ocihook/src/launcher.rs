//! Process abstraction used by the executor.
//!
//! A hook is any executable that reads the invocation state on stdin and
//! reports through its exit status. [`HookLauncher`] starts one and hands
//! back a [`RunningHook`]; the executor only ever talks to these traits, so
//! tests can substitute fakes for real processes.

use std::io;

use async_trait::async_trait;
use ocihook_core::Hook;
use ocihook_process::{SpawnOptions, SpawnedProcess, spawn_with_stdin};
use tokio::process::Command;

use crate::config::EngineConfig;

/// How a hook process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl HookExit {
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[async_trait]
pub trait RunningHook: Send {
    /// Wait for the hook to exit. Must be cancel-safe.
    async fn wait(&mut self) -> io::Result<HookExit>;

    /// Exit status if the hook already finished, without blocking.
    fn try_wait(&mut self) -> io::Result<Option<HookExit>>;

    /// Forcibly terminate the hook and everything it started, then reap it.
    async fn kill(&mut self) -> io::Result<()>;
}

#[async_trait]
pub trait HookLauncher: Send + Sync {
    /// Start `hook` with `state` queued for its stdin.
    async fn launch(&self, hook: &Hook, state: Vec<u8>) -> io::Result<Box<dyn RunningHook>>;
}

/// Launches hooks as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher {
    config: EngineConfig,
}

impl ProcessLauncher {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Build the command for `hook`: argv as declared, environment verbatim.
    fn command(&self, hook: &Hook) -> Command {
        let mut cmd = Command::new(&hook.path);

        #[cfg(unix)]
        {
            if let Some(argv0) = hook.args.first() {
                cmd.arg0(argv0);
            }
        }
        cmd.args(hook.args.iter().skip(1));

        match hook.env_pairs() {
            Some(pairs) => {
                cmd.env_clear();
                cmd.envs(pairs);
            }
            None if !self.config.inherit_env_when_unset => {
                cmd.env_clear();
            }
            None => {}
        }
        cmd
    }
}

#[async_trait]
impl HookLauncher for ProcessLauncher {
    async fn launch(&self, hook: &Hook, state: Vec<u8>) -> io::Result<Box<dyn RunningHook>> {
        let options: SpawnOptions = self.config.spawn_options();
        let process = spawn_with_stdin(self.command(hook), state, options)?;
        tracing::debug!(pid = ?process.id(), path = %hook.path.display(), "Hook spawned");
        Ok(Box::new(ProcessHook(process)))
    }
}

struct ProcessHook(SpawnedProcess);

#[async_trait]
impl RunningHook for ProcessHook {
    async fn wait(&mut self) -> io::Result<HookExit> {
        let exit = self.0.wait().await?;
        Ok(HookExit {
            code: exit.status.code(),
            signal: exit.signal(),
            stdout: exit.stdout,
            stderr: exit.stderr,
        })
    }

    fn try_wait(&mut self) -> io::Result<Option<HookExit>> {
        Ok(self.0.try_wait()?.map(|status| HookExit {
            code: status.code(),
            signal: signal_of(&status),
            ..HookExit::default()
        }))
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.0.kill().await.map(|_| ())
    }
}

#[cfg(unix)]
fn signal_of(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

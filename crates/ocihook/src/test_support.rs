//! Scriptable in-memory launcher for executor and sequencer tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ocihook_core::Hook;
use tokio::time::Instant;

use crate::launcher::{HookExit, HookLauncher, RunningHook};

/// Scripted behavior of a fake hook, keyed by its path.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FakeHook {
    /// Exit with `code` after `after`.
    Exit { code: i32, after: Duration },
    /// Die from `signal` after `after`.
    Signal { signal: i32, after: Duration },
    /// Fail to start.
    LaunchError(io::ErrorKind),
}

impl FakeHook {
    pub(crate) fn ok() -> Self {
        Self::Exit {
            code: 0,
            after: Duration::ZERO,
        }
    }

    pub(crate) fn fail(code: i32) -> Self {
        Self::Exit {
            code,
            after: Duration::ZERO,
        }
    }

    pub(crate) fn slow(code: i32, secs: u64) -> Self {
        Self::Exit {
            code,
            after: Duration::from_secs(secs),
        }
    }
}

#[derive(Debug, Default)]
struct Journal {
    launched: Vec<(PathBuf, Vec<u8>)>,
    killed: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeLauncher {
    scripts: HashMap<PathBuf, FakeHook>,
    journal: Arc<Mutex<Journal>>,
}

impl FakeLauncher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(mut self, path: &str, behavior: FakeHook) -> Self {
        self.scripts.insert(PathBuf::from(path), behavior);
        self
    }

    /// Paths launched so far, in order.
    pub(crate) fn launched(&self) -> Vec<PathBuf> {
        let journal = self.journal.lock().unwrap();
        journal.launched.iter().map(|(p, _)| p.clone()).collect()
    }

    /// Stdin payload handed to the `n`th launched hook.
    pub(crate) fn payload(&self, n: usize) -> Vec<u8> {
        self.journal.lock().unwrap().launched[n].1.clone()
    }

    pub(crate) fn killed(&self) -> Vec<PathBuf> {
        self.journal.lock().unwrap().killed.clone()
    }
}

#[async_trait]
impl HookLauncher for FakeLauncher {
    async fn launch(&self, hook: &Hook, state: Vec<u8>) -> io::Result<Box<dyn RunningHook>> {
        let behavior = self
            .scripts
            .get(&hook.path)
            .copied()
            .unwrap_or_else(FakeHook::ok);
        let (exit, after) = match behavior {
            FakeHook::LaunchError(kind) => return Err(io::Error::new(kind, "fake launch error")),
            FakeHook::Exit { code, after } => (HookExit::from_code(code), after),
            FakeHook::Signal { signal, after } => (
                HookExit {
                    signal: Some(signal),
                    ..HookExit::default()
                },
                after,
            ),
        };
        self.journal
            .lock()
            .unwrap()
            .launched
            .push((hook.path.clone(), state));
        Ok(Box::new(FakeChild {
            path: hook.path.clone(),
            exit,
            exit_at: Instant::now() + after,
            journal: Arc::clone(&self.journal),
        }))
    }
}

struct FakeChild {
    path: PathBuf,
    exit: HookExit,
    exit_at: Instant,
    journal: Arc<Mutex<Journal>>,
}

#[async_trait]
impl RunningHook for FakeChild {
    async fn wait(&mut self) -> io::Result<HookExit> {
        tokio::time::sleep_until(self.exit_at).await;
        Ok(self.exit.clone())
    }

    fn try_wait(&mut self) -> io::Result<Option<HookExit>> {
        Ok((Instant::now() >= self.exit_at).then(|| self.exit.clone()))
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.journal.lock().unwrap().killed.push(self.path.clone());
        Ok(())
    }
}

pub(crate) fn path(p: &str) -> &Path {
    Path::new(p)
}

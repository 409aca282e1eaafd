//! Process plumbing for hook execution: spawning with piped stdin, output
//! capture, and process-group termination.

mod output;

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

pub use output::{failure_summary, last_non_empty_line, truncate_line};

/// Default number of bytes retained per output stream.
pub const DEFAULT_OUTPUT_LIMIT: usize = 64 * 1024;

/// How long output pumps may run after the child exited.
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Options controlling how a hook process is spawned.
#[derive(Debug, Clone, Copy)]
pub struct SpawnOptions {
    /// Run the child as the leader of a new session so termination can reach
    /// every process it started.
    pub new_process_group: bool,
    /// Bytes retained from the tail of stdout and of stderr.
    pub output_limit: usize,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            new_process_group: true,
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }
}

/// Final status and captured output of a process that ran to completion.
#[derive(Debug, Clone)]
pub struct ProcessExit {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Signal that terminated the process, if any.
    pub fn signal(&self) -> Option<i32> {
        exit_signal(&self.status)
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// A spawned hook process with background stdin/stdout/stderr pumps.
///
/// Dropping it without waiting kills the direct child (`kill_on_drop`).
#[derive(Debug)]
pub struct SpawnedProcess {
    child: Child,
    pid: Option<u32>,
    process_group: bool,
    stdin_task: Option<JoinHandle<()>>,
    stdout_task: Option<JoinHandle<String>>,
    stderr_task: Option<JoinHandle<String>>,
}

/// Spawn `cmd` and feed `stdin_data` to it.
///
/// - stdin, stdout, stderr are piped
/// - stdin is written in the background and closed afterwards
/// - stdout/stderr are captured up to `options.output_limit` bytes each
/// - with `new_process_group`, the child calls `setsid()` before exec
pub fn spawn_with_stdin(
    mut cmd: Command,
    stdin_data: Vec<u8>,
    options: SpawnOptions,
) -> io::Result<SpawnedProcess> {
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    // SAFETY: setsid() is async-signal-safe and runs after fork, before exec,
    // so no Rust runtime state exists in the child yet.
    #[cfg(unix)]
    {
        if options.new_process_group {
            unsafe {
                cmd.pre_exec(|| {
                    libc::setsid();
                    Ok(())
                });
            }
        }
    }

    let mut child = cmd.spawn()?;
    let pid = child.id();

    let stdin_task = child.stdin.take().map(|mut stdin| {
        tokio::spawn(async move {
            // The hook may exit without reading its input.
            if let Err(e) = stdin.write_all(&stdin_data).await {
                tracing::debug!("Hook did not consume its state: {e}");
            }
            let _ = stdin.shutdown().await;
        })
    });
    let limit = options.output_limit;
    let stdout_task = child
        .stdout
        .take()
        .map(|stdout| tokio::spawn(output::capture_tail(stdout, limit)));
    let stderr_task = child
        .stderr
        .take()
        .map(|stderr| tokio::spawn(output::capture_tail(stderr, limit)));

    Ok(SpawnedProcess {
        child,
        pid,
        process_group: options.new_process_group,
        stdin_task,
        stdout_task,
        stderr_task,
    })
}

impl SpawnedProcess {
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the process to exit, then collect its captured output.
    ///
    /// Cancel-safe up to the point the child is reaped; a later call (or
    /// [`SpawnedProcess::try_wait`]) still observes the cached status.
    pub async fn wait(&mut self) -> io::Result<ProcessExit> {
        let status = self.child.wait().await?;
        let (stdout, stderr) = self.collect_output().await;
        Ok(ProcessExit {
            status,
            stdout,
            stderr,
        })
    }

    /// Non-blocking status check. Output is not collected.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Forcibly stop the process (and its group) with SIGKILL, then reap it.
    ///
    /// Captured output is discarded.
    pub async fn kill(&mut self) -> io::Result<ExitStatus> {
        #[cfg(unix)]
        {
            if let Some(pid) = self.pid.filter(|_| self.process_group) {
                // SAFETY: kill() has no memory-safety preconditions. Negative PID
                // targets the process group created by setsid().
                unsafe {
                    libc::kill(-(pid as i32), libc::SIGKILL);
                }
            }
        }
        if let Err(e) = self.child.start_kill() {
            // Already reaped; `wait` below returns the cached status.
            tracing::debug!("start_kill on hook child failed: {e}");
        }
        let status = self.child.wait().await;
        self.abort_io();
        status
    }

    async fn collect_output(&mut self) -> (String, String) {
        if let Some(task) = self.stdin_task.take() {
            task.abort();
        }
        let deadline = tokio::time::Instant::now() + OUTPUT_DRAIN_GRACE;
        tokio::join!(
            drain(self.stdout_task.take(), deadline),
            drain(self.stderr_task.take(), deadline),
        )
    }

    fn abort_io(&mut self) {
        if let Some(task) = self.stdin_task.take() {
            task.abort();
        }
        if let Some(task) = self.stdout_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

/// Await an output pump after the child exited, abandoning it at `deadline`.
///
/// A descendant that inherited the pipe can keep it open indefinitely. Both
/// pumps share one deadline, so the wait is bounded by [`OUTPUT_DRAIN_GRACE`].
async fn drain(task: Option<JoinHandle<String>>, deadline: tokio::time::Instant) -> String {
    let Some(mut task) = task else {
        return String::new();
    };
    match tokio::time::timeout_at(deadline, &mut task).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => {
            tracing::debug!("Hook output still open after exit, abandoning capture");
            task.abort();
            String::new()
        }
    }
}

impl Drop for SpawnedProcess {
    fn drop(&mut self) {
        self.abort_io();
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

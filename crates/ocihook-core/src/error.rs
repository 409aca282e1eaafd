use std::path::PathBuf;
use std::time::Duration;

/// Coarse classification of a hook failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookErrorKind {
    LaunchFailure,
    NonZeroExit,
    Timeout,
    Cancelled,
}

/// How a hook process ended when it did not succeed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    Code(i32),
    Signal(i32),
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(code) => write!(f, "code {code}"),
            Self::Signal(signal) => write!(f, "signal {signal}"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HookError {
    #[error("Hook '{}' failed to launch: {source}", path.display())]
    LaunchFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Hook '{}' exited with {reason}", path.display())]
    NonZeroExit {
        path: PathBuf,
        reason: ExitReason,
        /// Tail of the hook's stdout, for diagnostics only.
        stdout: String,
        /// Tail of the hook's stderr, for diagnostics only.
        stderr: String,
    },

    #[error("Hook '{}' timed out after {}s", path.display(), timeout.as_secs())]
    Timeout { path: PathBuf, timeout: Duration },

    #[error("Hook '{}' cancelled", path.display())]
    Cancelled { path: PathBuf },
}

impl HookError {
    pub fn kind(&self) -> HookErrorKind {
        match self {
            Self::LaunchFailure { .. } => HookErrorKind::LaunchFailure,
            Self::NonZeroExit { .. } => HookErrorKind::NonZeroExit,
            Self::Timeout { .. } => HookErrorKind::Timeout,
            Self::Cancelled { .. } => HookErrorKind::Cancelled,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::LaunchFailure { path, .. }
            | Self::NonZeroExit { path, .. }
            | Self::Timeout { path, .. }
            | Self::Cancelled { path } => path,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == HookErrorKind::Timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == HookErrorKind::Cancelled
    }

    /// Launch failure for a descriptor that did not pass validation.
    pub fn invalid(path: PathBuf, reason: String) -> Self {
        Self::LaunchFailure {
            path,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, reason),
        }
    }
}

pub type HookResult<T> = std::result::Result<T, HookError>;

#[derive(thiserror::Error, Debug)]
pub enum SpecError {
    #[error("Failed to read runtime spec at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse runtime spec at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

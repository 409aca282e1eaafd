use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SpecError;

/// File name of the runtime-spec document inside a bundle.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Lifecycle point at which a hook set runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Prestart,
    Poststart,
    Poststop,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Prestart, Stage::Poststart, Stage::Poststop];

    /// Returns the key used for this stage in `config.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prestart => "prestart",
            Self::Poststart => "poststart",
            Self::Poststop => "poststop",
        }
    }

    /// Container status reported to hooks running at this stage.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Prestart => "created",
            Self::Poststart => "running",
            Self::Poststop => "stopped",
        }
    }

    /// Whether the invocation state for this stage carries a process id.
    ///
    /// After the container stopped there is no live process to report.
    pub fn reports_pid(&self) -> bool {
        !matches!(self, Self::Poststop)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One external program to invoke at a lifecycle transition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    /// Absolute path of the executable.
    pub path: PathBuf,
    /// Full argv; element 0 becomes the child's argv[0].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// `KEY=VALUE` entries. `None` inherits the caller's environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    /// Timeout in seconds. `None` means no deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}

impl Hook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, secs: i64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn with_env<I, S>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env = Some(env.into_iter().map(Into::into).collect());
        self
    }

    /// Snapshot the current process environment into this descriptor.
    ///
    /// Variables that are not valid UTF-8 cannot be declared and are skipped.
    /// Leave `env` unset to pass the environment through unchanged.
    pub fn with_inherited_env(mut self) -> Self {
        self.env = Some(
            std::env::vars_os()
                .filter_map(|(k, v)| Some(format!("{}={}", k.to_str()?, v.to_str()?)))
                .collect(),
        );
        self
    }

    /// Declared timeout as a `Duration`, if one is set and positive.
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs as u64))
    }

    /// Split `env` entries into name/value pairs.
    ///
    /// Entries without `=` are treated as a name with an empty value.
    pub fn env_pairs(&self) -> Option<Vec<(&str, &str)>> {
        self.env.as_ref().map(|entries| {
            entries
                .iter()
                .map(|entry| entry.split_once('=').unwrap_or((entry.as_str(), "")))
                .collect()
        })
    }

    /// Check the structural requirements a descriptor must meet before it is run.
    pub fn validate(&self) -> Result<(), String> {
        if !self.path.is_absolute() {
            return Err(format!(
                "hook path '{}' is not absolute",
                self.path.display()
            ));
        }
        if let Some(secs) = self.timeout
            && secs <= 0
        {
            return Err(format!("hook timeout must be positive, got {secs}"));
        }
        Ok(())
    }
}

/// Hook sets keyed by lifecycle stage, as found under `hooks` in `config.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hooks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prestart: Option<Vec<Hook>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poststart: Option<Vec<Hook>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poststop: Option<Vec<Hook>>,
}

impl Hooks {
    pub fn for_stage(&self, stage: Stage) -> Option<&[Hook]> {
        match stage {
            Stage::Prestart => self.prestart.as_deref(),
            Stage::Poststart => self.poststart.as_deref(),
            Stage::Poststop => self.poststop.as_deref(),
        }
    }
}

/// The subset of a runtime-spec document this engine reads.
///
/// Unknown fields are ignored so full bundle configs deserialize cleanly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    #[serde(rename = "ociVersion", default)]
    pub oci_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<Hooks>,
    /// Arbitrary metadata, reported to every hook in its state.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Spec {
    /// Read `<bundle>/config.json`.
    pub fn load(bundle: &Path) -> Result<Self, SpecError> {
        let path = bundle.join(CONFIG_FILE_NAME);
        let content = std::fs::read_to_string(&path).map_err(|source| SpecError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SpecError::Parse { path, source })
    }

    /// Hook list for `stage`, or `None` when the document declares none.
    pub fn hooks_for(&self, stage: Stage) -> Option<&[Hook]> {
        self.hooks.as_ref().and_then(|hooks| hooks.for_stage(stage))
    }
}

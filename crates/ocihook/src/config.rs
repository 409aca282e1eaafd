//! Engine configuration loading with tiered priority.
//!
//! 1. Runtime overrides (CLI flags): highest
//! 2. Explicit file (`--config <path>`)
//! 3. Global file (`~/.config/ocihook/hooks.toml`)
//! 4. Built-in defaults: lowest
//!
//! Each field is taken from the highest layer that sets it.

use std::fs;
use std::path::{Path, PathBuf};

use ocihook_process::{DEFAULT_OUTPUT_LIMIT, SpawnOptions};
use serde::{Deserialize, Serialize};

/// Application name used for the global config directory.
pub const APP_NAME: &str = "ocihook";
/// File name of the engine config inside the config directory.
pub const CONFIG_FILE_NAME: &str = "hooks.toml";

/// One configuration layer. `None` means "no opinion, inherit".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfigLayer {
    /// Bytes of stdout/stderr retained per hook for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_limit_bytes: Option<usize>,
    /// Signal the whole process group on termination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill_process_group: Option<bool>,
    /// Hooks without an `env` list inherit the caller's environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherit_env_when_unset: Option<bool>,
}

impl EngineConfigLayer {
    /// Load from a TOML file, returning an empty layer on error.
    fn load_from_file(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(layer) => layer,
                Err(e) => {
                    tracing::warn!("Failed to parse engine config at {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read engine config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Merge another layer into self, with `other` taking priority.
    fn merge_with(&mut self, other: Self) {
        if other.output_limit_bytes.is_some() {
            self.output_limit_bytes = other.output_limit_bytes;
        }
        if other.kill_process_group.is_some() {
            self.kill_process_group = other.kill_process_group;
        }
        if other.inherit_env_when_unset.is_some() {
            self.inherit_env_when_unset = other.inherit_env_when_unset;
        }
    }
}

/// Resolved engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub output_limit_bytes: usize,
    pub kill_process_group: bool,
    pub inherit_env_when_unset: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT,
            kill_process_group: true,
            inherit_env_when_unset: true,
        }
    }
}

impl EngineConfig {
    fn from_layer(layer: EngineConfigLayer) -> Self {
        let defaults = Self::default();
        Self {
            output_limit_bytes: layer
                .output_limit_bytes
                .unwrap_or(defaults.output_limit_bytes),
            kill_process_group: layer
                .kill_process_group
                .unwrap_or(defaults.kill_process_group),
            inherit_env_when_unset: layer
                .inherit_env_when_unset
                .unwrap_or(defaults.inherit_env_when_unset),
        }
    }

    pub fn spawn_options(&self) -> SpawnOptions {
        SpawnOptions {
            new_process_group: self.kill_process_group,
            output_limit: self.output_limit_bytes,
        }
    }
}

/// Load the engine config: global, then explicit file, then runtime overrides.
pub fn load_engine_config(
    explicit_path: Option<&Path>,
    global_path: Option<&Path>,
    runtime_overrides: Option<&EngineConfigLayer>,
) -> EngineConfig {
    let mut layer = EngineConfigLayer::default();

    if let Some(path) = global_path {
        layer.merge_with(EngineConfigLayer::load_from_file(path));
    }

    if let Some(path) = explicit_path {
        layer.merge_with(EngineConfigLayer::load_from_file(path));
    }

    if let Some(overrides) = runtime_overrides {
        layer.merge_with(overrides.clone());
    }

    EngineConfig::from_layer(layer)
}

/// Resolve the global engine config path.
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

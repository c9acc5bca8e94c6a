//! Gate configuration.
//!
//! A small TOML file selects the policy directory and the active policy.
//! Everything has a sensible default so the binary runs with no config at
//! all; an explicitly named config file must exist.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Directory of additional `*.json` policies, loaded next to the
    /// built-ins.
    pub policy_dir: Option<PathBuf>,
    /// Policy applied when the caller does not name one.
    pub active_policy: String,
    /// Log filter level for the tracing subscriber.
    pub log_level: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            policy_dir: None,
            active_policy: "standard".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl GateConfig {
    /// Default config location, e.g. `~/.config/svalinn/svalinn.toml`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("io", "vordr", "svalinn")
            .map(|dirs| dirs.config_dir().join("svalinn.toml"))
    }

    /// Load from an explicit path, or from the default location, falling
    /// back to defaults when no file exists there. An explicit path that
    /// does not exist is an error; a missing default file is not.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::read(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|err| ConfigError::Load(format!("{}: {err}", path.display())))
    }
}

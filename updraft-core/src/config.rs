//! `updraft.yaml`: optional per-installation configuration.
//!
//! Every section and key is optional; a missing file means all defaults.
//!
//! ```yaml
//! exclude:
//!   directories: [venv, .git, browser/2]
//!   name_patterns: ["snapshot_*", "update_*"]
//!   filenames: [config.json, social.db]
//! extract:
//!   reserved_prefixes: [__MACOSX]
//! dependencies:
//!   list_command: [pip-chill]
//!   install_command: [python3, -m, pip, install]
//! retry:
//!   max_attempts: 3
//!   initial_backoff_ms: 1000
//!   max_backoff_ms: 30000
//!   refetch: true
//! network:
//!   timeout_secs: 60
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paths::config_path_at;

/// Root of `updraft.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct UpdraftConfig {
    pub exclude: ExcludeConfig,
    pub extract: ExtractConfig,
    pub dependencies: DependencyConfig,
    pub retry: RetryConfig,
    pub network: NetworkConfig,
}

/// Paths kept out of snapshots (and therefore out of packages).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExcludeConfig {
    /// Relative directory paths, or bare directory names matched at any depth.
    pub directories: Vec<String>,
    /// Glob patterns matched against the basename.
    pub name_patterns: Vec<String>,
    /// Exact basenames.
    pub filenames: Vec<String>,
}

impl Default for ExcludeConfig {
    fn default() -> Self {
        Self {
            directories: ["venv", "win_venv", ".venv", ".win_venv", ".git"]
                .into_iter()
                .map(String::from)
                .collect(),
            name_patterns: vec!["snapshot_*".to_string(), "update_*".to_string()],
            filenames: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    /// Directory-segment prefixes marking hidden/system directories that
    /// extraction never writes into.
    pub reserved_prefixes: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            reserved_prefixes: vec!["__MACOSX".to_string()],
        }
    }
}

/// External dependency tooling. Each command is an argv vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct DependencyConfig {
    /// Prints one dependency requirement per line on stdout.
    pub list_command: Option<Vec<String>>,
    /// Invoked once per dependency requirement, appended as the final argument.
    pub install_command: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Download the package again before each retry.
    pub refetch: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            refetch: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

/// Load `<root>/updraft.yaml`, falling back to defaults when absent or empty.
pub fn load_at(root: &Path) -> Result<UpdraftConfig, ConfigError> {
    load_file(&config_path_at(root))
}

/// Load a configuration document from an explicit path.
pub fn load_file(path: &Path) -> Result<UpdraftConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(UpdraftConfig::default()),
        Err(e) => {
            return Err(ConfigError::Io {
                path: PathBuf::from(path),
                source: e,
            })
        }
    };
    if contents.trim().is_empty() {
        return Ok(UpdraftConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: PathBuf::from(path),
        source,
    })
}

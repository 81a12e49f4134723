//! Subcommand implementations and the helpers they share.

pub mod apply;
pub mod diff;
pub mod package;
pub mod resolve;
pub mod snapshot;
pub mod snapshots;
pub mod update;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use updraft_core::config::{self, UpdraftConfig};
use updraft_core::{marker, Version};
use updraft_snapshot::ExclusionPolicy;

/// `--root`, or the current directory.
pub fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(root) => Ok(root),
        None => std::env::current_dir().context("could not determine the current directory"),
    }
}

pub fn load_config(root: &Path) -> Result<UpdraftConfig> {
    config::load_at(root)
        .with_context(|| format!("failed to load configuration under {}", root.display()))
}

pub fn exclusion_policy(config: &UpdraftConfig) -> Result<ExclusionPolicy> {
    ExclusionPolicy::from_config(&config.exclude).context("invalid exclusion rules")
}

/// The marker version, if the installation has one.
pub fn installed_version(root: &Path) -> Result<Option<Version>> {
    marker::read_at(root)
        .with_context(|| format!("failed to read the version marker in {}", root.display()))
}

/// `--version`, else the installed version.
pub fn capture_version(root: &Path, explicit: Option<Version>) -> Result<Version> {
    if let Some(version) = explicit {
        return Ok(version);
    }
    installed_version(root)?
        .with_context(|| format!("no version marker in {}; pass --version", root.display()))
}

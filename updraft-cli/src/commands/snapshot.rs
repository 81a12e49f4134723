//! `updraft snapshot`: capture and store the current tree.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use updraft_core::Version;
use updraft_snapshot::{capture, dependencies::lister_from_config, store};

use super::{capture_version, exclusion_policy, load_config, resolve_root};

/// Arguments for `updraft snapshot`.
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Installation root (defaults to the current directory).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Version to record (defaults to the installed version).
    #[arg(long)]
    pub version: Option<Version>,
}

impl SnapshotArgs {
    pub fn run(self) -> Result<()> {
        let root = resolve_root(self.root)?;
        let config = load_config(&root)?;
        let version = capture_version(&root, self.version)?;
        let policy = exclusion_policy(&config)?;
        let lister = lister_from_config(&config.dependencies, &root);

        let snapshot = capture(&root, &version, &policy, lister.as_ref())
            .with_context(|| format!("failed to capture {}", root.display()))?;
        let path = store::persist_at(&root, &snapshot).context("failed to store snapshot")?;

        println!(
            "{} snapshot {}: {} files, {} directories",
            "✓".green().bold(),
            version.to_string().bold(),
            snapshot.files.len(),
            snapshot.directories.len()
        );
        println!("  {}", path.display());
        Ok(())
    }
}

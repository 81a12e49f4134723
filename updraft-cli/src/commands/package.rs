//! `updraft package`: capture the tree and package what changed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use updraft_core::{BaseVersion, Version};
use updraft_package::{capture_and_build, BaselineChoice};
use updraft_snapshot::dependencies::lister_from_config;

use super::{capture_version, exclusion_policy, load_config, resolve_root};

/// Arguments for `updraft package`.
#[derive(Args, Debug)]
pub struct PackageArgs {
    /// Installation root (defaults to the current directory).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Version the package upgrades to (defaults to the installed version).
    #[arg(long)]
    pub version: Option<Version>,

    /// Package every file, ignoring any stored baseline.
    #[arg(long, conflicts_with = "baseline")]
    pub full: bool,

    /// Snapshot document to diff against instead of the newest stored
    /// snapshot below `--version`.
    #[arg(long, value_name = "SNAPSHOT")]
    pub baseline: Option<PathBuf>,
}

impl PackageArgs {
    pub fn run(self) -> Result<()> {
        let root = resolve_root(self.root)?;
        let config = load_config(&root)?;
        let version = capture_version(&root, self.version)?;
        let policy = exclusion_policy(&config)?;
        let lister = lister_from_config(&config.dependencies, &root);

        let choice = match (&self.baseline, self.full) {
            (Some(path), _) => BaselineChoice::Explicit(path),
            (None, true) => BaselineChoice::Full,
            (None, false) => BaselineChoice::Latest,
        };
        let run = capture_and_build(&root, &version, &policy, lister.as_ref(), choice)
            .with_context(|| format!("failed to package {}", root.display()))?;
        let meta = &run.package.metadata;
        let changes = &meta.change_set;

        let kind = match &meta.from_version {
            BaseVersion::Any => "full".to_string(),
            BaseVersion::Exact(from) => format!("delta from {from}"),
        };
        println!(
            "{} package {} ({kind})",
            "✓".green().bold(),
            meta.to_version.to_string().bold()
        );
        println!("  {}", run.package.path.display());
        println!(
            "  {} added, {} modified, {} deleted files; {} added, {} deleted directories",
            changes.added_files.len(),
            changes.modified_files.len(),
            changes.deleted_files.len(),
            changes.added_dirs.len(),
            changes.deleted_dirs.len()
        );
        if let Some(baseline) = &run.baseline {
            println!("  baseline {}", baseline.display());
        }
        for omitted in &meta.omitted_files {
            println!("  {} omitted {omitted}", "!".yellow().bold());
        }
        Ok(())
    }
}

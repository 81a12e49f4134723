//! `updraft apply`: apply packages to an installation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use updraft_apply::{dependencies::installer_from_config, ApplyReport, Applier};

use super::{load_config, resolve_root};

/// Arguments for `updraft apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Installation root (defaults to the current directory).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Package files, applied in the order given.
    #[arg(required = true)]
    pub packages: Vec<PathBuf>,
}

impl ApplyArgs {
    pub fn run(self) -> Result<()> {
        let root = resolve_root(self.root)?;
        let config = load_config(&root)?;
        let installer = installer_from_config(&config.dependencies, &root);
        let applier = Applier::from_config(&root, &config, installer.as_ref());

        for package in &self.packages {
            let report = applier
                .apply(package)
                .with_context(|| format!("failed to apply {}", package.display()))?;
            print_report(&report);
        }
        Ok(())
    }
}

pub(crate) fn print_report(report: &ApplyReport) {
    println!(
        "{} applied {} -> {}",
        "✓".green().bold(),
        report.from_version,
        report.to_version.to_string().bold()
    );
    println!(
        "  {} removed, {} written, {} directories",
        report.removed, report.written, report.directories
    );
    for skipped in &report.skipped {
        println!("  {} skipped {} ({})", "!".yellow().bold(), skipped.name, skipped.reason);
    }
    for failed in &report.dependencies.failed {
        println!("  {} {failed}", "!".yellow().bold());
    }
}

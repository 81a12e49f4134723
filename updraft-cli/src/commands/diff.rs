//! `updraft diff`: compare two stored snapshot documents.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use updraft_snapshot::{diff, store};

/// Arguments for `updraft diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// The older snapshot document.
    pub old: PathBuf,

    /// The newer snapshot document.
    pub new: PathBuf,

    /// Emit the change set as JSON.
    #[arg(long)]
    pub json: bool,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let old = store::load(&self.old)
            .with_context(|| format!("failed to load {}", self.old.display()))?;
        let new = store::load(&self.new)
            .with_context(|| format!("failed to load {}", self.new.display()))?;
        let changes = diff(&old, &new);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&changes)?);
            return Ok(());
        }

        println!(
            "{} {} -> {}",
            "diff".bold(),
            old.version,
            new.version
        );
        if changes.is_empty() {
            println!("  no changes");
            return Ok(());
        }
        for path in &changes.added_dirs {
            println!("  {} {path}/", "+".green().bold());
        }
        for path in &changes.added_files {
            println!("  {} {path}", "+".green().bold());
        }
        for path in &changes.modified_files {
            println!("  {} {path}", "~".yellow().bold());
        }
        for path in &changes.deleted_files {
            println!("  {} {path}", "-".red().bold());
        }
        for path in &changes.deleted_dirs {
            println!("  {} {path}/", "-".red().bold());
        }
        Ok(())
    }
}

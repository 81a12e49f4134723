//! `updraft resolve`: show the update chain a feed offers.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use updraft_apply::{resolve, LocationFetcher, TransitionMap};
use updraft_core::Version;

use super::{installed_version, load_config, resolve_root};

/// Arguments for `updraft resolve`.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Transition feed: a local file or an http(s) URL.
    #[arg(long)]
    pub feed: String,

    /// Installation root (defaults to the current directory).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Resolve from this version instead of the installed one.
    #[arg(long)]
    pub current: Option<Version>,
}

impl ResolveArgs {
    pub fn run(self) -> Result<()> {
        let root = resolve_root(self.root)?;
        let config = load_config(&root)?;
        let current = match self.current {
            Some(v) => v,
            None => installed_version(&root)?.unwrap_or_else(Version::zero),
        };

        let map = read_feed(&self.feed, config.network.timeout_secs)?;
        let chain = resolve(&current, &map);
        if chain.is_empty() {
            println!("{} {current} is up to date", "✓".green().bold());
            return Ok(());
        }
        for (index, step) in chain.iter().enumerate() {
            println!("{:>3}. {step}  {}", index + 1, step.location.dimmed());
        }
        Ok(())
    }
}

/// Fetch and parse a feed. Malformed lines are reported by the parser and
/// dropped.
pub(crate) fn read_feed(feed: &str, timeout_secs: u64) -> Result<TransitionMap> {
    let cwd = std::env::current_dir().context("could not determine the current directory")?;
    let text = LocationFetcher::new(cwd, Duration::from_secs(timeout_secs))
        .read_text(feed)
        .with_context(|| format!("failed to read feed {feed}"))?;
    let (map, errors) = TransitionMap::parse(&text);
    if !errors.is_empty() {
        eprintln!(
            "{} {} malformed feed line(s) ignored",
            "!".yellow().bold(),
            errors.len()
        );
    }
    Ok(map)
}

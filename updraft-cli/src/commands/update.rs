//! `updraft update`: walk the feed's chain, fetching and applying each step.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use updraft_apply::{
    dependencies::installer_from_config, feed_base, Applier, ChainDriver, LocationFetcher,
    RetryPolicy,
};

use super::apply::print_report;
use super::resolve::read_feed;
use super::{load_config, resolve_root};

/// Arguments for `updraft update`.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Transition feed: a local file or an http(s) URL. Relative package
    /// locations in a local feed resolve against the feed's directory.
    #[arg(long)]
    pub feed: String,

    /// Installation root (defaults to the current directory).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Attempts per step, overriding `retry.max_attempts`.
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

impl UpdateArgs {
    pub fn run(self) -> Result<()> {
        let root = resolve_root(self.root)?;
        let config = load_config(&root)?;
        let timeout = config.network.timeout_secs;

        let mut policy = RetryPolicy::from_config(&config.retry);
        if let Some(n) = self.max_attempts {
            policy.max_attempts = n;
        }

        let map = read_feed(&self.feed, timeout)?;
        let cwd = std::env::current_dir().context("could not determine the current directory")?;
        let fetcher = LocationFetcher::new(feed_base(&self.feed, &cwd), Duration::from_secs(timeout));
        let installer = installer_from_config(&config.dependencies, &root);
        let applier = Applier::from_config(&root, &config, installer.as_ref());

        let report = ChainDriver::new(&applier, &fetcher, policy)
            .run(&map)
            .context("update failed before any step ran")?;

        if report.planned.is_empty() {
            println!("{} {} is up to date", "✓".green().bold(), report.started_at);
            return Ok(());
        }
        for applied in &report.applied {
            print_report(applied);
        }
        if let Some(failure) = &report.failure {
            bail!(
                "step {} failed after {} attempt(s); installation left at {}: {}",
                failure.transition,
                failure.attempts,
                report.reached,
                failure.last_error
            );
        }
        println!(
            "{} updated {} -> {}",
            "■".green().bold(),
            report.started_at,
            report.reached.to_string().bold()
        );
        Ok(())
    }
}

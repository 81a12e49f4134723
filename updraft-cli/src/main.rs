//! updraft: snapshot, package and apply application updates.
//!
//! # Usage
//!
//! ```text
//! updraft snapshot  [--root DIR] [--version V]
//! updraft snapshots [--root DIR] [--json]
//! updraft package   [--root DIR] [--version V] [--full]
//! updraft diff <OLD> <NEW> [--json]
//! updraft apply     [--root DIR] <PACKAGE>...
//! updraft resolve   --feed LOC [--root DIR] [--current V]
//! updraft update    --feed LOC [--root DIR] [--max-attempts N]
//! ```
//!
//! Logs go to stderr (`RUST_LOG` overrides the level); command output goes
//! to stdout.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    apply::ApplyArgs, diff::DiffArgs, package::PackageArgs, resolve::ResolveArgs,
    snapshot::SnapshotArgs, snapshots::SnapshotsArgs, update::UpdateArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "updraft",
    version,
    about = "Snapshot an application tree, package what changed, apply packages in order",
    long_about = None,
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture and store a snapshot of the installation tree.
    Snapshot(SnapshotArgs),

    /// List stored snapshots, newest first.
    Snapshots(SnapshotsArgs),

    /// Capture a snapshot and package the changes since the baseline.
    Package(PackageArgs),

    /// Show the change set between two snapshot documents.
    Diff(DiffArgs),

    /// Apply one or more packages, in the order given.
    Apply(ApplyArgs),

    /// Print the chain of packages a feed offers from the current version.
    Resolve(ResolveArgs),

    /// Resolve, fetch and apply every step of the chain, with retry.
    Update(UpdateArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    tracing::debug!(command = ?cli.command, "dispatching");
    match cli.command {
        Commands::Snapshot(args) => args.run(),
        Commands::Snapshots(args) => args.run(),
        Commands::Package(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Apply(args) => args.run(),
        Commands::Resolve(args) => args.run(),
        Commands::Update(args) => args.run(),
    }
}

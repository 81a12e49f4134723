//! `updraft snapshots`: list the snapshot store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use updraft_snapshot::store;

use super::resolve_root;

/// Arguments for `updraft snapshots`.
#[derive(Args, Debug)]
pub struct SnapshotsArgs {
    /// Installation root (defaults to the current directory).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct SnapshotJson {
    version: String,
    timestamp: String,
    path: String,
}

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Captured")]
    captured: String,
    #[tabled(rename = "File")]
    file: String,
}

impl SnapshotsArgs {
    pub fn run(self) -> Result<()> {
        let root = resolve_root(self.root)?;
        let entries = store::list_at(&root)
            .with_context(|| format!("failed to read snapshots under {}", root.display()))?;

        if self.json {
            let json: Vec<SnapshotJson> = entries
                .iter()
                .map(|e| SnapshotJson {
                    version: e.version.to_string(),
                    timestamp: e.timestamp.to_rfc3339(),
                    path: e.path.display().to_string(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
            return Ok(());
        }

        if entries.is_empty() {
            println!("No snapshots under {}.", root.display());
            return Ok(());
        }

        let rows: Vec<SnapshotRow> = entries
            .iter()
            .map(|e| SnapshotRow {
                version: e.version.to_string(),
                captured: e.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                file: e
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

//! Dependency listing collaborator used at capture time.
//!
//! The list is opaque to updraft: one `name==version`-style requirement per entry,
//! in the order the lister produced them.

use std::path::{Path, PathBuf};
use std::process::Command;

use updraft_core::config::DependencyConfig;

use crate::error::SnapshotError;

/// Reports the external dependencies currently in effect.
pub trait DependencyLister {
    fn list(&self) -> Result<Vec<String>, SnapshotError>;
}

/// Always reports an empty list.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDependencies;

impl DependencyLister for NoDependencies {
    fn list(&self) -> Result<Vec<String>, SnapshotError> {
        Ok(Vec::new())
    }
}

/// Reports a fixed list.
#[derive(Debug, Clone, Default)]
pub struct StaticDependencies(pub Vec<String>);

impl DependencyLister for StaticDependencies {
    fn list(&self) -> Result<Vec<String>, SnapshotError> {
        Ok(self.0.clone())
    }
}

/// Runs a command and takes each non-blank stdout line as a dependency.
#[derive(Debug, Clone)]
pub struct CommandLister {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
}

impl CommandLister {
    /// `None` if `argv` is empty.
    pub fn new(argv: &[String], cwd: &Path) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            cwd: cwd.to_path_buf(),
        })
    }
}

impl DependencyLister for CommandLister {
    fn list(&self) -> Result<Vec<String>, SnapshotError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.cwd)
            .output()
            .map_err(|e| SnapshotError::Dependencies(format!("cannot run {}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(SnapshotError::Dependencies(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_listing(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Non-blank, non-comment lines, trimmed.
pub fn parse_listing(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Lister described by `config`, run from `root`.
pub fn lister_from_config(config: &DependencyConfig, root: &Path) -> Box<dyn DependencyLister> {
    match config
        .list_command
        .as_deref()
        .and_then(|argv| CommandLister::new(argv, root))
    {
        Some(lister) => Box::new(lister),
        None => Box::new(NoDependencies),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn listing_skips_blanks_and_comments() {
        let parsed = parse_listing("requests==2.31.0\n\n# pinned\n  rich==13.0  \n");
        assert_eq!(parsed, vec!["requests==2.31.0", "rich==13.0"]);
    }

    #[test]
    fn empty_argv_yields_no_lister() {
        let tmp = TempDir::new().unwrap();
        assert!(CommandLister::new(&[], tmp.path()).is_none());
        let config = DependencyConfig::default();
        assert!(lister_from_config(&config, tmp.path()).list().unwrap().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn command_output_becomes_list() {
        let tmp = TempDir::new().unwrap();
        let argv = vec![
            "sh".to_string(),
            "-c".to_string(),
            "printf 'a==1\\nb==2\\n'".to_string(),
        ];
        let lister = CommandLister::new(&argv, tmp.path()).unwrap();
        assert_eq!(lister.list().unwrap(), vec!["a==1", "b==2"]);
    }

    #[test]
    #[cfg(unix)]
    fn failing_command_is_reported() {
        let tmp = TempDir::new().unwrap();
        let argv = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
        let lister = CommandLister::new(&argv, tmp.path()).unwrap();
        let err = lister.list().unwrap_err();
        assert!(matches!(err, SnapshotError::Dependencies(_)), "got: {err}");
    }
}

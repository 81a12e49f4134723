//! Dependency reconciliation collaborator.
//!
//! Reconciliation is best effort: each missing dependency is installed on
//! its own, failures are recorded and the rest carry on. Nothing verifies
//! the environment afterwards.

use std::path::{Path, PathBuf};
use std::process::Command;

use updraft_core::config::DependencyConfig;

use crate::error::InstallError;

/// Installs one dependency requirement at a time.
pub trait DependencyInstaller {
    fn install(&self, requirement: &str) -> Result<(), InstallError>;

    /// `false` if this installer never does anything.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Used when no install command is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInstaller;

impl DependencyInstaller for NoopInstaller {
    fn install(&self, _requirement: &str) -> Result<(), InstallError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Runs `program args... <requirement>` once per dependency.
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
}

impl CommandInstaller {
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

impl DependencyInstaller for CommandInstaller {
    fn install(&self, requirement: &str) -> Result<(), InstallError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(requirement)
            .current_dir(&self.cwd)
            .output()
            .map_err(|e| InstallError {
                requirement: requirement.to_string(),
                reason: format!("cannot run {}: {e}", self.program),
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(InstallError {
                requirement: requirement.to_string(),
                reason: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }
}

pub fn installer_from_config(config: &DependencyConfig, root: &Path) -> Box<dyn DependencyInstaller> {
    match config
        .install_command
        .as_deref()
        .and_then(|argv| CommandInstaller::new(argv, root))
    {
        Some(installer) => Box::new(installer),
        None => Box::new(NoopInstaller),
    }
}

/// What reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub installed: Vec<String>,
    pub failed: Vec<InstallError>,
    /// Pending requirements left alone because no installer is configured.
    pub skipped: Vec<String>,
}

impl InstallReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Entries of `after` absent from `before`, in `after` order, without
/// blanks, comments or repeats.
pub fn pending(before: &[String], after: &[String]) -> Vec<String> {
    let usable = |s: &String| {
        let t = s.trim();
        (!t.is_empty() && !t.starts_with('#')).then(|| t.to_string())
    };
    let installed: Vec<String> = before.iter().filter_map(usable).collect();
    let mut out: Vec<String> = Vec::new();
    for requirement in after.iter().filter_map(usable) {
        if !installed.contains(&requirement) && !out.contains(&requirement) {
            out.push(requirement);
        }
    }
    out
}

/// Install everything in `after` that `before` lacks.
pub fn reconcile(
    installer: &dyn DependencyInstaller,
    before: &[String],
    after: &[String],
) -> InstallReport {
    let todo = pending(before, after);
    let mut report = InstallReport::default();
    if todo.is_empty() {
        return report;
    }
    if !installer.is_enabled() {
        tracing::info!(pending = todo.len(), "no install command configured; dependencies left as they are");
        report.skipped = todo;
        return report;
    }

    for requirement in todo {
        match installer.install(&requirement) {
            Ok(()) => {
                tracing::info!(dependency = %requirement, "installed dependency");
                report.installed.push(requirement);
            }
            Err(err) => {
                tracing::warn!(dependency = %requirement, error = %err, "dependency install failed");
                report.failed.push(err);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recording {
        calls: RefCell<Vec<String>>,
        fail: &'static str,
    }

    impl DependencyInstaller for Recording {
        fn install(&self, requirement: &str) -> Result<(), InstallError> {
            self.calls.borrow_mut().push(requirement.to_string());
            if requirement == self.fail {
                Err(InstallError {
                    requirement: requirement.to_string(),
                    reason: "boom".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn pending_is_new_entries_only() {
        let before = strings(&["a==1", "b==1"]);
        let after = strings(&["a==1", " b==2 ", "", "# comment", "c==3", "c==3"]);
        assert_eq!(pending(&before, &after), vec!["b==2", "c==3"]);
    }

    #[test]
    fn failures_do_not_stop_reconciliation() {
        let installer = Recording {
            calls: RefCell::new(Vec::new()),
            fail: "b==2",
        };
        let report = reconcile(&installer, &[], &strings(&["a==1", "b==2", "c==3"]));
        assert_eq!(*installer.calls.borrow(), vec!["a==1", "b==2", "c==3"]);
        assert_eq!(report.installed, vec!["a==1", "c==3"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].requirement, "b==2");
        assert!(!report.is_clean());
    }

    #[test]
    fn noop_installer_skips_everything() {
        let report = reconcile(&NoopInstaller, &[], &strings(&["a==1"]));
        assert_eq!(report.skipped, vec!["a==1"]);
        assert!(report.installed.is_empty());
        assert!(report.is_clean());
    }

    #[test]
    #[cfg(unix)]
    fn command_installer_appends_requirement() {
        let tmp = tempfile::TempDir::new().unwrap();
        let argv = strings(&["sh", "-c", "echo \"$0\" >> installed.txt"]);
        let installer = CommandInstaller::new(&argv, tmp.path()).unwrap();
        installer.install("rich==13").unwrap();
        let log = std::fs::read_to_string(tmp.path().join("installed.txt")).unwrap();
        assert_eq!(log.trim(), "rich==13");

        let failing = CommandInstaller::new(&strings(&["sh", "-c", "exit 1"]), tmp.path()).unwrap();
        assert!(failing.install("x").is_err());
    }
}

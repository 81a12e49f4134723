//! Chain driver: resolve, fetch and apply each step with retry.
//!
//! Steps run one at a time. A package is fully fetched before its apply
//! begins. When a step exhausts its attempts the driver stops; every step
//! before it stays committed and the marker still names the last
//! successful target.

use std::path::{Path, PathBuf};
use std::time::Duration;

use updraft_core::paths::download_dir_at;
use updraft_core::{marker, Version};

use crate::applier::{ApplyReport, Applier};
use crate::chain::{resolve, Transition, TransitionMap};
use crate::error::{DriverError, StepError};
use crate::fetch::PackageFetcher;
use crate::retry::RetryPolicy;

/// A step that was given up on.
#[derive(Debug)]
pub struct StepFailure {
    pub transition: Transition,
    pub attempts: u32,
    pub last_error: StepError,
}

#[derive(Debug)]
pub struct ChainReport {
    pub started_at: Version,
    pub reached: Version,
    pub planned: Vec<Transition>,
    pub applied: Vec<ApplyReport>,
    pub failure: Option<StepFailure>,
}

impl ChainReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct ChainDriver<'a> {
    applier: &'a Applier<'a>,
    fetcher: &'a dyn PackageFetcher,
    policy: RetryPolicy,
    sleep: fn(Duration),
}

impl<'a> ChainDriver<'a> {
    pub fn new(
        applier: &'a Applier<'a>,
        fetcher: &'a dyn PackageFetcher,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            applier,
            fetcher,
            policy,
            sleep: std::thread::sleep,
        }
    }

    /// Replace the function used to wait between attempts.
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    /// Bring the installation as far forward as `map` allows.
    ///
    /// A missing version marker counts as `0.0.0`.
    pub fn run(&self, map: &TransitionMap) -> Result<ChainReport, DriverError> {
        let root = self.applier.root();
        let started_at = marker::read_at(root)?.unwrap_or_else(Version::zero);
        let planned = resolve(&started_at, map);

        let mut report = ChainReport {
            reached: started_at.clone(),
            started_at,
            planned: planned.clone(),
            applied: Vec::new(),
            failure: None,
        };
        if planned.is_empty() {
            tracing::info!(version = %report.started_at, "already at the latest reachable version");
            return Ok(report);
        }
        tracing::info!(
            from = %report.started_at,
            to = %planned[planned.len() - 1].to,
            steps = planned.len(),
            "resolved update chain"
        );

        let downloads = download_dir_at(root);
        std::fs::create_dir_all(&downloads).map_err(|source| DriverError::Io {
            path: downloads.clone(),
            source,
        })?;

        for (index, step) in planned.into_iter().enumerate() {
            let dest = downloads.join(download_name(index, &step));
            match self.run_step(&step, &dest) {
                Ok(applied) => {
                    report.reached = applied.to_version.clone();
                    report.applied.push(applied);
                    if let Err(err) = std::fs::remove_file(&dest) {
                        tracing::debug!(path = %dest.display(), error = %err, "could not remove applied package");
                    }
                }
                Err((attempts, last_error)) => {
                    tracing::error!(
                        transition = %step,
                        attempts,
                        error = %last_error,
                        "giving up on update step"
                    );
                    report.failure = Some(StepFailure {
                        transition: step,
                        attempts,
                        last_error,
                    });
                    break;
                }
            }
        }
        Ok(report)
    }

    fn run_step(&self, step: &Transition, dest: &Path) -> Result<ApplyReport, (u32, StepError)> {
        let attempts = self.policy.attempts();
        let mut fetched = false;
        let mut attempt = 1;
        loop {
            let outcome = (|| -> Result<ApplyReport, StepError> {
                if !fetched || self.policy.refetch {
                    self.fetcher.fetch(&step.location, dest)?;
                    fetched = true;
                }
                Ok(self.applier.apply(dest)?)
            })();

            let err = match outcome {
                Ok(applied) => return Ok(applied),
                Err(err) => err,
            };
            if attempt >= attempts {
                return Err((attempt, err));
            }
            let delay = self.policy.delay_for(attempt);
            tracing::warn!(
                transition = %step,
                attempt,
                of = attempts,
                error = %err,
                retry_in_ms = delay.as_millis() as u64,
                "update step failed; retrying"
            );
            (self.sleep)(delay);
            attempt += 1;
        }
    }
}

fn download_name(index: usize, step: &Transition) -> String {
    format!("step{:02}_{}_to_{}.zip", index + 1, step.from, step.to)
}

/// Directory that relative package locations in a local feed resolve
/// against: the feed's own directory, else `fallback`.
pub fn feed_base(feed_location: &str, fallback: &Path) -> PathBuf {
    if crate::fetch::is_remote(feed_location) {
        return fallback.to_path_buf();
    }
    Path::new(feed_location)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| fallback.to_path_buf())
}

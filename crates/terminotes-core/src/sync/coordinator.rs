//! Sync coordinator
//!
//! The single "synchronize now" entry point. A call runs at most one
//! detector pass and one resolution, and never retries.

use std::path::PathBuf;

use tracing::info;

use super::divergence::detect_divergence;
use super::error::SyncResult;
use super::outcome::{SyncOutcome, SyncReport};
use super::repository::VersionControl;
use super::resolution::{ensure_clean, ResolutionPolicy, ResolutionPrompt};

/// Inputs the sync engine is constructed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Working copy root (the notes directory)
    pub work_dir: PathBuf,
    /// Remote URL; `None` selects local-only mode
    pub remote_url: Option<String>,
    /// The single tracked file, relative to `work_dir`
    pub tracked_file: PathBuf,
    /// Whether a terminal is attached for prompting
    pub interactive: bool,
}

/// Drives divergence detection and resolution for one working copy
pub struct SyncCoordinator<R: VersionControl> {
    repo: R,
    policy: ResolutionPolicy,
    prompt: Box<dyn ResolutionPrompt>,
}

impl<R: VersionControl> SyncCoordinator<R> {
    pub fn new(repo: R, settings: &SyncSettings, prompt: Box<dyn ResolutionPrompt>) -> Self {
        Self {
            repo,
            policy: ResolutionPolicy::new(settings.interactive),
            prompt,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Synchronize the working copy with its remote
    ///
    /// With `dry_run` the classification and the action that would follow are
    /// reported, and nothing is committed, pushed or reset.
    pub fn synchronize(&mut self, dry_run: bool) -> SyncResult<SyncReport> {
        if self.repo.remote_url().is_none() {
            info!("No remote configured; sync is a no-op");
            return Ok(SyncReport::new(
                SyncOutcome::NoOp,
                None,
                "Local-only mode: no remote configured, nothing to synchronize.",
            ));
        }

        ensure_clean(&self.repo)?;
        let divergence = detect_divergence(&self.repo)?;
        info!("Divergence: {}", divergence.label());

        if dry_run {
            let action = self.policy.plan(&divergence);
            return Ok(SyncReport::new(
                SyncOutcome::DryRun,
                Some(divergence),
                format!("Dry run: {}; {}.", divergence, action),
            ));
        }

        let report = self
            .policy
            .apply(&self.repo, divergence, self.prompt.as_mut())?;
        info!("Sync finished: {}", report.outcome.label());
        Ok(report)
    }

    /// Dry run for a tracked file with uncommitted changes
    ///
    /// Reports what a real sync would do after first recording the pending
    /// changes as a local commit. Nothing is committed here.
    pub fn preview_with_pending_changes(&mut self) -> SyncResult<SyncReport> {
        if self.repo.remote_url().is_none() {
            return self.synchronize(true);
        }

        let divergence = detect_divergence(&self.repo)?.with_pending_commit();
        info!("Divergence with pending changes: {}", divergence.label());
        let action = self.policy.plan(&divergence);
        Ok(SyncReport::new(
            SyncOutcome::DryRun,
            Some(divergence),
            format!(
                "Dry run: would record pending changes first; then {}; {}.",
                divergence, action
            ),
        ))
    }
}

//! Pluggable sync providers
//!
//! The store never talks to git directly. It holds a [`SyncProvider`] and
//! calls it around every write and when the operator asks for a sync.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, warn};

use super::commit::{commit_store_update, CommitStatus, StoreChange};
use super::coordinator::{SyncCoordinator, SyncSettings};
use super::error::SyncResult;
use super::git::GitRepository;
use super::outcome::{SyncOutcome, SyncReport};
use super::repository::{TreeState, VersionControl};
use super::resolution::{NoPrompt, ResolutionPrompt};

/// Snapshot of the provider for `tn info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub backend: &'static str,
    pub work_dir: Option<PathBuf>,
    pub remote_url: Option<String>,
    pub branch: Option<String>,
    pub tree: Option<TreeState>,
    pub has_upstream: bool,
}

/// Capability interface between the store and version control
pub trait SyncProvider {
    /// Short backend name, as written in the config file
    fn name(&self) -> &'static str;

    /// Prepare the working copy. Must run before the database file is opened.
    fn bootstrap(&mut self) -> SyncResult<()>;

    /// Called before a mutation is persisted
    fn before_write(&mut self) -> SyncResult<()>;

    /// Called once after a mutation was persisted
    fn after_write(&mut self, change: StoreChange) -> SyncResult<CommitStatus>;

    /// Synchronize with the remote
    fn sync(&mut self, dry_run: bool) -> SyncResult<SyncReport>;

    fn status(&mut self) -> SyncResult<ProviderStatus>;
}

/// Git-backed provider: local commit per write, explicit sync
pub struct GitSyncProvider {
    settings: SyncSettings,
    prompt: Option<Box<dyn ResolutionPrompt>>,
    coordinator: Option<SyncCoordinator<GitRepository>>,
}

impl GitSyncProvider {
    pub fn new(settings: SyncSettings, prompt: Box<dyn ResolutionPrompt>) -> Self {
        Self {
            settings,
            prompt: Some(prompt),
            coordinator: None,
        }
    }

    /// Provider for sessions that can never prompt
    pub fn non_interactive(mut settings: SyncSettings) -> Self {
        settings.interactive = false;
        Self::new(settings, Box::new(NoPrompt))
    }

    /// The coordinator, opening or creating the working copy on first use
    fn coordinator(&mut self) -> SyncResult<&mut SyncCoordinator<GitRepository>> {
        let coordinator = match self.coordinator.take() {
            Some(coordinator) => coordinator,
            None => {
                let repo = GitRepository::ensure_local_clone(&self.settings)?;
                let prompt = self
                    .prompt
                    .take()
                    .unwrap_or_else(|| Box::new(NoPrompt) as Box<dyn ResolutionPrompt>);
                SyncCoordinator::new(repo, &self.settings, prompt)
            }
        };
        Ok(self.coordinator.insert(coordinator))
    }

    /// Record tracked-file changes an earlier failed commit left behind
    fn catch_up(&mut self) -> SyncResult<()> {
        let repo = self.coordinator()?.repository();
        if repo.status()?.is_clean() {
            return Ok(());
        }
        warn!("Notes database has uncommitted changes; recording them before sync");
        commit_store_update(repo, StoreChange::PendingChanges)?;
        Ok(())
    }
}

impl SyncProvider for GitSyncProvider {
    fn name(&self) -> &'static str {
        "git"
    }

    fn bootstrap(&mut self) -> SyncResult<()> {
        self.coordinator().map(|_| ())
    }

    fn before_write(&mut self) -> SyncResult<()> {
        let repo = self.coordinator()?.repository();
        if !repo.status()?.is_clean() {
            debug!("Tracked file already dirty before write; the next commit records both");
        }
        Ok(())
    }

    fn after_write(&mut self, change: StoreChange) -> SyncResult<CommitStatus> {
        let repo = self.coordinator()?.repository();
        commit_store_update(repo, change)
    }

    fn sync(&mut self, dry_run: bool) -> SyncResult<SyncReport> {
        if self.settings.remote_url.is_some() {
            if !dry_run {
                self.catch_up()?;
            } else if !self.coordinator()?.repository().status()?.is_clean() {
                return self.coordinator()?.preview_with_pending_changes();
            }
        }
        self.coordinator()?.synchronize(dry_run)
    }

    fn status(&mut self) -> SyncResult<ProviderStatus> {
        let backend = self.name();
        let repo = self.coordinator()?.repository();
        Ok(ProviderStatus {
            backend,
            work_dir: Some(repo.work_dir().to_path_buf()),
            remote_url: repo.remote_url().map(str::to_string),
            branch: Some(repo.current_branch()?),
            tree: Some(repo.status()?),
            has_upstream: repo.has_upstream()?,
        })
    }
}

/// Provider that keeps no history at all
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSyncProvider;

impl SyncProvider for NoopSyncProvider {
    fn name(&self) -> &'static str {
        "none"
    }

    fn bootstrap(&mut self) -> SyncResult<()> {
        Ok(())
    }

    fn before_write(&mut self) -> SyncResult<()> {
        Ok(())
    }

    fn after_write(&mut self, _change: StoreChange) -> SyncResult<CommitStatus> {
        Ok(CommitStatus::Skipped)
    }

    fn sync(&mut self, _dry_run: bool) -> SyncResult<SyncReport> {
        Ok(SyncReport::new(
            SyncOutcome::NoOp,
            None,
            "Sync is disabled (sync_backend = \"none\").",
        ))
    }

    fn status(&mut self) -> SyncResult<ProviderStatus> {
        Ok(ProviderStatus {
            backend: self.name(),
            work_dir: None,
            remote_url: None,
            branch: None,
            tree: None,
            has_upstream: false,
        })
    }
}

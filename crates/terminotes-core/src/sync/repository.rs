//! Repository handle contract
//!
//! Everything the sync engine does to version control goes through
//! [`VersionControl`]. The git implementation lives in `git.rs`; tests drive
//! the engine through a scripted double instead of a real repository.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use super::error::SyncResult;

/// State of the tracked file relative to HEAD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeState {
    Clean,
    Dirty,
}

impl TreeState {
    pub fn is_clean(self) -> bool {
        matches!(self, TreeState::Clean)
    }
}

impl fmt::Display for TreeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeState::Clean => write!(f, "clean"),
            TreeState::Dirty => write!(f, "dirty"),
        }
    }
}

/// Commit counts of one ref relative to another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AheadBehind {
    /// Commits reachable from the local tip only
    pub ahead: usize,
    /// Commits reachable from the remote-tracking tip only
    pub behind: usize,
}

/// The local branch and the remote-tracking ref it follows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingRefs {
    /// Short branch name, e.g. `main`
    pub branch: String,
    /// Full local ref, e.g. `refs/heads/main`
    pub local: String,
    /// Full remote-tracking ref, e.g. `refs/remotes/origin/main`
    pub remote_tracking: String,
}

/// Primitive version-control operations on one working copy
///
/// Implementations must only ever touch the single tracked file and the
/// branch it lives on. Network-facing methods block until the transport
/// returns.
pub trait VersionControl {
    /// Working copy root
    fn work_dir(&self) -> &Path;

    /// Remote URL, `None` in local-only mode
    fn remote_url(&self) -> Option<&str>;

    /// Tracked file, relative to the working copy root
    fn tracked_file(&self) -> &Path;

    /// Whether the tracked file differs from HEAD
    fn status(&self) -> SyncResult<TreeState>;

    /// Stage and commit the tracked file only
    ///
    /// Fails with `SyncError::NoChanges` when the file matches HEAD.
    fn commit(&self, message: &str) -> SyncResult<String>;

    /// Fetch the remote, updating remote-tracking refs
    fn fetch_remote(&self) -> SyncResult<()>;

    /// Count commits unique to each side of `local` and `remote_tracking`
    fn compare_refs(&self, local: &str, remote_tracking: &str) -> SyncResult<AheadBehind>;

    /// Current branch and its upstream, `None` when no upstream is set
    fn tracking_refs(&self) -> SyncResult<Option<TrackingRefs>>;

    /// Name of the checked-out branch (may be unborn)
    fn current_branch(&self) -> SyncResult<String>;

    /// Ordinary push of the current branch to its upstream
    fn push(&self) -> SyncResult<()>;

    /// Force push that refuses to overwrite a remote that moved after the last fetch
    fn force_push_with_lease(&self) -> SyncResult<()>;

    /// Drop local commits and adopt the remote-tracking tip exactly
    fn hard_reset_to_remote(&self) -> SyncResult<()>;

    /// First publish: push the current branch and record its upstream
    fn set_upstream_and_push(&self) -> SyncResult<()>;

    fn has_upstream(&self) -> SyncResult<bool> {
        Ok(self.tracking_refs()?.is_some())
    }
}

//! Local commit step
//!
//! Runs after every successful store mutation. Commits the tracked file with a
//! deterministic message and never touches the network.

use std::fmt;

use tracing::{debug, info};

use super::error::{SyncError, SyncResult};
use super::repository::VersionControl;

/// A persisted change to the notes database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Created(i64),
    Updated(i64),
    Deleted(i64),
    PrunedTags,
    Initialized,
    /// Catch-up commit for changes an earlier commit failed to record
    PendingChanges,
}

impl StoreChange {
    /// Commit message recorded for this change
    pub fn commit_message(&self) -> String {
        format!("chore(db): {}", self)
    }

    /// Human-readable subject, used in error context
    pub fn subject(&self) -> String {
        match self {
            StoreChange::Created(id) | StoreChange::Updated(id) | StoreChange::Deleted(id) => {
                format!("Note {}", id)
            }
            StoreChange::PrunedTags => "Tag cleanup".to_string(),
            StoreChange::Initialized => "The notes database".to_string(),
            StoreChange::PendingChanges => "Pending changes".to_string(),
        }
    }
}

impl fmt::Display for StoreChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreChange::Created(id) => write!(f, "create note {}", id),
            StoreChange::Updated(id) => write!(f, "update note {}", id),
            StoreChange::Deleted(id) => write!(f, "delete note {}", id),
            StoreChange::PrunedTags => write!(f, "prune tags"),
            StoreChange::Initialized => write!(f, "initialize notes database"),
            StoreChange::PendingChanges => write!(f, "record pending changes"),
        }
    }
}

/// Result of a local commit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStatus {
    /// A commit was created with this id
    Committed(String),
    /// The tracked file already matched HEAD
    NothingToCommit,
    /// The provider keeps no history
    Skipped,
}

/// Commit the tracked file for `change`
///
/// `NoChanges` from the repository is not an error here.
pub fn commit_store_update<R: VersionControl + ?Sized>(
    repo: &R,
    change: StoreChange,
) -> SyncResult<CommitStatus> {
    let message = change.commit_message();
    match repo.commit(&message) {
        Ok(id) => {
            info!("Committed {} ({})", message, id);
            Ok(CommitStatus::Committed(id))
        }
        Err(SyncError::NoChanges) => {
            debug!("Nothing to commit for '{}'", message);
            Ok(CommitStatus::NothingToCommit)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::repository::TreeState;
    use crate::sync::test_support::{write_db, Call, GitFixture, ScriptedRepository};

    #[test]
    fn test_commit_messages_are_deterministic() {
        assert_eq!(
            StoreChange::Created(12).commit_message(),
            "chore(db): create note 12"
        );
        assert_eq!(
            StoreChange::Updated(12).commit_message(),
            "chore(db): update note 12"
        );
        assert_eq!(
            StoreChange::Deleted(3).commit_message(),
            "chore(db): delete note 3"
        );
        assert_eq!(
            StoreChange::PrunedTags.commit_message(),
            "chore(db): prune tags"
        );
        assert_eq!(
            StoreChange::Initialized.commit_message(),
            "chore(db): initialize notes database"
        );
    }

    #[test]
    fn test_no_changes_is_swallowed() {
        let repo = ScriptedRepository::new(true, true, 0, 0);
        *repo.commit_error.borrow_mut() = Some(SyncError::NoChanges);

        let status = commit_store_update(&repo, StoreChange::Updated(1)).unwrap();

        assert_eq!(status, CommitStatus::NothingToCommit);
        assert_eq!(
            repo.calls(),
            vec![Call::Commit("chore(db): update note 1".to_string())]
        );
    }

    #[test]
    fn test_other_failures_propagate() {
        let repo = ScriptedRepository::new(false, false, 0, 0);
        *repo.commit_error.borrow_mut() = Some(SyncError::Command {
            operation: "commit".to_string(),
            details: "no identity".to_string(),
        });

        let err = commit_store_update(&repo, StoreChange::Created(4)).unwrap_err();
        assert!(matches!(err, SyncError::Command { .. }));
    }

    #[test]
    fn test_commit_never_touches_network() {
        let repo = ScriptedRepository::new(true, true, 0, 0);
        commit_store_update(&repo, StoreChange::Created(1)).unwrap();

        assert!(repo
            .calls()
            .iter()
            .all(|call| matches!(call, Call::Commit(_))));
    }

    #[test]
    fn test_commit_leaves_real_tree_clean() {
        let fixture = GitFixture::new();
        let (dir, repo) = fixture.local_clone("laptop");

        write_db(&dir, b"one");
        let first = commit_store_update(&repo, StoreChange::Initialized).unwrap();
        assert!(matches!(first, CommitStatus::Committed(_)));
        assert_eq!(repo.status().unwrap(), TreeState::Clean);

        let again = commit_store_update(&repo, StoreChange::Updated(1)).unwrap();
        assert_eq!(again, CommitStatus::NothingToCommit);

        let log = fixture.git(&dir, &["log", "--format=%s"]);
        assert_eq!(log, "chore(db): initialize notes database");
    }
}

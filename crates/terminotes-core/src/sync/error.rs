//! Sync error handling
//!
//! Typed errors for the git sync engine. Every variant that can abort a
//! synchronize call carries enough context to tell the operator what to do
//! next; `recovery_suggestion` spells it out.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the repository handle and the sync engine
#[derive(Error, Debug)]
pub enum SyncError {
    /// The tracked file has uncommitted changes
    #[error(
        "Working tree has uncommitted changes to '{path}'. Commit or stash them before syncing."
    )]
    DirtyWorkingTree { path: PathBuf },

    /// Transport failure while talking to the remote
    #[error("Network error during git {operation}: {details}")]
    Network { operation: String, details: String },

    /// Ordinary push refused because the remote has commits we lack
    #[error("Remote rejected push to '{branch}': {details}")]
    Rejected { branch: String, details: String },

    /// The lease check of a force push failed: the remote moved after our fetch
    #[error(
        "Remote branch '{branch}' changed while resolving the conflict; nothing was overwritten. Run sync again."
    )]
    ConcurrentModification { branch: String },

    /// Nothing to commit for the tracked file
    #[error("No changes to commit")]
    NoChanges,

    /// A decision was required but the session cannot prompt
    #[error("Cannot prompt in a non-interactive session")]
    NonInteractiveAbort,

    /// Publishing was requested but the local branch has no commits
    #[error("Nothing to publish: the notes repository has no commits yet")]
    EmptyHistory,

    /// The working copy is not a git repository
    #[error("'{path}' is not a git repository")]
    NotARepository { path: PathBuf },

    /// The prompt channel returned something that is not a resolution
    #[error("Invalid resolution '{0}'. Choose local-wins, remote-wins or abort.")]
    InvalidResolution(String),

    /// A git command exited unsuccessfully for a local reason
    #[error("git {operation} failed: {details}")]
    Command { operation: String, details: String },

    /// libgit2 error
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Failed to run the git binary
    #[error("Failed to run git: {0}")]
    Io(#[from] io::Error),
}

impl SyncError {
    /// Whether re-running sync (after the suggested action) can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Network { .. }
                | SyncError::Rejected { .. }
                | SyncError::ConcurrentModification { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            SyncError::DirtyWorkingTree { .. } => {
                Some("Commit or stash the pending change in the notes directory, then run `tn sync` again.")
            }
            SyncError::Network { .. } => {
                Some("Check your connection and remote credentials, then run `tn sync` again.")
            }
            SyncError::Rejected { .. } | SyncError::ConcurrentModification { .. } => {
                Some("The remote changed since it was last fetched. Run `tn sync` again to re-check and choose a resolution.")
            }
            SyncError::NonInteractiveAbort => {
                Some("Run `tn sync` from a terminal to choose local-wins, remote-wins or abort.")
            }
            SyncError::EmptyHistory => Some("Create a note first, then run `tn sync`."),
            SyncError::Command { .. } => {
                Some("Check that git is installed and that user.name and user.email are configured.")
            }
            _ => None,
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let network = SyncError::Network {
            operation: "fetch".to_string(),
            details: "could not resolve host".to_string(),
        };
        assert!(network.is_retryable());
        assert!(SyncError::ConcurrentModification {
            branch: "main".to_string()
        }
        .is_retryable());
        assert!(!SyncError::NoChanges.is_retryable());
        assert!(!SyncError::DirtyWorkingTree {
            path: PathBuf::from("terminotes.sqlite3")
        }
        .is_retryable());
    }

    #[test]
    fn test_dirty_tree_display_names_file() {
        let err = SyncError::DirtyWorkingTree {
            path: PathBuf::from("terminotes.sqlite3"),
        };
        let msg = err.to_string();
        assert!(msg.contains("terminotes.sqlite3"));
        assert!(msg.contains("Commit or stash"));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_non_interactive_suggestion_names_choices() {
        let suggestion = SyncError::NonInteractiveAbort.recovery_suggestion().unwrap();
        assert!(suggestion.contains("local-wins"));
        assert!(suggestion.contains("remote-wins"));
        assert!(suggestion.contains("abort"));
    }
}

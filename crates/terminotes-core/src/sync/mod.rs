//! Git-backed synchronization of the notes database
//!
//! The database file is the only tracked artifact of a git working copy.
//! Every store mutation is committed locally (`commit`); `tn sync` runs the
//! coordinator, which fetches, classifies the divergence between local and
//! remote history and applies the resolution policy.
//!
//! ## Flow
//!
//! ```text
//! mutation -> SyncProvider::after_write -> commit_store_update
//! tn sync  -> SyncCoordinator -> detect_divergence -> ResolutionPolicy -> push / reset
//! ```
//!
//! There is no record-level merge: when both sides have commits the operator
//! picks which whole file survives.

mod commit;
mod coordinator;
mod divergence;
mod error;
mod git;
mod outcome;
mod provider;
mod repository;
mod resolution;

#[cfg(test)]
pub(crate) mod test_support;

pub use commit::{commit_store_update, CommitStatus, StoreChange};
pub use coordinator::{SyncCoordinator, SyncSettings};
pub use divergence::{detect_divergence, Divergence};
pub use error::{SyncError, SyncResult};
pub use git::GitRepository;
pub use outcome::{SyncOutcome, SyncReport, EXIT_FAILED};
pub use provider::{GitSyncProvider, NoopSyncProvider, ProviderStatus, SyncProvider};
pub use repository::{AheadBehind, TrackingRefs, TreeState, VersionControl};
pub use resolution::{
    ensure_clean, NoPrompt, PlannedAction, Resolution, ResolutionPolicy, ResolutionPrompt,
};

//! Divergence detection
//!
//! Classification only ever happens against remote-tracking refs that were
//! refreshed by a successful fetch in the same call.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use super::error::SyncResult;
use super::repository::{AheadBehind, VersionControl};

/// How local history relates to the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum Divergence {
    UpToDate,
    LocalAhead { ahead: usize },
    RemoteAhead { behind: usize },
    Diverged { ahead: usize, behind: usize },
    NoUpstream,
}

impl Divergence {
    /// Classify ahead/behind counts
    pub fn classify(counts: AheadBehind) -> Self {
        match (counts.ahead, counts.behind) {
            (0, 0) => Divergence::UpToDate,
            (ahead, 0) => Divergence::LocalAhead { ahead },
            (0, behind) => Divergence::RemoteAhead { behind },
            (ahead, behind) => Divergence::Diverged { ahead, behind },
        }
    }

    /// Whether resolving this outcome needs an operator decision
    pub fn needs_decision(&self) -> bool {
        matches!(
            self,
            Divergence::RemoteAhead { .. } | Divergence::Diverged { .. }
        )
    }

    /// The classification after one more local commit
    pub fn with_pending_commit(self) -> Self {
        match self {
            Divergence::UpToDate => Divergence::LocalAhead { ahead: 1 },
            Divergence::LocalAhead { ahead } => Divergence::LocalAhead { ahead: ahead + 1 },
            Divergence::RemoteAhead { behind } => Divergence::Diverged { ahead: 1, behind },
            Divergence::Diverged { ahead, behind } => Divergence::Diverged {
                ahead: ahead + 1,
                behind,
            },
            Divergence::NoUpstream => Divergence::NoUpstream,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Divergence::UpToDate => "up-to-date",
            Divergence::LocalAhead { .. } => "local-ahead",
            Divergence::RemoteAhead { .. } => "remote-ahead",
            Divergence::Diverged { .. } => "diverged",
            Divergence::NoUpstream => "no-upstream",
        }
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Divergence::UpToDate => write!(f, "up-to-date with the remote"),
            Divergence::LocalAhead { ahead } => {
                write!(f, "local is ahead of the remote by {} commit(s)", ahead)
            }
            Divergence::RemoteAhead { behind } => {
                write!(f, "remote is ahead of local by {} commit(s)", behind)
            }
            Divergence::Diverged { ahead, behind } => write!(
                f,
                "local and remote have diverged ({} local, {} remote commit(s))",
                ahead, behind
            ),
            Divergence::NoUpstream => write!(f, "no upstream branch is configured"),
        }
    }
}

/// Fetch and classify local history against the remote
///
/// A failed fetch propagates and produces no outcome. The tracking refs are
/// read again after the fetch, since pruning removes the remote-tracking ref
/// of an upstream branch deleted on the remote.
pub fn detect_divergence<R: VersionControl + ?Sized>(repo: &R) -> SyncResult<Divergence> {
    if repo.tracking_refs()?.is_none() {
        return Ok(Divergence::NoUpstream);
    }

    repo.fetch_remote()?;

    let refs = match repo.tracking_refs()? {
        Some(refs) => refs,
        None => {
            debug!("Upstream branch disappeared from the remote during fetch");
            return Ok(Divergence::NoUpstream);
        }
    };
    let counts = repo.compare_refs(&refs.local, &refs.remote_tracking)?;
    let divergence = Divergence::classify(counts);
    debug!(
        "{} vs {}: {} ahead, {} behind ({})",
        refs.local,
        refs.remote_tracking,
        counts.ahead,
        counts.behind,
        divergence.label()
    );
    Ok(divergence)
}

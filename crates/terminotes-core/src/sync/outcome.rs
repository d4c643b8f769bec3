//! Terminal results of a sync session

use serde::Serialize;

use super::divergence::Divergence;

/// Exit status for a sync that failed with an error
pub const EXIT_FAILED: u8 = 1;

/// How a synchronize call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncOutcome {
    /// Nothing needed doing (up-to-date or local-only)
    NoOp,
    /// Classification only; nothing was changed
    DryRun,
    /// Local history reached the remote (push, lease push or first publish)
    Pushed,
    /// Local history was replaced by the remote
    ResetToRemote,
    /// The operator chose to abort
    Aborted,
    /// A decision was needed but nobody could be asked
    AbortedNonInteractive,
}

impl SyncOutcome {
    /// Stable process exit status for `tn sync`
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncOutcome::NoOp | SyncOutcome::DryRun => 0,
            SyncOutcome::Pushed => 10,
            SyncOutcome::ResetToRemote => 11,
            SyncOutcome::Aborted => 12,
            SyncOutcome::AbortedNonInteractive => 13,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SyncOutcome::NoOp => "no-op",
            SyncOutcome::DryRun => "dry-run",
            SyncOutcome::Pushed => "pushed",
            SyncOutcome::ResetToRemote => "reset",
            SyncOutcome::Aborted => "aborted",
            SyncOutcome::AbortedNonInteractive => "aborted-non-interactive",
        }
    }

    /// Whether the local database file was replaced
    pub fn replaced_local_copy(&self) -> bool {
        matches!(self, SyncOutcome::ResetToRemote)
    }
}

/// What a synchronize call reports back to its caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    /// `None` when no classification took place (local-only mode)
    pub divergence: Option<Divergence>,
    pub message: String,
}

impl SyncReport {
    pub fn new(
        outcome: SyncOutcome,
        divergence: Option<Divergence>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            outcome,
            divergence,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.outcome.exit_code()
    }
}

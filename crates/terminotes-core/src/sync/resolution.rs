//! Resolution policy
//!
//! Maps a divergence outcome to an action. Outcomes that would lose history
//! on one side are never resolved automatically: the operator is asked
//! through a [`ResolutionPrompt`], and without one the sync aborts.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{info, warn};

use super::divergence::Divergence;
use super::error::{SyncError, SyncResult};
use super::outcome::{SyncOutcome, SyncReport};
use super::repository::{TrackingRefs, VersionControl};

/// Operator decision for a remote-ahead or diverged history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    /// Overwrite the remote with local history (lease-protected)
    LocalWins,
    /// Discard local commits and adopt the remote
    RemoteWins,
    /// Leave everything as it is
    Abort,
}

impl FromStr for Resolution {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "l" | "local" | "local-wins" => Ok(Resolution::LocalWins),
            "r" | "remote" | "remote-wins" => Ok(Resolution::RemoteWins),
            "a" | "abort" => Ok(Resolution::Abort),
            other => Err(SyncError::InvalidResolution(other.to_string())),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::LocalWins => write!(f, "local-wins"),
            Resolution::RemoteWins => write!(f, "remote-wins"),
            Resolution::Abort => write!(f, "abort"),
        }
    }
}

/// Channel used to ask the operator for a [`Resolution`]
///
/// Called only for remote-ahead and diverged outcomes in interactive
/// sessions. An implementation that finds it cannot prompt after all returns
/// `SyncError::NonInteractiveAbort`.
pub trait ResolutionPrompt {
    fn ask_resolution(&mut self, divergence: &Divergence) -> SyncResult<Resolution>;
}

impl<F> ResolutionPrompt for F
where
    F: FnMut(&Divergence) -> SyncResult<Resolution>,
{
    fn ask_resolution(&mut self, divergence: &Divergence) -> SyncResult<Resolution> {
        self(divergence)
    }
}

/// Prompt for sessions without a terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl ResolutionPrompt for NoPrompt {
    fn ask_resolution(&mut self, _divergence: &Divergence) -> SyncResult<Resolution> {
        Err(SyncError::NonInteractiveAbort)
    }
}

/// The action a divergence outcome leads to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlannedAction {
    Nothing,
    Push,
    Publish,
    AskOperator,
    AbortNonInteractive,
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedAction::Nothing => write!(f, "nothing to do"),
            PlannedAction::Push => write!(f, "would push local commits"),
            PlannedAction::Publish => {
                write!(f, "would publish the branch and set its upstream")
            }
            PlannedAction::AskOperator => {
                write!(f, "would ask to choose local-wins, remote-wins or abort")
            }
            PlannedAction::AbortNonInteractive => {
                write!(f, "would abort: a decision is needed but the session is non-interactive")
            }
        }
    }
}

/// Decision table from divergence outcome to repository action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionPolicy {
    interactive: bool,
}

impl ResolutionPolicy {
    pub fn new(interactive: bool) -> Self {
        Self { interactive }
    }

    pub fn plan(&self, divergence: &Divergence) -> PlannedAction {
        match divergence {
            Divergence::UpToDate => PlannedAction::Nothing,
            Divergence::LocalAhead { .. } => PlannedAction::Push,
            Divergence::NoUpstream => PlannedAction::Publish,
            Divergence::RemoteAhead { .. } | Divergence::Diverged { .. } => {
                if self.interactive {
                    PlannedAction::AskOperator
                } else {
                    PlannedAction::AbortNonInteractive
                }
            }
        }
    }

    /// Run the action for `divergence` against `repo`
    pub fn apply<R: VersionControl + ?Sized>(
        &self,
        repo: &R,
        divergence: Divergence,
        prompt: &mut dyn ResolutionPrompt,
    ) -> SyncResult<SyncReport> {
        match self.plan(&divergence) {
            PlannedAction::Nothing => Ok(SyncReport::new(
                SyncOutcome::NoOp,
                Some(divergence),
                "Already up to date with the remote.",
            )),
            PlannedAction::Push => {
                repo.push()?;
                let ahead = match divergence {
                    Divergence::LocalAhead { ahead } => ahead,
                    _ => 0,
                };
                info!("Pushed {} commit(s)", ahead);
                Ok(SyncReport::new(
                    SyncOutcome::Pushed,
                    Some(divergence),
                    format!("Pushed {} commit(s) to the remote.", ahead),
                ))
            }
            PlannedAction::Publish => {
                repo.set_upstream_and_push()?;
                let branch = repo.current_branch()?;
                info!("Published {} and set its upstream", branch);
                Ok(SyncReport::new(
                    SyncOutcome::Pushed,
                    Some(divergence),
                    format!("Published '{}' to the remote and set it as upstream.", branch),
                ))
            }
            PlannedAction::AbortNonInteractive => {
                let refs = tracking_for_guidance(repo)?;
                Ok(non_interactive_abort(divergence, &refs))
            }
            PlannedAction::AskOperator => {
                let refs = tracking_for_guidance(repo)?;
                match prompt.ask_resolution(&divergence) {
                    Ok(resolution) => self.resolve(repo, divergence, resolution, &refs),
                    Err(SyncError::NonInteractiveAbort) => {
                        Ok(non_interactive_abort(divergence, &refs))
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    fn resolve<R: VersionControl + ?Sized>(
        &self,
        repo: &R,
        divergence: Divergence,
        resolution: Resolution,
        refs: &TrackingRefs,
    ) -> SyncResult<SyncReport> {
        info!("Resolving {} with {}", divergence.label(), resolution);
        match resolution {
            Resolution::LocalWins => {
                repo.force_push_with_lease()?;
                Ok(SyncReport::new(
                    SyncOutcome::Pushed,
                    Some(divergence),
                    format!(
                        "Local notes replaced the remote '{}' (lease-protected push).",
                        refs.branch
                    ),
                ))
            }
            Resolution::RemoteWins => {
                // The tree may have changed while the prompt was open
                ensure_clean(repo)?;
                repo.hard_reset_to_remote()?;
                Ok(SyncReport::new(
                    SyncOutcome::ResetToRemote,
                    Some(divergence),
                    format!(
                        "Local notes were reset to '{}'; local-only commits were discarded.",
                        short_remote(refs)
                    ),
                ))
            }
            Resolution::Abort => Ok(SyncReport::new(
                SyncOutcome::Aborted,
                Some(divergence),
                abort_guidance(&divergence, refs, "Sync aborted; nothing was changed."),
            )),
        }
    }
}

/// Fail with `DirtyWorkingTree` unless the tracked file matches HEAD
pub fn ensure_clean<R: VersionControl + ?Sized>(repo: &R) -> SyncResult<()> {
    if repo.status()?.is_clean() {
        return Ok(());
    }
    Err(SyncError::DirtyWorkingTree {
        path: repo.tracked_file().to_path_buf(),
    })
}

fn tracking_for_guidance<R: VersionControl + ?Sized>(repo: &R) -> SyncResult<TrackingRefs> {
    repo.tracking_refs()?.ok_or_else(|| SyncError::Command {
        operation: "sync".to_string(),
        details: "current branch has no upstream".to_string(),
    })
}

fn non_interactive_abort(divergence: Divergence, refs: &TrackingRefs) -> SyncReport {
    warn!("{} needs a decision; aborting non-interactive sync", divergence.label());
    SyncReport::new(
        SyncOutcome::AbortedNonInteractive,
        Some(divergence),
        abort_guidance(
            &divergence,
            refs,
            "Sync aborted: a decision is required but this session is not interactive.",
        ),
    )
}

/// `origin/main` style name of the remote-tracking ref
fn short_remote(refs: &TrackingRefs) -> &str {
    refs.remote_tracking
        .strip_prefix("refs/remotes/")
        .unwrap_or(&refs.remote_tracking)
}

/// Explain why the sync stopped and how to finish it by hand
fn abort_guidance(divergence: &Divergence, refs: &TrackingRefs, headline: &str) -> String {
    let remote = short_remote(refs);
    let (remote_name, remote_branch) = remote.split_once('/').unwrap_or(("origin", remote));
    format!(
        "{headline}\n\
         The {label} state ({divergence}) cannot be resolved automatically without \
         discarding commits on one side.\n\
         Choose one of:\n  \
         local-wins   keep local notes:  git push --force-with-lease {remote_name} {branch}:{remote_branch}\n  \
         remote-wins  take remote notes: git reset --hard {remote}\n  \
         abort        leave both sides untouched",
        headline = headline,
        label = divergence.label(),
        divergence = divergence,
        remote_name = remote_name,
        branch = refs.branch,
        remote_branch = remote_branch,
        remote = remote,
    )
}

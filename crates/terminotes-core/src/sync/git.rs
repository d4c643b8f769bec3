//! Git-backed repository handle
//!
//! Local inspection and mutation (status, commit, ref comparison, hard
//! reset) go through libgit2. Anything that talks to the remote shells out to
//! the `git` binary so the user's credential helpers and SSH setup apply
//! unchanged.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use git2::build::CheckoutBuilder;
use git2::{BranchType, Commit, ErrorCode, Repository, ResetType, Signature, StatusOptions};
use tracing::{debug, info};

use super::coordinator::SyncSettings;
use super::error::{SyncError, SyncResult};
use super::repository::{AheadBehind, TrackingRefs, TreeState, VersionControl};

/// The only remote the handle manages
const REMOTE_NAME: &str = "origin";

/// Regular, non-executable file mode for tree entries
const BLOB_MODE: i32 = 0o100644;

/// Repository handle over a git working copy
#[derive(Debug, Clone)]
pub struct GitRepository {
    work_dir: PathBuf,
    remote_url: Option<String>,
    tracked_file: PathBuf,
}

impl GitRepository {
    /// Open the working copy, creating it first if needed
    ///
    /// - An existing repository is opened; `origin` is added or repointed to
    ///   the configured remote URL.
    /// - Otherwise, with a remote configured and an empty directory, the
    ///   remote is cloned.
    /// - Otherwise a fresh repository is initialised (with `origin` when a
    ///   remote URL is configured).
    pub fn ensure_local_clone(settings: &SyncSettings) -> SyncResult<Self> {
        let handle = Self::from_settings(settings);

        if handle.work_dir.join(".git").exists() {
            let repo = handle.repo()?;
            if let Some(url) = handle.remote_url.as_deref() {
                handle.ensure_remote(&repo, url)?;
            }
            return Ok(handle);
        }

        fs::create_dir_all(&handle.work_dir)?;

        if let Some(url) = handle.remote_url.as_deref() {
            if is_empty_dir(&handle.work_dir)? {
                info!("Cloning notes repository from {}", url);
                handle.clone_from(url)?;
                return Ok(handle);
            }
        }

        info!("Initialising notes repository in {:?}", handle.work_dir);
        let repo = Repository::init(&handle.work_dir)?;
        if let Some(url) = handle.remote_url.as_deref() {
            repo.remote(REMOTE_NAME, url)?;
        }
        Ok(handle)
    }

    fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            work_dir: settings.work_dir.clone(),
            remote_url: settings.remote_url.clone(),
            tracked_file: settings.tracked_file.clone(),
        }
    }

    fn repo(&self) -> SyncResult<Repository> {
        Repository::open(&self.work_dir).map_err(|e| match e.code() {
            ErrorCode::NotFound => SyncError::NotARepository {
                path: self.work_dir.clone(),
            },
            _ => SyncError::Git(e),
        })
    }

    fn ensure_remote(&self, repo: &Repository, url: &str) -> SyncResult<()> {
        match repo.find_remote(REMOTE_NAME) {
            Ok(remote) if remote.url() == Some(url) => Ok(()),
            Ok(_) => {
                info!("Repointing {} to {}", REMOTE_NAME, url);
                repo.remote_set_url(REMOTE_NAME, url)?;
                Ok(())
            }
            Err(e) if e.code() == ErrorCode::NotFound => {
                repo.remote(REMOTE_NAME, url)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn clone_from(&self, url: &str) -> SyncResult<()> {
        let output = Command::new("git")
            .arg("clone")
            .arg(url)
            .arg(&self.work_dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .output()?;
        if output.status.success() {
            return Ok(());
        }
        Err(SyncError::Network {
            operation: "clone".to_string(),
            details: stderr_of(&output),
        })
    }

    /// Tracked file name as it appears in the root tree
    fn tracked_name(&self) -> String {
        self.tracked_file.to_string_lossy().replace('\\', "/")
    }

    /// Tracking refs, or an error naming the operation that needed them
    fn require_tracking(&self, operation: &str) -> SyncResult<TrackingRefs> {
        self.tracking_refs()?.ok_or_else(|| SyncError::Command {
            operation: operation.to_string(),
            details: "current branch has no upstream".to_string(),
        })
    }

    fn require_remote(&self, operation: &str) -> SyncResult<()> {
        if self.remote_url.is_none() {
            return Err(SyncError::Command {
                operation: operation.to_string(),
                details: "no remote configured (local-only mode)".to_string(),
            });
        }
        Ok(())
    }

    /// Run a git subcommand inside the working copy
    fn git(&self, args: &[&str]) -> SyncResult<Output> {
        debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.work_dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .output()?;
        Ok(output)
    }

    /// Run a network-facing git subcommand, classifying failures
    fn run_remote(&self, operation: &str, branch: &str, args: &[&str]) -> SyncResult<()> {
        self.require_remote(operation)?;
        let output = self.git(args)?;
        if output.status.success() {
            return Ok(());
        }
        Err(classify_failure(operation, branch, &stderr_of(&output)))
    }
}

impl VersionControl for GitRepository {
    fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn remote_url(&self) -> Option<&str> {
        self.remote_url.as_deref()
    }

    fn tracked_file(&self) -> &Path {
        &self.tracked_file
    }

    fn status(&self) -> SyncResult<TreeState> {
        let repo = self.repo()?;
        let mut opts = StatusOptions::new();
        opts.pathspec(self.tracked_name())
            .disable_pathspec_match(true)
            .include_untracked(true);

        let statuses = repo.statuses(Some(&mut opts))?;
        if statuses.is_empty() {
            Ok(TreeState::Clean)
        } else {
            Ok(TreeState::Dirty)
        }
    }

    fn commit(&self, message: &str) -> SyncResult<String> {
        let repo = self.repo()?;
        let name = self.tracked_name();
        let path = self.work_dir.join(&self.tracked_file);

        let parent = head_commit(&repo)?;
        let parent_tree = parent.as_ref().map(|c| c.tree()).transpose()?;

        // Start from HEAD's tree so nothing but the tracked file changes
        let mut builder = repo.treebuilder(parent_tree.as_ref())?;
        let mut index = repo.index()?;
        if path.exists() {
            let blob = repo.blob_path(&path)?;
            builder.insert(name.as_str(), blob, BLOB_MODE)?;
            index.add_path(&self.tracked_file)?;
        } else {
            if builder.get(name.as_str())?.is_some() {
                builder.remove(name.as_str())?;
            }
            if index.get_path(&self.tracked_file, 0).is_some() {
                index.remove_path(&self.tracked_file)?;
            }
        }
        index.write()?;

        let tree_oid = builder.write()?;
        let unchanged = match &parent_tree {
            Some(tree) => tree_oid == tree.id(),
            None => builder.len() == 0,
        };
        if unchanged {
            return Err(SyncError::NoChanges);
        }

        let tree = repo.find_tree(tree_oid)?;
        let author = signature(&repo, "AUTHOR")?;
        let committer = signature(&repo, "COMMITTER")?;
        let parents: Vec<&Commit> = parent.iter().collect();
        let oid = repo.commit(
            Some("HEAD"),
            &author,
            &committer,
            message,
            &tree,
            &parents,
        )?;

        debug!("Committed {} as {}", name, oid);
        Ok(oid.to_string())
    }

    fn fetch_remote(&self) -> SyncResult<()> {
        self.require_remote("fetch")?;
        let output = self.git(&["fetch", "--prune", REMOTE_NAME])?;
        if output.status.success() {
            return Ok(());
        }
        Err(SyncError::Network {
            operation: "fetch".to_string(),
            details: stderr_of(&output),
        })
    }

    fn compare_refs(&self, local: &str, remote_tracking: &str) -> SyncResult<AheadBehind> {
        let repo = self.repo()?;
        let local_oid = repo.refname_to_id(local)?;
        let remote_oid = repo.refname_to_id(remote_tracking)?;
        let (ahead, behind) = repo.graph_ahead_behind(local_oid, remote_oid)?;
        Ok(AheadBehind { ahead, behind })
    }

    fn tracking_refs(&self) -> SyncResult<Option<TrackingRefs>> {
        let repo = self.repo()?;
        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if is_unborn(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !head.is_branch() {
            return Ok(None);
        }

        let (Some(branch_name), Some(local)) = (head.shorthand(), head.name()) else {
            return Ok(None);
        };
        let branch = repo.find_branch(branch_name, BranchType::Local)?;

        // A configured upstream whose ref is gone counts as no upstream
        let upstream = match branch.upstream() {
            Ok(upstream) => upstream,
            Err(_) => return Ok(None),
        };
        let Some(remote_tracking) = upstream.get().name() else {
            return Ok(None);
        };

        Ok(Some(TrackingRefs {
            branch: branch_name.to_string(),
            local: local.to_string(),
            remote_tracking: remote_tracking.to_string(),
        }))
    }

    fn current_branch(&self) -> SyncResult<String> {
        let repo = self.repo()?;
        let head_ref = repo.find_reference("HEAD")?;
        let target = match head_ref.symbolic_target() {
            Some(target) => target.to_string(),
            None => {
                return Err(SyncError::Command {
                    operation: "branch".to_string(),
                    details: "HEAD is detached".to_string(),
                })
            }
        };
        Ok(target
            .strip_prefix("refs/heads/")
            .unwrap_or(&target)
            .to_string())
    }

    fn push(&self) -> SyncResult<()> {
        let refs = self.require_tracking("push")?;
        let refspec = format!("{}:refs/heads/{}", refs.local, remote_branch(&refs));
        self.run_remote("push", &refs.branch, &["push", REMOTE_NAME, &refspec])
    }

    fn force_push_with_lease(&self) -> SyncResult<()> {
        let refs = self.require_tracking("push")?;
        let repo = self.repo()?;

        // The lease is the remote tip recorded by the last fetch
        let expected = repo.refname_to_id(&refs.remote_tracking)?;
        let remote_ref = format!("refs/heads/{}", remote_branch(&refs));
        let lease = format!("--force-with-lease={}:{}", remote_ref, expected);
        let refspec = format!("{}:{}", refs.local, remote_ref);

        self.run_remote(
            "push --force-with-lease",
            &refs.branch,
            &["push", &lease, REMOTE_NAME, &refspec],
        )
    }

    fn hard_reset_to_remote(&self) -> SyncResult<()> {
        let refs = self.require_tracking("reset")?;
        let repo = self.repo()?;
        let target = repo.refname_to_id(&refs.remote_tracking)?;
        let object = repo.find_object(target, None)?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        repo.reset(&object, ResetType::Hard, Some(&mut checkout))?;

        info!("Reset {} to {} ({})", refs.branch, refs.remote_tracking, target);
        Ok(())
    }

    fn set_upstream_and_push(&self) -> SyncResult<()> {
        let repo = self.repo()?;
        if head_commit(&repo)?.is_none() {
            return Err(SyncError::EmptyHistory);
        }
        let branch = self.current_branch()?;
        self.run_remote(
            "push --set-upstream",
            &branch,
            &["push", "--set-upstream", REMOTE_NAME, &branch],
        )
    }
}

/// Classify the stderr of a failed push or fetch
fn classify_failure(operation: &str, branch: &str, stderr: &str) -> SyncError {
    let lowered = stderr.to_lowercase();

    if lowered.contains("stale info") {
        return SyncError::ConcurrentModification {
            branch: branch.to_string(),
        };
    }

    if lowered.contains("[rejected]")
        || lowered.contains("non-fast-forward")
        || lowered.contains("fetch first")
    {
        return SyncError::Rejected {
            branch: branch.to_string(),
            details: stderr.to_string(),
        };
    }

    SyncError::Network {
        operation: operation.to_string(),
        details: stderr.to_string(),
    }
}

/// Identity from `GIT_<ROLE>_NAME` and `GIT_<ROLE>_EMAIL` when both are set
fn env_identity<F>(role: &str, lookup: F) -> Option<(String, String)>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: String| lookup(&key).filter(|value| !value.trim().is_empty());
    let name = non_empty(format!("GIT_{}_NAME", role))?;
    let email = non_empty(format!("GIT_{}_EMAIL", role))?;
    Some((name, email))
}

/// Commit signature: the environment first, then git config
fn signature(repo: &Repository, role: &str) -> SyncResult<Signature<'static>> {
    signature_with(repo, role, |key| std::env::var(key).ok())
}

fn signature_with<F>(repo: &Repository, role: &str, lookup: F) -> SyncResult<Signature<'static>>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some((name, email)) = env_identity(role, lookup) {
        return Ok(Signature::now(&name, &email)?);
    }
    repo.signature().map_err(|e| SyncError::Command {
        operation: "commit".to_string(),
        details: format!(
            "no git identity configured ({}); set user.name and user.email",
            e.message()
        ),
    })
}

fn head_commit(repo: &Repository) -> SyncResult<Option<Commit<'_>>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?)),
        Err(e) if is_unborn(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn is_unborn(error: &git2::Error) -> bool {
    matches!(error.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound)
}

/// Branch name on the remote side of the upstream
fn remote_branch(refs: &TrackingRefs) -> &str {
    refs.remote_tracking
        .strip_prefix(&format!("refs/remotes/{}/", REMOTE_NAME))
        .unwrap_or(&refs.branch)
}

fn is_empty_dir(path: &Path) -> SyncResult<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

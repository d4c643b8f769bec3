//! Fixtures shared by the sync tests
//!
//! `GitFixture` builds a bare "remote" plus any number of working copies
//! inside one temp directory. `ScriptedRepository` is an in-memory
//! `VersionControl` double that records every call.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use super::coordinator::SyncSettings;
use super::error::{SyncError, SyncResult};
use super::git::GitRepository;
use super::repository::{AheadBehind, TrackingRefs, TreeState, VersionControl};

pub const TRACKED: &str = "terminotes.sqlite3";

pub fn write_db(dir: &Path, bytes: &[u8]) {
    fs::write(dir.join(TRACKED), bytes).unwrap();
}

pub struct GitFixture {
    temp: TempDir,
    remote: PathBuf,
}

impl GitFixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let remote = temp.path().join("remote.git");
        run_git(temp.path(), &["init", "--bare", "remote.git"]);
        run_git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        Self { temp, remote }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    pub fn remote_url(&self) -> String {
        self.remote.display().to_string()
    }

    /// The bare repository standing in for the remote
    pub fn remote_path(&self) -> PathBuf {
        self.remote.clone()
    }

    pub fn settings(&self, dir: &Path, with_remote: bool) -> SyncSettings {
        SyncSettings {
            work_dir: dir.to_path_buf(),
            remote_url: with_remote.then(|| self.remote_url()),
            tracked_file: PathBuf::from(TRACKED),
            interactive: true,
        }
    }

    pub fn configure_identity(&self, dir: &Path) {
        run_git(dir, &["config", "user.name", "Terminotes Test"]);
        run_git(dir, &["config", "user.email", "test@terminotes.invalid"]);
    }

    /// Working copy of the (possibly empty) remote, on an unborn or checked-out `main`
    pub fn local_clone(&self, name: &str) -> (PathBuf, GitRepository) {
        let dir = self.path(name);
        let handle = GitRepository::ensure_local_clone(&self.settings(&dir, true)).unwrap();
        if self.remote_head_opt().is_none() {
            run_git(&dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        }
        self.configure_identity(&dir);
        (dir, handle)
    }

    /// Working copy that published one commit of `bytes` to the remote
    pub fn seeded_clone(&self, name: &str, bytes: &[u8]) -> (PathBuf, GitRepository) {
        let (dir, handle) = self.local_clone(name);
        write_db(&dir, bytes);
        handle.commit("chore(db): initialize notes database").unwrap();
        handle.set_upstream_and_push().unwrap();
        (dir, handle)
    }

    /// Working copy cloned from an already seeded remote
    pub fn clone_into(&self, name: &str) -> (PathBuf, GitRepository) {
        let dir = self.path(name);
        let handle = GitRepository::ensure_local_clone(&self.settings(&dir, true)).unwrap();
        self.configure_identity(&dir);
        (dir, handle)
    }

    pub fn git(&self, dir: &Path, args: &[&str]) -> String {
        run_git(dir, args)
    }

    pub fn remote_head(&self) -> String {
        self.remote_head_opt().expect("remote has no main branch")
    }

    fn remote_head_opt(&self) -> Option<String> {
        let output = Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", "refs/heads/main"])
            .current_dir(&self.remote)
            .output()
            .unwrap();
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn remote_commit_count(&self) -> usize {
        run_git(&self.remote, &["rev-list", "--count", "refs/heads/main"])
            .parse()
            .unwrap()
    }

    pub fn remote_file(&self) -> Vec<u8> {
        let output = Command::new("git")
            .args(["show", &format!("refs/heads/main:{}", TRACKED)])
            .current_dir(&self.remote)
            .output()
            .unwrap();
        assert!(output.status.success());
        output.stdout
    }
}

fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("LC_ALL", "C")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Call recorded by `ScriptedRepository`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Status,
    Commit(String),
    Fetch,
    CompareRefs,
    Push,
    ForcePushWithLease,
    HardReset,
    SetUpstreamAndPush,
}

impl Call {
    /// Calls that change local history or the remote
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Call::Commit(_)
                | Call::Push
                | Call::ForcePushWithLease
                | Call::HardReset
                | Call::SetUpstreamAndPush
        )
    }
}

/// In-memory repository whose answers are scripted up front
pub struct ScriptedRepository {
    work_dir: PathBuf,
    tracked_file: PathBuf,
    pub remote_url: Option<String>,
    pub tree: RefCell<VecDeque<TreeState>>,
    pub upstream: Cell<bool>,
    /// The next fetch prunes the remote-tracking ref
    pub upstream_deleted_remotely: bool,
    pub counts: AheadBehind,
    pub fetch_error: RefCell<Option<SyncError>>,
    pub lease_error: RefCell<Option<SyncError>>,
    pub commit_error: RefCell<Option<SyncError>>,
    pub calls: RefCell<Vec<Call>>,
}

impl ScriptedRepository {
    pub fn new(remote: bool, upstream: bool, ahead: usize, behind: usize) -> Self {
        Self {
            work_dir: PathBuf::from("/notes"),
            tracked_file: PathBuf::from(TRACKED),
            remote_url: remote.then(|| "git@example.com:me/notes.git".to_string()),
            tree: RefCell::new(VecDeque::new()),
            upstream: Cell::new(upstream),
            upstream_deleted_remotely: false,
            counts: AheadBehind { ahead, behind },
            fetch_error: RefCell::new(None),
            lease_error: RefCell::new(None),
            commit_error: RefCell::new(None),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Queue tree states returned by successive `status` calls
    pub fn with_tree(self, states: &[TreeState]) -> Self {
        self.tree.borrow_mut().extend(states.iter().copied());
        self
    }

    pub fn with_upstream_deleted_remotely(mut self) -> Self {
        self.upstream_deleted_remotely = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl VersionControl for ScriptedRepository {
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
        self.record(Call::Status);
        Ok(self
            .tree
            .borrow_mut()
            .pop_front()
            .unwrap_or(TreeState::Clean))
    }

    fn commit(&self, message: &str) -> SyncResult<String> {
        self.record(Call::Commit(message.to_string()));
        match self.commit_error.borrow_mut().take() {
            Some(err) => Err(err),
            None => Ok("0123456789abcdef".to_string()),
        }
    }

    fn fetch_remote(&self) -> SyncResult<()> {
        self.record(Call::Fetch);
        if let Some(err) = self.fetch_error.borrow_mut().take() {
            return Err(err);
        }
        if self.upstream_deleted_remotely {
            self.upstream.set(false);
        }
        Ok(())
    }

    fn compare_refs(&self, _local: &str, _remote_tracking: &str) -> SyncResult<AheadBehind> {
        self.record(Call::CompareRefs);
        Ok(self.counts)
    }

    fn tracking_refs(&self) -> SyncResult<Option<TrackingRefs>> {
        Ok(self.upstream.get().then(|| TrackingRefs {
            branch: "main".to_string(),
            local: "refs/heads/main".to_string(),
            remote_tracking: "refs/remotes/origin/main".to_string(),
        }))
    }

    fn current_branch(&self) -> SyncResult<String> {
        Ok("main".to_string())
    }

    fn push(&self) -> SyncResult<()> {
        self.record(Call::Push);
        Ok(())
    }

    fn force_push_with_lease(&self) -> SyncResult<()> {
        self.record(Call::ForcePushWithLease);
        match self.lease_error.borrow_mut().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn hard_reset_to_remote(&self) -> SyncResult<()> {
        self.record(Call::HardReset);
        Ok(())
    }

    fn set_upstream_and_push(&self) -> SyncResult<()> {
        self.record(Call::SetUpstreamAndPush);
        Ok(())
    }
}

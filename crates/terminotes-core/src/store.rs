//! Unified storage interface
//!
//! The `Store` owns the notes database and the sync provider:
//! - every mutation is persisted first, then handed to the provider, which
//!   records it as a local commit
//! - `sync` runs the provider and reopens the database when the remote copy
//!   replaced the local file
//!
//! ## Usage
//!
//! ```ignore
//! let config = Config::load()?;
//! let provider = sync_provider_for(&config, false, Box::new(NoPrompt));
//! let mut store = Store::open(&config, provider)?;
//!
//! let note = store.create_note(NoteDraft::new("Title", "Body"))?;
//! let notes = store.list_notes(10, &[])?;
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::{Config, SyncBackend};
use crate::frontmatter::{parse_document, render_document, FrontMatter};
use crate::models::{format_user_datetime, Note, NoteDraft, NoteKind};
use crate::storage::NoteDatabase;
use crate::sync::{
    CommitStatus, GitSyncProvider, NoopSyncProvider, ProviderStatus, ResolutionPrompt,
    StoreChange, SyncProvider, SyncReport,
};
use crate::tags::{extract_hashtags, normalize_against_allowed};

/// Build the provider selected by `sync_backend`
pub fn sync_provider_for(
    config: &Config,
    interactive: bool,
    prompt: Box<dyn ResolutionPrompt>,
) -> Box<dyn SyncProvider> {
    match config.sync_backend {
        SyncBackend::Git => {
            let settings = config.sync_settings(interactive);
            Box::new(GitSyncProvider::new(settings, prompt))
        }
        SyncBackend::None => Box::new(NoopSyncProvider),
    }
}

/// A saved note plus what was dropped or ignored on the way in
#[derive(Debug, Clone)]
pub struct SavedNote {
    pub note: Note,
    /// Tags rejected by the allow-list
    pub unknown_tags: Vec<String>,
    /// Metadata problems that were ignored
    pub warnings: Vec<String>,
}

/// Notes database plus the sync provider recording its changes
pub struct Store {
    db: NoteDatabase,
    db_path: PathBuf,
    allowed_tags: Vec<String>,
    provider: Box<dyn SyncProvider>,
}

impl Store {
    /// Open the store
    ///
    /// The provider bootstraps first (a clone needs an empty directory), then
    /// the database is opened. A freshly created database is committed right
    /// away so the working tree starts clean.
    pub fn open(config: &Config, mut provider: Box<dyn SyncProvider>) -> Result<Self> {
        provider
            .bootstrap()
            .context("Failed to prepare the notes repository")?;

        let db_path = config.database_path();
        let fresh = !db_path.exists();
        let db = NoteDatabase::open(&db_path)
            .with_context(|| format!("Failed to open notes database at {:?}", db_path))?;

        let mut store = Self {
            db,
            db_path,
            allowed_tags: config.allowed_tags.clone(),
            provider,
        };

        if fresh {
            info!("Created notes database at {:?}", store.db_path);
            if let Err(e) = store.provider.after_write(StoreChange::Initialized) {
                warn!("Could not commit the new notes database: {}", e);
            }
        }

        Ok(store)
    }

    /// Path of the database file
    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    /// Accepted and unknown tags according to the allow-list
    pub fn normalize_tags<S: AsRef<str>>(&self, tags: &[S]) -> (Vec<String>, Vec<String>) {
        normalize_against_allowed(&self.allowed_tags, tags)
    }

    // ==================== Mutations ====================

    pub fn create_note(&mut self, draft: NoteDraft) -> Result<Note> {
        self.before_write()?;
        let note = self
            .db
            .create_note(&draft)
            .context("Failed to create note")?;
        self.record(StoreChange::Created(note.id))?;
        Ok(note)
    }

    pub fn update_note(&mut self, id: i64, draft: NoteDraft) -> Result<Note> {
        self.before_write()?;
        let note = self
            .db
            .update_note(id, &draft)
            .with_context(|| format!("Failed to update note {}", id))?;
        self.record(StoreChange::Updated(id))?;
        Ok(note)
    }

    pub fn delete_note(&mut self, id: i64) -> Result<()> {
        self.before_write()?;
        self.db
            .delete_note(id)
            .with_context(|| format!("Failed to delete note {}", id))?;
        self.record(StoreChange::Deleted(id))?;
        Ok(())
    }

    /// Remove unused tags; returns how many were removed
    pub fn prune_tags(&mut self) -> Result<usize> {
        self.before_write()?;
        let removed = self.db.prune_unused_tags().context("Failed to prune tags")?;
        if removed > 0 {
            self.record(StoreChange::PrunedTags)?;
        }
        Ok(removed)
    }

    /// Create a log entry from command-line text
    ///
    /// Hashtags in the text are added to `tags` before the allow-list applies.
    pub fn create_log_entry(
        &mut self,
        text: &str,
        tags: &[String],
        created_at: Option<DateTime<Utc>>,
    ) -> Result<SavedNote> {
        let mut incoming = tags.to_vec();
        incoming.extend(extract_hashtags(text));
        let (tags, unknown_tags) = self.normalize_tags(&incoming);

        let draft = NoteDraft {
            tags,
            created_at,
            kind: NoteKind::Log,
            ..NoteDraft::new("", text)
        };
        let note = self.create_note(draft)?;
        Ok(SavedNote {
            note,
            unknown_tags,
            warnings: Vec::new(),
        })
    }

    /// Editor template for a new note
    pub fn new_note_template(&self) -> Result<String> {
        render_document(&FrontMatter::template(&Utc::now()), "")
            .context("Failed to render note template")
    }

    /// Editor document for an existing note (`None` picks the last updated)
    pub fn edit_document(&self, id: Option<i64>) -> Result<(Note, String)> {
        let note = match id {
            Some(id) => self.fetch_note(id)?,
            None => self.fetch_last_updated()?,
        };
        let document = render_document(&FrontMatter::from_note(&note), &note.body)
            .context("Failed to render note for editing")?;
        Ok((note, document))
    }

    /// Create a note from an edited template
    pub fn create_from_document(&mut self, raw: &str) -> Result<SavedNote> {
        let parsed = parse_document(raw);
        let mut warnings = Vec::new();
        let (tags, unknown_tags) = self.normalize_tags(&parsed.tags);

        let draft = NoteDraft {
            title: parsed.title.clone().unwrap_or_default(),
            body: parsed.body.clone(),
            description: parsed.description.clone(),
            tags,
            created_at: parsed.timestamp("date", &mut warnings),
            updated_at: parsed.timestamp("last_edited", &mut warnings),
            published: parsed.published(false),
            kind: parsed.kind(NoteKind::Note, &mut warnings),
        };
        let note = self.create_note(draft)?;
        Ok(SavedNote {
            note,
            unknown_tags,
            warnings,
        })
    }

    /// Replace a note with the content of an edited document
    ///
    /// A payload without front matter only replaces the body. Timestamps left
    /// as rendered keep their stored value, except `last_edited` which then
    /// becomes now.
    pub fn update_from_document(&mut self, existing: &Note, raw: &str) -> Result<SavedNote> {
        let parsed = parse_document(raw);
        let mut warnings = Vec::new();
        let has_meta = !parsed.metadata.is_empty();

        let (tags, unknown_tags) = if has_meta {
            self.normalize_tags(&parsed.tags)
        } else {
            (existing.tags.clone(), Vec::new())
        };
        let title = match (&parsed.title, has_meta) {
            (Some(title), _) => title.clone(),
            (None, true) => String::new(),
            (None, false) => existing.title.clone(),
        };
        let description = if has_meta {
            parsed.description.clone()
        } else {
            existing.description.clone()
        };

        let created_at = parsed
            .timestamp("date", &mut warnings)
            .filter(|dt| !same_minute(dt, &existing.created_at));
        let updated_at = parsed
            .timestamp("last_edited", &mut warnings)
            .filter(|dt| !same_minute(dt, &existing.updated_at));

        let draft = NoteDraft {
            title,
            body: parsed.body.clone(),
            description,
            tags,
            created_at,
            updated_at,
            published: parsed.published(existing.published),
            kind: parsed.kind(existing.kind, &mut warnings),
        };
        let note = self.update_note(existing.id, draft)?;
        Ok(SavedNote {
            note,
            unknown_tags,
            warnings,
        })
    }

    // ==================== Queries ====================

    pub fn fetch_note(&self, id: i64) -> Result<Note> {
        Ok(self.db.fetch_note(id)?)
    }

    pub fn fetch_last_updated(&self) -> Result<Note> {
        Ok(self.db.fetch_last_updated()?)
    }

    /// Most recently updated notes carrying every tag in `tags`
    pub fn list_notes(&self, limit: usize, tags: &[String]) -> Result<Vec<Note>> {
        Ok(self.db.list_notes(limit, tags)?)
    }

    pub fn search_notes(&self, pattern: &str, tags: &[String]) -> Result<Vec<Note>> {
        Ok(self.db.search_notes(pattern, tags)?)
    }

    pub fn count_notes(&self) -> Result<i64> {
        Ok(self.db.count_notes()?)
    }

    pub fn tags_with_counts(&self) -> Result<Vec<(String, i64)>> {
        Ok(self.db.tags_with_counts()?)
    }

    // ==================== Sync ====================

    /// Synchronize the notes repository with its remote
    ///
    /// Sync errors are returned as `SyncError` inside the `anyhow::Error` and
    /// can be downcast by the caller.
    pub fn sync(&mut self, dry_run: bool) -> Result<SyncReport> {
        let report = self.provider.sync(dry_run)?;
        if report.outcome.replaced_local_copy() {
            self.reopen()?;
        }
        Ok(report)
    }

    pub fn sync_status(&mut self) -> Result<ProviderStatus> {
        Ok(self.provider.status()?)
    }

    // ==================== Private helpers ====================

    fn before_write(&mut self) -> Result<()> {
        self.provider
            .before_write()
            .context("Failed to prepare the notes repository for writing")
    }

    /// Hand a persisted change to the provider
    ///
    /// The change is not rolled back when the commit fails.
    fn record(&mut self, change: StoreChange) -> Result<CommitStatus> {
        self.provider.after_write(change).with_context(|| {
            format!(
                "{} was saved, but committing it to the notes repository failed",
                change.subject()
            )
        })
    }

    /// Reopen the database after the file was replaced on disk
    fn reopen(&mut self) -> Result<()> {
        self.db = NoteDatabase::open(&self.db_path)
            .with_context(|| format!("Failed to reopen notes database at {:?}", self.db_path))?;
        info!("Reloaded notes database after reset");
        Ok(())
    }
}

/// Equal at the precision the editor shows
fn same_minute(a: &DateTime<Utc>, b: &DateTime<Utc>) -> bool {
    format_user_datetime(a) == format_user_datetime(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use crate::sync::test_support::GitFixture;
    use crate::sync::{
        Divergence, NoPrompt, Resolution, SyncError, SyncOutcome, SyncResult, TreeState,
    };
    use tempfile::TempDir;

    fn local_config(dir: &Path, backend: SyncBackend) -> Config {
        Config {
            terminotes_dir: dir.to_path_buf(),
            git_remote_url: None,
            sync_backend: backend,
            ..Config::default()
        }
    }

    fn plain_store(temp: &TempDir) -> Store {
        let config = local_config(temp.path(), SyncBackend::None);
        Store::open(&config, Box::new(NoopSyncProvider)).unwrap()
    }

    /// Store over a git working copy that already has an identity
    fn git_store(fixture: &GitFixture, name: &str, remote: bool) -> (PathBuf, Store) {
        let dir = fixture.path(name);
        std::fs::create_dir_all(&dir).unwrap();
        fixture.git(&dir, &["init", "-q"]);
        fixture.git(&dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        fixture.configure_identity(&dir);

        let mut config = local_config(&dir, SyncBackend::Git);
        if remote {
            config.git_remote_url = Some(fixture.remote_url());
        }
        let provider = sync_provider_for(&config, false, Box::new(NoPrompt));
        (dir.clone(), Store::open(&config, provider).unwrap())
    }

    #[test]
    fn test_crud_without_version_control() {
        let temp = TempDir::new().unwrap();
        let mut store = plain_store(&temp);

        let note = store.create_note(NoteDraft::new("Title", "Body")).unwrap();
        assert_eq!(store.count_notes().unwrap(), 1);

        let updated = store
            .update_note(note.id, NoteDraft::new("Renamed", "Body"))
            .unwrap();
        assert_eq!(updated.title, "Renamed");

        store.delete_note(note.id).unwrap();
        let err = store.fetch_note(note.id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::NoteNotFound(_))
        ));
        assert!(store.database_path().exists());
    }

    #[test]
    fn test_log_entry_collects_hashtags_against_allow_list() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            allowed_tags: vec!["work".to_string(), "rust".to_string()],
            ..local_config(temp.path(), SyncBackend::None)
        };
        let mut store = Store::open(&config, Box::new(NoopSyncProvider)).unwrap();

        let saved = store
            .create_log_entry("Fixed #Rust build #misc", &["work".to_string()], None)
            .unwrap();

        assert_eq!(saved.note.kind, NoteKind::Log);
        assert_eq!(saved.note.tags, vec!["work", "rust"]);
        assert_eq!(saved.unknown_tags, vec!["misc"]);
        assert_eq!(saved.note.title, "");
    }

    #[test]
    fn test_document_round_trip_through_editor_payloads() {
        let temp = TempDir::new().unwrap();
        let mut store = plain_store(&temp);

        let template = store.new_note_template().unwrap();
        let edited = template
            .replacen("title: ''", "title: Plan", 1)
            .replacen("tags: []", "tags: [a, b]", 1)
            + "Body text\n";
        let saved = store.create_from_document(&edited).unwrap();
        assert_eq!(saved.note.title, "Plan");
        assert_eq!(saved.note.body, "Body text");
        assert_eq!(saved.note.tags, vec!["a", "b"]);
        assert!(saved.warnings.is_empty());

        let (note, document) = store.edit_document(None).unwrap();
        assert_eq!(note.id, saved.note.id);
        let changed = document.replace("Body text", "New body");
        let updated = store.update_from_document(&note, &changed).unwrap();
        assert_eq!(updated.note.body, "New body");
        assert_eq!(updated.note.tags, vec!["a", "b"]);
        assert_eq!(updated.note.created_at, note.created_at);
        assert!(updated.note.updated_at >= note.updated_at);
    }

    #[test]
    fn test_plain_text_edit_keeps_metadata() {
        let temp = TempDir::new().unwrap();
        let mut store = plain_store(&temp);
        let note = store
            .create_note(NoteDraft {
                tags: vec!["keep".to_string()],
                ..NoteDraft::new("Title", "old")
            })
            .unwrap();

        let saved = store
            .update_from_document(&note, "just new text\n")
            .unwrap();
        assert_eq!(saved.note.title, "Title");
        assert_eq!(saved.note.body, "just new text");
        assert_eq!(saved.note.tags, vec!["keep"]);
    }

    #[test]
    fn test_edited_date_replaces_created_at() {
        let temp = TempDir::new().unwrap();
        let mut store = plain_store(&temp);
        let note = store.create_note(NoteDraft::new("Title", "body")).unwrap();
        let (_, document) = store.edit_document(Some(note.id)).unwrap();

        let shown = format_user_datetime(&note.created_at);
        let changed = document.replacen(&shown, "2020-02-02 10:00 UTC", 1);
        let saved = store.update_from_document(&note, &changed).unwrap();
        assert_eq!(
            format_user_datetime(&saved.note.created_at),
            "2020-02-02 10:00 UTC"
        );
    }

    #[test]
    fn test_every_mutation_leaves_tree_clean() {
        let fixture = GitFixture::new();
        let (dir, mut store) = git_store(&fixture, "notes", false);

        let note = store.create_note(NoteDraft::new("One", "")).unwrap();
        store
            .update_note(note.id, NoteDraft::new("Two", ""))
            .unwrap();
        store.delete_note(note.id).unwrap();

        assert_eq!(store.sync_status().unwrap().tree, Some(TreeState::Clean));
        let log = fixture.git(&dir, &["log", "--format=%s"]);
        assert_eq!(
            log,
            format!(
                "chore(db): delete note {id}\nchore(db): update note {id}\n\
                 chore(db): create note {id}\nchore(db): initialize notes database",
                id = note.id
            )
        );
    }

    #[test]
    fn test_prune_commits_only_when_something_changed() {
        let fixture = GitFixture::new();
        let (dir, mut store) = git_store(&fixture, "notes", false);

        assert_eq!(store.prune_tags().unwrap(), 0);
        let note = store
            .create_note(NoteDraft {
                tags: vec!["old".to_string()],
                ..NoteDraft::new("t", "")
            })
            .unwrap();
        store.update_note(note.id, NoteDraft::new("t", "")).unwrap();
        assert_eq!(store.prune_tags().unwrap(), 1);

        let last = fixture.git(&dir, &["log", "-1", "--format=%s"]);
        assert_eq!(last, "chore(db): prune tags");
    }

    #[test]
    fn test_local_only_sync_is_noop() {
        let fixture = GitFixture::new();
        let (_, mut store) = git_store(&fixture, "notes", false);
        store.create_note(NoteDraft::new("t", "")).unwrap();

        let report = store.sync(false).unwrap();
        assert_eq!(report.outcome, SyncOutcome::NoOp);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_first_sync_publishes_and_second_is_noop() {
        let fixture = GitFixture::new();
        let (_, mut store) = git_store(&fixture, "notes", true);
        store.create_note(NoteDraft::new("t", "")).unwrap();

        assert_eq!(store.sync(false).unwrap().outcome, SyncOutcome::Pushed);
        assert_eq!(fixture.remote_commit_count(), 2);
        assert_eq!(store.sync(false).unwrap().outcome, SyncOutcome::NoOp);
    }

    fn titles(store: &Store) -> Vec<String> {
        store
            .list_notes(10, &[])
            .unwrap()
            .into_iter()
            .map(|note| note.title)
            .collect()
    }

    #[test]
    fn test_remote_wins_reloads_the_replaced_database() {
        let fixture = GitFixture::new();
        let (_, mut desk) = git_store(&fixture, "desk", true);
        desk.create_note(NoteDraft::new("desk", "")).unwrap();
        desk.sync(false).unwrap();

        // Opening an empty directory clones the published notes
        let laptop_dir = fixture.path("laptop");
        let config = Config {
            git_remote_url: Some(fixture.remote_url()),
            ..local_config(&laptop_dir, SyncBackend::Git)
        };
        let remote_wins =
            Box::new(|_: &Divergence| -> SyncResult<Resolution> { Ok(Resolution::RemoteWins) });
        let provider = sync_provider_for(&config, true, remote_wins);
        let mut laptop = Store::open(&config, provider).unwrap();
        fixture.configure_identity(&laptop_dir);
        assert_eq!(titles(&laptop), vec!["desk"]);

        laptop.create_note(NoteDraft::new("laptop", "")).unwrap();
        desk.create_note(NoteDraft::new("desk2", "")).unwrap();
        desk.sync(false).unwrap();

        let report = laptop.sync(false).unwrap();

        assert_eq!(report.outcome, SyncOutcome::ResetToRemote);
        assert_eq!(report.divergence, Some(Divergence::Diverged { ahead: 1, behind: 1 }));
        assert_eq!(titles(&laptop), vec!["desk2", "desk"]);
        assert_eq!(laptop.sync_status().unwrap().tree, Some(TreeState::Clean));
    }

    #[test]
    fn test_sync_republishes_after_remote_branch_was_deleted() {
        let fixture = GitFixture::new();
        let (_, mut store) = git_store(&fixture, "notes", true);
        store.create_note(NoteDraft::new("t", "")).unwrap();
        store.sync(false).unwrap();

        fixture.git(&fixture.remote_path(), &["update-ref", "-d", "refs/heads/main"]);
        let report = store.sync(false).unwrap();

        assert_eq!(report.outcome, SyncOutcome::Pushed);
        assert_eq!(report.divergence, Some(Divergence::NoUpstream));
        assert_eq!(fixture.remote_commit_count(), 2);
        assert_eq!(store.sync(false).unwrap().outcome, SyncOutcome::NoOp);
    }

    #[test]
    fn test_sync_errors_downcast_to_sync_error() {
        let fixture = GitFixture::new();
        let (dir, mut store) = git_store(&fixture, "notes", true);
        store.create_note(NoteDraft::new("t", "")).unwrap();
        store.sync(false).unwrap();

        fixture.git(&dir, &["remote", "set-url", "origin", "/nonexistent/remote.git"]);
        let err = store.sync(false).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::Network { .. })
        ));
    }
}

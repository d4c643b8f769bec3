//! SQLite notes database
//!
//! The single file the sync engine versions. Timestamps are stored as
//! RFC 3339 text in UTC with a fixed precision so they sort lexically.

use std::fs;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use tracing::debug;

use crate::models::{Note, NoteDraft, NoteKind};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema::{init_schema, needs_init};

const NOTE_COLUMNS: &str =
    "id, title, body, description, created_at, updated_at, published, kind";

/// Raw column values of a `notes` row
struct NoteRow {
    id: i64,
    title: String,
    body: String,
    description: String,
    created_at: String,
    updated_at: String,
    published: bool,
    kind: String,
}

impl NoteRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            body: row.get(2)?,
            description: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            published: row.get(6)?,
            kind: row.get(7)?,
        })
    }
}

/// Connection to the notes database
pub struct NoteDatabase {
    conn: Connection,
}

impl NoteDatabase {
    /// Open or create the database file
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| invalid_database(path, e))?;

        if needs_init(&conn) {
            debug!("Initialising schema in {:?}", path);
            init_schema(&conn).map_err(|e| invalid_database(path, e))?;
        }

        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    // ==================== Mutations ====================

    pub fn create_note(&mut self, draft: &NoteDraft) -> StorageResult<Note> {
        if draft.is_empty() {
            return Err(StorageError::EmptyNote);
        }
        let (title, body) = draft.normalized_content();
        let created = draft.created_at.unwrap_or_else(Utc::now);
        let updated = draft.updated_at.unwrap_or(created);

        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO notes (title, body, description, created_at, updated_at, published, kind)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                title,
                body,
                draft.description.trim(),
                to_db_time(&created),
                to_db_time(&updated),
                draft.published,
                draft.kind.as_str(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        replace_tags(&tx, id, &draft.tags)?;
        tx.commit()?;

        debug!("Created note {}", id);
        self.fetch_note(id)
    }

    /// Replace a note's content
    ///
    /// `created_at` is kept unless the draft sets it; `updated_at` defaults to
    /// now.
    pub fn update_note(&mut self, id: i64, draft: &NoteDraft) -> StorageResult<Note> {
        if draft.is_empty() {
            return Err(StorageError::EmptyNote);
        }
        let existing = self.fetch_note(id)?;
        let (title, body) = draft.normalized_content();
        let created = draft.created_at.unwrap_or(existing.created_at);
        let updated = draft.updated_at.unwrap_or_else(Utc::now);

        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            UPDATE notes
            SET title = ?1, body = ?2, description = ?3, created_at = ?4,
                updated_at = ?5, published = ?6, kind = ?7
            WHERE id = ?8
            "#,
            params![
                title,
                body,
                draft.description.trim(),
                to_db_time(&created),
                to_db_time(&updated),
                draft.published,
                draft.kind.as_str(),
                id,
            ],
        )?;
        replace_tags(&tx, id, &draft.tags)?;
        tx.commit()?;

        debug!("Updated note {}", id);
        self.fetch_note(id)
    }

    pub fn delete_note(&mut self, id: i64) -> StorageResult<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(StorageError::NoteNotFound(id));
        }
        debug!("Deleted note {}", id);
        Ok(())
    }

    /// Remove tags no note refers to; returns how many were removed
    pub fn prune_unused_tags(&mut self) -> StorageResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM tags WHERE id NOT IN (SELECT DISTINCT tag_id FROM note_tags)",
            [],
        )?;
        Ok(removed)
    }

    // ==================== Query Methods ====================

    pub fn fetch_note(&self, id: i64) -> StorageResult<Note> {
        let sql = format!("SELECT {} FROM notes WHERE id = ?", NOTE_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id], NoteRow::from_row)
            .optional()?;
        match row {
            Some(row) => self.hydrate(row),
            None => Err(StorageError::NoteNotFound(id)),
        }
    }

    /// The most recently updated note
    pub fn fetch_last_updated(&self) -> StorageResult<Note> {
        let sql = format!(
            "SELECT {} FROM notes ORDER BY updated_at DESC, id DESC LIMIT 1",
            NOTE_COLUMNS
        );
        let row = self
            .conn
            .query_row(&sql, [], NoteRow::from_row)
            .optional()?;
        match row {
            Some(row) => self.hydrate(row),
            None => Err(StorageError::Empty),
        }
    }

    /// Most recently updated notes first
    ///
    /// A non-empty `tags` keeps only notes carrying every listed tag.
    pub fn list_notes(&self, limit: usize, tags: &[String]) -> StorageResult<Vec<Note>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut filter = NoteFilter::default();
        filter.with_tags(tags);
        let sql = format!(
            "SELECT {} FROM notes{} ORDER BY updated_at DESC, id DESC LIMIT ?",
            NOTE_COLUMNS,
            filter.where_clause()
        );
        let mut values = filter.values;
        values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        self.query_notes(&sql, params_from_iter(values))
    }

    /// Case-insensitive substring search over title, body and description
    ///
    /// Matches come newest first; a non-empty `tags` narrows them like
    /// [`list_notes`](Self::list_notes).
    pub fn search_notes(&self, pattern: &str, tags: &[String]) -> StorageResult<Vec<Note>> {
        if pattern.is_empty() {
            return Ok(Vec::new());
        }

        let like = format!("%{}%", escape_like(&pattern.to_lowercase()));
        let mut filter = NoteFilter::default();
        filter.push(
            r"(lower(title) LIKE ? ESCAPE '\'
               OR lower(body) LIKE ? ESCAPE '\'
               OR lower(description) LIKE ? ESCAPE '\')",
            vec![Value::Text(like); 3],
        );
        filter.with_tags(tags);

        let sql = format!(
            "SELECT {} FROM notes{} ORDER BY updated_at DESC, id DESC",
            NOTE_COLUMNS,
            filter.where_clause()
        );
        self.query_notes(&sql, params_from_iter(filter.values))
    }

    pub fn count_notes(&self) -> StorageResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?)
    }

    /// Tags with usage counts, most used first
    pub fn tags_with_counts(&self) -> StorageResult<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT t.name, COUNT(nt.note_id) as count
            FROM tags t
            LEFT JOIN note_tags nt ON t.id = nt.tag_id
            GROUP BY t.id
            ORDER BY count DESC, t.name
            "#,
        )?;
        let tags = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, i64)>, _>>()?;
        Ok(tags)
    }

    // ==================== Private helpers ====================

    fn query_notes<P: rusqlite::Params>(&self, sql: &str, params: P) -> StorageResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, NoteRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    fn hydrate(&self, row: NoteRow) -> StorageResult<Note> {
        let tags = self.tags_for_note(row.id)?;
        let created_at = from_db_time(row.id, &row.created_at)?;
        let updated_at = from_db_time(row.id, &row.updated_at)?;
        // Unknown kinds written by a newer version read as plain notes
        let kind = row.kind.parse().unwrap_or(NoteKind::Note);

        Ok(Note {
            id: row.id,
            title: row.title,
            body: row.body,
            description: row.description,
            tags,
            created_at,
            updated_at,
            published: row.published,
            kind,
        })
    }

    fn tags_for_note(&self, note_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT t.name FROM tags t
            JOIN note_tags nt ON t.id = nt.tag_id
            WHERE nt.note_id = ?
            ORDER BY nt.position
            "#,
        )?;
        let tags = stmt
            .query_map(params![note_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(tags)
    }
}

/// WHERE conditions joined with AND, plus their positional values
#[derive(Default)]
struct NoteFilter {
    conditions: Vec<String>,
    values: Vec<Value>,
}

impl NoteFilter {
    fn push(&mut self, condition: &str, values: Vec<Value>) {
        self.conditions.push(condition.to_string());
        self.values.extend(values);
    }

    /// Keep notes that carry every tag in `tags`
    fn with_tags(&mut self, tags: &[String]) {
        let mut wanted: Vec<&str> = tags.iter().map(String::as_str).collect();
        wanted.sort_unstable();
        wanted.dedup();
        if wanted.is_empty() {
            return;
        }

        let placeholders = vec!["?"; wanted.len()].join(", ");
        let condition = format!(
            r#"id IN (
                SELECT nt.note_id FROM note_tags nt
                JOIN tags t ON nt.tag_id = t.id
                WHERE t.name IN ({})
                GROUP BY nt.note_id
                HAVING COUNT(DISTINCT t.id) = {}
            )"#,
            placeholders,
            wanted.len()
        );
        let values = wanted
            .into_iter()
            .map(|tag| Value::Text(tag.to_string()))
            .collect();
        self.push(&condition, values);
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}

fn replace_tags(tx: &Transaction<'_>, note_id: i64, tags: &[String]) -> StorageResult<()> {
    tx.execute("DELETE FROM note_tags WHERE note_id = ?", params![note_id])?;
    for (position, tag) in tags.iter().enumerate() {
        tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?)", params![tag])?;
        let tag_id: i64 =
            tx.query_row("SELECT id FROM tags WHERE name = ?", params![tag], |row| {
                row.get(0)
            })?;
        tx.execute(
            "INSERT OR IGNORE INTO note_tags (note_id, tag_id, position) VALUES (?1, ?2, ?3)",
            params![note_id, tag_id, position as i64],
        )?;
    }
    Ok(())
}

fn to_db_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn from_db_time(id: i64, value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp {
            id,
            value: value.to_string(),
        })
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn invalid_database(path: &Path, error: rusqlite::Error) -> StorageError {
    StorageError::InvalidDatabase {
        path: path.to_path_buf(),
        details: error.to_string(),
    }
}

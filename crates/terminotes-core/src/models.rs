//! Data models for Terminotes
//!
//! Defines the note record stored in the database and the draft used to
//! create or update one.

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display format for timestamps, always in UTC
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Kind of entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    /// Long-form note written in the editor
    #[default]
    Note,
    /// Short entry written from the command line
    Log,
}

impl NoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteKind::Note => "note",
            NoteKind::Log => "log",
        }
    }
}

impl fmt::Display for NoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "note" => Ok(NoteKind::Note),
            "log" => Ok(NoteKind::Log),
            other => bail!("Unknown note type '{}'. Expected 'note' or 'log'.", other),
        }
    }
}

/// A stored note
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    /// Database row id
    pub id: i64,
    pub title: String,
    pub body: String,
    pub description: String,
    /// Tags in the order they were given
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Whether the note may be published by export tooling
    pub published: bool,
    pub kind: NoteKind,
}

impl Note {
    /// Title for listings, falling back to the first body line
    pub fn display_title(&self) -> String {
        if !self.title.is_empty() {
            return self.title.clone();
        }
        let first_line = self.body.lines().next().unwrap_or("").trim();
        if first_line.chars().count() > 60 {
            let truncated: String = first_line.chars().take(57).collect();
            format!("{}...", truncated)
        } else {
            first_line.to_string()
        }
    }
}

/// Content for creating or replacing a note
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NoteDraft {
    pub title: String,
    pub body: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Defaults to now on create; left unchanged on update when `None`
    pub created_at: Option<DateTime<Utc>>,
    /// Defaults to `created_at` on create and to now on update
    pub updated_at: Option<DateTime<Utc>>,
    pub published: bool,
    pub kind: NoteKind,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Trimmed title and body
    pub fn normalized_content(&self) -> (String, String) {
        (self.title.trim().to_string(), self.body.trim_end().to_string())
    }

    /// A note needs a title or a body
    pub fn is_empty(&self) -> bool {
        let (title, body) = self.normalized_content();
        title.is_empty() && body.is_empty()
    }
}

/// Parse a user-supplied timestamp
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM` (optionally followed by `UTC`) and
/// `YYYY-MM-DD`. Values without an offset are taken as UTC.
pub fn parse_user_datetime(input: &str) -> Result<DateTime<Utc>> {
    let value = input.trim();
    if value.is_empty() {
        bail!("Empty timestamp");
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = value.strip_suffix("UTC").map(str::trim_end).unwrap_or(value);
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(naive, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    bail!(
        "Invalid timestamp '{}'. Use ISO 8601, 'YYYY-MM-DD HH:MM' or 'YYYY-MM-DD'.",
        value
    )
}

/// Render a timestamp the way it appears in front matter and listings
pub fn format_user_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(DISPLAY_FORMAT).to_string()
}

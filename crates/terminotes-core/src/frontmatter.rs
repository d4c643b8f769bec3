//! Front matter documents
//!
//! Notes are edited as a YAML block between `---` lines followed by the body.
//! Metadata that does not parse is ignored and the whole payload is treated
//! as body text.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::models::{format_user_datetime, parse_user_datetime, Note, NoteKind};

const DELIMITER: &str = "---";

/// Metadata block written into the editor template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrontMatter {
    pub title: String,
    pub description: String,
    pub date: String,
    pub last_edited: String,
    pub tags: Vec<String>,
    pub published: bool,
    #[serde(rename = "type")]
    pub kind: NoteKind,
}

impl FrontMatter {
    /// Template for a brand-new note
    pub fn template(now: &DateTime<Utc>) -> Self {
        let timestamp = format_user_datetime(now);
        Self {
            title: String::new(),
            description: String::new(),
            date: timestamp.clone(),
            last_edited: timestamp,
            tags: Vec::new(),
            published: false,
            kind: NoteKind::Note,
        }
    }

    pub fn from_note(note: &Note) -> Self {
        Self {
            title: note.title.clone(),
            description: note.description.clone(),
            date: format_user_datetime(&note.created_at),
            last_edited: format_user_datetime(&note.updated_at),
            tags: note.tags.clone(),
            published: note.published,
            kind: note.kind,
        }
    }
}

/// Render front matter and body as one editable document
pub fn render_document(meta: &FrontMatter, body: &str) -> Result<String, serde_yaml::Error> {
    let payload = serde_yaml::to_string(meta)?;
    let payload = payload.trim_end();
    let body = body.trim_end();
    if body.is_empty() {
        Ok(format!("{DELIMITER}\n{payload}\n{DELIMITER}\n\n"))
    } else {
        Ok(format!("{DELIMITER}\n{payload}\n{DELIMITER}\n\n{body}\n"))
    }
}

/// Editor payload split into metadata and body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedDocument {
    pub title: Option<String>,
    pub body: String,
    pub description: String,
    pub tags: Vec<String>,
    pub metadata: Mapping,
}

/// Parse an editor payload
///
/// Without a well-formed front matter block the trimmed payload becomes the
/// body and every metadata field is empty.
pub fn parse_document(raw: &str) -> ParsedDocument {
    let lines: Vec<&str> = raw.lines().collect();
    let plain = || ParsedDocument {
        body: raw.trim().to_string(),
        ..Default::default()
    };

    if lines.first().map(|l| l.trim()) != Some(DELIMITER) {
        return plain();
    }
    let Some(closing) = lines.iter().skip(1).position(|l| l.trim() == DELIMITER) else {
        return plain();
    };
    let closing = closing + 1;

    let block = lines[1..closing].join("\n");
    let body = lines[closing + 1..].join("\n").trim().to_string();

    let metadata = match serde_yaml::from_str::<Value>(&block) {
        Ok(Value::Mapping(map)) => map,
        _ => Mapping::new(),
    };

    let title = string_field(&metadata, "title").filter(|t| !t.is_empty());
    let description = string_field(&metadata, "description").unwrap_or_default();
    let tags = tags_field(&metadata);

    ParsedDocument {
        title,
        body,
        description,
        tags,
        metadata,
    }
}

impl ParsedDocument {
    fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(Value::String(key.to_string()))
    }

    /// `published` flag, accepting booleans and common truthy strings
    pub fn published(&self, default: bool) -> bool {
        match self.get("published") {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => default,
            },
            _ => default,
        }
    }

    /// Note kind from `type`; unknown values fall back to `default`
    pub fn kind(&self, default: NoteKind, warnings: &mut Vec<String>) -> NoteKind {
        match self.get("type") {
            Some(Value::String(s)) if !s.trim().is_empty() => match s.parse() {
                Ok(kind) => kind,
                Err(_) => {
                    warnings.push(format!(
                        "Unknown 'type' value '{}'. Using '{}'.",
                        s.trim(),
                        default
                    ));
                    default
                }
            },
            _ => default,
        }
    }

    /// Timestamp field; invalid values are dropped with a warning
    pub fn timestamp(&self, field: &str, warnings: &mut Vec<String>) -> Option<DateTime<Utc>> {
        let value = match self.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            _ => return None,
        };
        match parse_user_datetime(&value) {
            Ok(dt) => Some(dt),
            Err(_) => {
                warnings.push(format!("Ignoring invalid '{}' timestamp: {}", field, value));
                None
            }
        }
    }
}

fn string_field(metadata: &Mapping, key: &str) -> Option<String> {
    match metadata.get(Value::String(key.to_string())) {
        Some(Value::String(s)) => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Tags as a YAML list or a comma-separated string
fn tags_field(metadata: &Mapping) -> Vec<String> {
    match metadata.get(Value::String("tags".to_string())) {
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_then_parse_template() {
        let now = parse_user_datetime("2025-01-31 09:15").unwrap();
        let mut meta = FrontMatter::template(&now);
        meta.title = "Standup".to_string();
        meta.tags = vec!["work".to_string()];

        let doc = render_document(&meta, "Talked about #sync\n\n").unwrap();
        assert!(doc.starts_with("---\ntitle: Standup\n"));
        assert!(doc.ends_with("---\n\nTalked about #sync\n"));

        let parsed = parse_document(&doc);
        let mut warnings = Vec::new();
        assert_eq!(parsed.title.as_deref(), Some("Standup"));
        assert_eq!(parsed.body, "Talked about #sync");
        assert_eq!(parsed.tags, vec!["work"]);
        assert!(!parsed.published(true));
        assert_eq!(parsed.kind(NoteKind::Log, &mut warnings), NoteKind::Note);
        assert_eq!(parsed.timestamp("date", &mut warnings), Some(now));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_plain_text_without_front_matter() {
        let parsed = parse_document("\n  just some text \n");
        assert_eq!(parsed.title, None);
        assert_eq!(parsed.body, "just some text");
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn test_unclosed_block_is_body() {
        let parsed = parse_document("---\ntitle: x\nno closing line");
        assert_eq!(parsed.title, None);
        assert!(parsed.body.starts_with("---"));
    }

    #[test]
    fn test_invalid_yaml_keeps_body() {
        let parsed = parse_document("---\ntitle: [unclosed\n---\nbody");
        assert_eq!(parsed.title, None);
        assert_eq!(parsed.body, "body");
        assert!(parsed.metadata.is_empty());
    }

    #[test]
    fn test_comma_separated_tags_and_string_flags() {
        let parsed = parse_document("---\ntags: a, b ,c\npublished: \"yes\"\n---\n");
        assert_eq!(parsed.tags, vec!["a", "b", "c"]);
        assert!(parsed.published(false));
    }

    #[test]
    fn test_bad_metadata_values_warn() {
        let parsed = parse_document("---\ntype: journal\ndate: someday\n---\nbody");
        let mut warnings = Vec::new();

        assert_eq!(parsed.kind(NoteKind::Note, &mut warnings), NoteKind::Note);
        assert_eq!(parsed.timestamp("date", &mut warnings), None);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[1].contains("someday"));
    }
}

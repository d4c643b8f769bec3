//! Note command handlers
//!
//! `new` and `edit` round-trip a front matter document through the editor;
//! `log` records a one-line entry straight from the command line.

use anyhow::{bail, Context, Result};

use terminotes_core::frontmatter::parse_document;
use terminotes_core::models::parse_user_datetime;
use terminotes_core::Store;

use crate::editor::{confirm, edit_text};
use crate::output::Output;

/// Create a note from an editor template
pub fn new(store: &mut Store, editor: Option<&str>, output: &Output) -> Result<()> {
    let template = store.new_note_template()?;
    let edited = edit_text(editor, &template).context("Failed to edit note")?;

    let parsed = parse_document(&edited);
    if edited.trim() == template.trim() || (parsed.title.is_none() && parsed.body.is_empty()) {
        output.message("Empty note; nothing saved.");
        return Ok(());
    }

    let saved = store.create_from_document(&edited)?;
    output.print_saved("Created", &saved);
    Ok(())
}

/// Edit a note (the last updated one when `id` is omitted)
pub fn edit(
    store: &mut Store,
    id: Option<i64>,
    editor: Option<&str>,
    output: &Output,
) -> Result<()> {
    let (note, document) = store.edit_document(id)?;
    let edited = edit_text(editor, &document).context("Failed to edit note")?;

    if edited.trim() == document.trim() {
        output.message(&format!("No changes to note {}.", note.id));
        return Ok(());
    }

    let saved = store.update_from_document(&note, &edited)?;
    output.print_saved("Updated", &saved);
    Ok(())
}

/// Record a log entry from command-line words
pub fn log(
    store: &mut Store,
    words: &[String],
    tags: &[String],
    created: Option<&str>,
    output: &Output,
) -> Result<()> {
    let text = words.join(" ");
    let text = text.trim();
    if text.is_empty() {
        bail!("Content is required for 'tn log'.");
    }

    let created_at = created.map(parse_user_datetime).transpose()?;
    let saved = store.create_log_entry(text, tags, created_at)?;
    output.print_saved("Logged", &saved);
    Ok(())
}

/// Delete a note after confirmation
pub fn delete(store: &mut Store, id: i64, yes: bool, output: &Output) -> Result<()> {
    let note = store.fetch_note(id)?;

    if !yes && output.should_prompt() {
        println!("Delete note {}: {}", note.id, note.display_title());
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.delete_note(id)?;
    output.success(&format!("Deleted note {}", id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{local_store, quiet};
    use tempfile::TempDir;
    use terminotes_core::NoteKind;

    #[test]
    fn test_log_joins_words() {
        let temp = TempDir::new().unwrap();
        let mut store = local_store(&temp);

        let words = vec!["shipped".to_string(), "#release".to_string()];
        let tags = vec!["work".to_string()];
        let when = Some("2024-05-01 12:00");
        log(&mut store, &words, &tags, when, &quiet()).unwrap();

        let note = store.fetch_last_updated().unwrap();
        assert_eq!(note.body, "shipped #release");
        assert_eq!(note.kind, NoteKind::Log);
        assert_eq!(note.tags, vec!["work", "release"]);
        assert_eq!(note.created_at.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_log_rejects_empty_text_and_bad_dates() {
        let temp = TempDir::new().unwrap();
        let mut store = local_store(&temp);

        assert!(log(&mut store, &[" ".to_string()], &[], None, &quiet()).is_err());
        let words = vec!["text".to_string()];
        assert!(log(&mut store, &words, &[], Some("someday"), &quiet()).is_err());
        assert_eq!(store.count_notes().unwrap(), 0);
    }

    #[test]
    fn test_delete_with_yes() {
        let temp = TempDir::new().unwrap();
        let mut store = local_store(&temp);
        log(&mut store, &["x".to_string()], &[], None, &quiet()).unwrap();
        let id = store.fetch_last_updated().unwrap().id;

        delete(&mut store, id, true, &quiet()).unwrap();
        assert_eq!(store.count_notes().unwrap(), 0);
        assert!(delete(&mut store, id, true, &quiet()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_new_and_edit_through_editor() {
        let temp = TempDir::new().unwrap();
        let mut store = local_store(&temp);

        // GNU sed: fill in the first empty value, which is the title
        new(&mut store, Some("sed -i 0,/''/s//Groceries/"), &quiet()).unwrap();
        let note = store.fetch_last_updated().unwrap();
        assert_eq!(note.title, "Groceries");

        edit(&mut store, None, Some("sed -i s/Groceries/Shopping/"), &quiet()).unwrap();
        assert_eq!(store.fetch_note(note.id).unwrap().title, "Shopping");
    }

    #[cfg(unix)]
    #[test]
    fn test_untouched_template_saves_nothing() {
        let temp = TempDir::new().unwrap();
        let mut store = local_store(&temp);

        new(&mut store, Some("true"), &quiet()).unwrap();
        assert_eq!(store.count_notes().unwrap(), 0);
    }
}

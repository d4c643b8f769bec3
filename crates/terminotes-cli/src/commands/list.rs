//! Listing and search handlers

use anyhow::{bail, Result};

use terminotes_core::{Note, Store};

use crate::output::Output;

/// List the most recently updated notes
pub fn ls(
    store: &Store,
    limit: usize,
    tags: &[String],
    reverse: bool,
    output: &Output,
) -> Result<()> {
    let mut notes = store.list_notes(limit, tags)?;
    if reverse {
        notes.reverse();
    }
    output.print_notes(&notes);
    Ok(())
}

/// Case-insensitive search over title, body and description
///
/// `reverse` applies before `limit`, so it shows the oldest matches.
pub fn search(
    store: &Store,
    pattern: &str,
    limit: usize,
    tags: &[String],
    reverse: bool,
    output: &Output,
) -> Result<()> {
    let notes = find_matches(store, pattern, limit, tags, reverse)?;
    output.print_notes(&notes);
    Ok(())
}

fn find_matches(
    store: &Store,
    pattern: &str,
    limit: usize,
    tags: &[String],
    reverse: bool,
) -> Result<Vec<Note>> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        bail!("Search pattern cannot be empty");
    }
    let mut notes = store.search_notes(pattern, tags)?;
    if reverse {
        notes.reverse();
    }
    notes.truncate(limit);
    Ok(notes)
}

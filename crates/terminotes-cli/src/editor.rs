//! Interactive editing support
//!
//! Opens the configured editor on a temporary markdown file holding the note
//! document, and asks yes/no questions on the terminal.

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};

static EDIT_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Open content in the user's preferred editor
///
/// `configured` (the `editor` config key) wins over $EDITOR and $VISUAL.
/// The command may carry arguments, e.g. `code --wait`.
pub fn edit_text(configured: Option<&str>, initial_content: &str) -> Result<String> {
    let editor = find_editor(configured)?;

    let seq = EDIT_SEQ.fetch_add(1, Ordering::Relaxed);
    let temp_path = env::temp_dir().join(format!(
        "terminotes_edit_{}_{}.md",
        std::process::id(),
        seq
    ));
    fs::write(&temp_path, initial_content)
        .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;

    let result = run_editor(&editor, &temp_path);
    let content = result.and_then(|()| {
        fs::read_to_string(&temp_path)
            .with_context(|| format!("Failed to read edited file: {:?}", temp_path))
    });

    let _ = fs::remove_file(&temp_path);
    content
}

/// Open an existing file in the user's preferred editor
pub fn edit_file(configured: Option<&str>, path: &Path) -> Result<()> {
    let editor = find_editor(configured)?;
    run_editor(&editor, path)
}

fn run_editor(editor: &str, path: &Path) -> Result<()> {
    let mut parts = editor.split_whitespace();
    let Some(program) = parts.next() else {
        bail!("Editor command is empty");
    };

    let status = Command::new(program)
        .args(parts)
        .arg(path)
        .status()
        .with_context(|| format!("Failed to run editor: {}", editor))?;

    if !status.success() {
        bail!(
            "Editor '{}' exited with non-zero status. Check that your editor is configured correctly.",
            editor
        );
    }
    Ok(())
}

/// Find the user's preferred editor
fn find_editor(configured: Option<&str>) -> Result<String> {
    if let Some(editor) = configured.map(str::trim).filter(|e| !e.is_empty()) {
        return Ok(editor.to_string());
    }

    for var in ["EDITOR", "VISUAL"] {
        if let Ok(editor) = env::var(var) {
            if !editor.trim().is_empty() {
                return Ok(editor);
            }
        }
    }

    for editor in ["nano", "vim", "vi"] {
        if command_exists(editor) {
            return Ok(editor.to_string());
        }
    }

    bail!(
        "No editor found. Set `editor` in the config file or the $EDITOR variable.\n\
         Example: tn config set editor nano"
    )
}

/// Check if a command exists in PATH
fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Whether stdin is attached to a terminal
pub fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin)
}

/// Prompt for confirmation
///
/// Returns true if user confirms, false otherwise.
/// In non-interactive mode (no TTY), returns false.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !is_interactive() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_editor_wins() {
        assert_eq!(find_editor(Some("  hx ")).unwrap(), "hx");
    }

    #[test]
    fn test_command_exists() {
        #[cfg(unix)]
        assert!(command_exists("ls"));

        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }

    #[cfg(unix)]
    #[test]
    fn test_edit_text_with_scripted_editor() {
        // `sed -i` stands in for an editor that rewrites the file in place
        let edited = edit_text(Some("sed -i s/draft/final/"), "a draft note\n").unwrap();
        assert_eq!(edited, "a final note\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_editor_is_an_error() {
        let err = edit_text(Some("false"), "text").unwrap_err();
        assert!(err.to_string().contains("non-zero status"));
    }
}

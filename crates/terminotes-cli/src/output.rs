//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)
//!
//! Warnings and errors always go to stderr so JSON on stdout stays parseable.

use serde::Serialize;
use serde_json::json;

use terminotes_core::storage::StorageError;
use terminotes_core::sync::ProviderStatus;
use terminotes_core::{Note, SavedNote, SyncError, SyncReport};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Figures shown by `tn info`
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub database: String,
    pub notes: i64,
    pub tags: Vec<TagCount>,
    pub sync: ProviderStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: i64,
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a list of notes
    pub fn print_notes(&self, notes: &[Note]) {
        match self.format {
            OutputFormat::Human => {
                if notes.is_empty() {
                    println!("No notes found.");
                    return;
                }
                for note in notes {
                    println!("{}", note_line(note));
                }
                println!("\n{} note(s)", notes.len());
            }
            OutputFormat::Json => print_json(&notes),
            OutputFormat::Quiet => {
                for note in notes {
                    println!("{}", note.id);
                }
            }
        }
    }

    /// Report a created or updated note, plus ignored tags and metadata
    pub fn print_saved(&self, verb: &str, saved: &SavedNote) {
        if !saved.unknown_tags.is_empty() {
            self.warn(&format!(
                "Ignored tags not in allowed_tags: {}",
                saved.unknown_tags.join(", ")
            ));
        }
        for warning in &saved.warnings {
            self.warn(warning);
        }

        match self.format {
            OutputFormat::Human => {
                println!("✓ {} note {}: {}", verb, saved.note.id, saved.note.display_title());
            }
            OutputFormat::Json => print_json(&json!({
                "status": "success",
                "action": verb.to_lowercase(),
                "note": saved.note,
                "unknown_tags": saved.unknown_tags,
                "warnings": saved.warnings,
            })),
            OutputFormat::Quiet => println!("{}", saved.note.id),
        }
    }

    pub fn print_info(&self, info: &StoreInfo) {
        match self.format {
            OutputFormat::Human => {
                println!("Terminotes");
                println!("==========");
                println!();
                println!("Storage:");
                println!("  Database: {}", info.database);
                println!("  Notes:    {}", info.notes);
                println!();
                println!("Sync:");
                println!("  Backend:  {}", info.sync.backend);
                if let Some(ref dir) = info.sync.work_dir {
                    println!("  Repo:     {}", dir.display());
                }
                println!(
                    "  Remote:   {}",
                    info.sync.remote_url.as_deref().unwrap_or("(local only)")
                );
                if let Some(ref branch) = info.sync.branch {
                    let upstream = if info.sync.has_upstream {
                        "tracking"
                    } else {
                        "no upstream"
                    };
                    println!("  Branch:   {} ({})", branch, upstream);
                }
                if let Some(ref tree) = info.sync.tree {
                    println!("  Tree:     {}", tree);
                }
                println!();
                if info.tags.is_empty() {
                    println!("No tags.");
                } else {
                    println!("Tags:");
                    for tag in &info.tags {
                        println!("  {} ({})", tag.name, tag.count);
                    }
                }
            }
            OutputFormat::Json => print_json(info),
            OutputFormat::Quiet => println!("{}", info.notes),
        }
    }

    /// Print the result of `tn sync`
    pub fn print_sync_report(&self, report: &SyncReport) {
        match self.format {
            OutputFormat::Human => {
                let marker = if report.exit_code() >= 12 { "✗" } else { "✓" };
                println!("{} {}", marker, report.message);
            }
            OutputFormat::Json => print_json(&json!({
                "outcome": report.outcome,
                "divergence": report.divergence,
                "message": report.message,
                "exit_code": report.exit_code(),
            })),
            OutputFormat::Quiet => println!("{}", report.outcome.label()),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!("{}", json!({"status": "success", "message": message}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (suppressed in quiet mode)
    pub fn warn(&self, msg: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", msg);
        }
    }

    /// Print a failed command's error chain and any recovery hint
    ///
    /// JSON errors also say whether running the same command again can succeed.
    pub fn error(&self, err: &anyhow::Error) {
        let hint = recovery_hint(err);
        match self.format {
            OutputFormat::Json => {
                let causes: Vec<String> = err.chain().skip(1).map(|c| c.to_string()).collect();
                eprintln!(
                    "{}",
                    json!({
                        "status": "error",
                        "message": err.to_string(),
                        "causes": causes,
                        "hint": hint,
                        "retryable": is_retryable(err),
                    })
                );
            }
            _ => {
                eprintln!("Error: {:#}", err);
                if let Some(hint) = hint {
                    eprintln!("Hint: {}", hint);
                }
            }
        }
    }
}

/// Recovery suggestion of the first typed error in the chain
fn recovery_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(sync) = cause.downcast_ref::<SyncError>() {
            sync.recovery_suggestion()
        } else if let Some(storage) = cause.downcast_ref::<StorageError>() {
            storage.recovery_suggestion()
        } else {
            None
        }
    })
}

/// Whether a sync failure in the chain is transient
fn is_retryable(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<SyncError>())
        .any(SyncError::is_retryable)
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: failed to encode JSON output: {}", e),
    }
}

/// One listing row: id, date, kind, title and tags
fn note_line(note: &Note) -> String {
    let tags = if note.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", note.tags.join(", "))
    };
    format!(
        "{:>5} | {} | {:<4} | {}{}",
        note.id,
        note.updated_at.format("%Y-%m-%d %H:%M"),
        note.kind,
        truncate(&note.display_title(), 50),
        tags
    )
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

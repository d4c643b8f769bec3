//! Terminotes CLI
//!
//! Command-line interface for Terminotes - notes in a git-versioned SQLite file.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use terminotes_core::{sync_provider_for, Config, Store, EXIT_FAILED};

mod commands;
mod editor;
mod output;
mod prompt;

use output::{Output, OutputFormat};
use prompt::TerminalPrompt;

/// Environment variable overriding `log_level`
const LOG_ENV: &str = "TN_LOG";

#[derive(Parser)]
#[command(name = "tn")]
#[command(about = "Terminotes - notes in your terminal, versioned with git")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to configuration TOML file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a note in the editor
    New,
    /// Edit a note in the editor (the last updated one by default)
    Edit {
        /// Note ID
        id: Option<i64>,
    },
    /// Record a log entry from the command line
    Log {
        /// Tag to add (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,
        /// Creation time (ISO 8601, 'YYYY-MM-DD HH:MM' or 'YYYY-MM-DD')
        #[arg(short = 'c', long, value_name = "WHEN")]
        created: Option<String>,
        /// Entry text; #hashtags become tags
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Delete a note
    #[command(alias = "rm")]
    Delete {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Note ID
        id: i64,
    },
    /// List the most recently updated notes
    #[command(alias = "list")]
    Ls {
        /// Maximum notes to list
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
        /// Only notes with this tag (repeatable; all must match)
        #[arg(short, long)]
        tag: Vec<String>,
        /// Oldest first
        #[arg(short, long)]
        reverse: bool,
    },
    /// Search title, body and description
    Search {
        /// Maximum matches to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
        /// Oldest matches first
        #[arg(short, long)]
        reverse: bool,
        /// Only matches with this tag (repeatable; all must match)
        #[arg(short, long)]
        tag: Vec<String>,
        /// Text to look for (case-insensitive)
        pattern: String,
    },
    /// Remove tags no note uses
    Prune,
    /// Show database, tag and sync status
    Info,
    /// Synchronize the notes repository with its remote
    Sync {
        /// Report what would happen without changing anything
        #[arg(short, long)]
        dry_run: bool,
    },
    /// Show or change configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (terminotes_dir, git_remote_url, sync_backend, ...)
        key: String,
        /// Configuration value ("none" clears optional keys)
        value: String,
    },
    /// Open the config file in the editor
    Edit,
    /// Print the config file location
    Path,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match run(cli, &output) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            output.error(&e);
            ExitCode::from(EXIT_FAILED)
        }
    }
}

/// Dispatch a command and return the process exit status
fn run(cli: Cli, output: &Output) -> Result<u8> {
    let config_path = cli.config.as_ref();

    // Config commands work without a store (and with a broken config file)
    if let Commands::Config { command } = &cli.command {
        handle_config_command(command.clone(), config_path, output)?;
        return Ok(0);
    }

    let config = Config::load_with_cli_override(config_path)?;
    init_logging(&config);

    let interactive = editor::is_interactive();
    debug!(
        "Opening store in {:?} (backend {}, interactive {})",
        config.terminotes_dir, config.sync_backend, interactive
    );
    let provider = sync_provider_for(&config, interactive, Box::new(TerminalPrompt::stdio()));
    let mut store = Store::open(&config, provider)?;
    let editor = config.editor.as_deref();

    match cli.command {
        Commands::New => commands::note::new(&mut store, editor, output)?,
        Commands::Edit { id } => commands::note::edit(&mut store, id, editor, output)?,
        Commands::Log { tag, created, text } => {
            commands::note::log(&mut store, &text, &tag, created.as_deref(), output)?
        }
        Commands::Delete { yes, id } => commands::note::delete(&mut store, id, yes, output)?,
        Commands::Ls {
            limit,
            tag,
            reverse,
        } => commands::list::ls(&store, limit, &tag, reverse, output)?,
        Commands::Search {
            limit,
            reverse,
            tag,
            pattern,
        } => commands::list::search(&store, &pattern, limit, &tag, reverse, output)?,
        Commands::Prune => commands::tag::prune(&mut store, output)?,
        Commands::Info => commands::info::show(&mut store, output)?,
        Commands::Sync { dry_run } => {
            let report = commands::sync::sync(&mut store, dry_run, output)?;
            return Ok(report.exit_code());
        }
        Commands::Config { .. } => {} // Handled above
    }

    Ok(0)
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(&key, &value, config_path, output)
        }
        Some(ConfigCommands::Edit) => commands::config::edit(config_path, output),
        Some(ConfigCommands::Path) => commands::config::path(config_path, output),
    }
}

/// Initialize logging
///
/// TN_LOG overrides `log_level`. Logs go to `log_file` when configured,
/// otherwise to stderr.
fn init_logging(config: &Config) {
    let level = std::env::var(LOG_ENV).unwrap_or_else(|_| config.log_level.clone());
    let env_filter = EnvFilter::try_new(format!("terminotes_core={level},tn={level}"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Some(ref log_path) = config.log_file {
        let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
                return;
            }
        };

        // Ignore error if already initialized
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(log_file)
            .try_init();
        return;
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_created_flag_does_not_clash_with_config() {
        let cli = Cli::try_parse_from([
            "tn", "-c", "/tmp/tn.toml", "log", "-t", "work", "-c", "2024-01-02", "did", "#stuff",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tn.toml")));
        match cli.command {
            Commands::Log { tag, created, text } => {
                assert_eq!(tag, vec!["work"]);
                assert_eq!(created.as_deref(), Some("2024-01-02"));
                assert_eq!(text, vec!["did", "#stuff"]);
            }
            _ => panic!("expected log command"),
        }
    }

    #[test]
    fn test_search_and_ls_take_repeatable_tags() {
        let cli = Cli::try_parse_from([
            "tn", "search", "-n", "5", "-r", "-t", "work", "-t", "plan", "milk",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                limit,
                reverse,
                tag,
                pattern,
            } => {
                assert_eq!(limit, 5);
                assert!(reverse);
                assert_eq!(tag, vec!["work", "plan"]);
                assert_eq!(pattern, "milk");
            }
            _ => panic!("expected search command"),
        }

        let cli = Cli::try_parse_from(["tn", "ls", "-t", "a", "--tag", "b"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Ls { limit: 10, ref tag, reverse: false } if tag == &["a", "b"]
        ));

        let cli = Cli::try_parse_from(["tn", "search", "milk"]).unwrap();
        assert!(matches!(cli.command, Commands::Search { limit: 20, .. }));
    }

    #[test]
    fn test_sync_dry_run_and_global_json() {
        let cli = Cli::try_parse_from(["tn", "sync", "--dry-run", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Sync { dry_run: true }));
    }
}

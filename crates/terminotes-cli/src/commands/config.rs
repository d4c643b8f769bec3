//! Config command handlers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use terminotes_core::Config;

use crate::editor::edit_file;
use crate::output::{Output, OutputFormat};

/// Config file in effect: `-c PATH` or the default location
pub fn effective_path(config_path: Option<&PathBuf>) -> PathBuf {
    config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path)
}

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "terminotes_dir": config.terminotes_dir,
                    "git_remote_url": config.git_remote_url,
                    "sync_backend": config.sync_backend.to_string(),
                    "editor": config.editor,
                    "allowed_tags": config.allowed_tags,
                    "log_file": config.log_file,
                    "log_level": config.log_level,
                    "config_file": effective_path(config_path),
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.terminotes_dir.display());
        }
        OutputFormat::Human => {
            let not_set = || "(not set)".to_string();
            println!("Configuration:");
            println!("  terminotes_dir: {}", config.terminotes_dir.display());
            println!(
                "  git_remote_url: {}",
                config.git_remote_url.clone().unwrap_or_else(not_set)
            );
            println!("  sync_backend:   {}", config.sync_backend);
            println!(
                "  editor:         {}",
                config.editor.clone().unwrap_or_else(not_set)
            );
            println!(
                "  allowed_tags:   {}",
                if config.allowed_tags.is_empty() {
                    "(any)".to_string()
                } else {
                    config.allowed_tags.join(", ")
                }
            );
            println!(
                "  log_file:       {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(not_set)
            );
            println!("  log_level:      {}", config.log_level);
            println!();
            println!("Config file: {}", effective_path(config_path).display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: &str, value: &str, config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, key, value)?;

    config
        .save_to_path(&effective_path(config_path))
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

/// Change one key; empty or "none" clears optional keys
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let optional = |value: &str| {
        let value = value.trim();
        if value.is_empty() || value == "none" {
            None
        } else {
            Some(value.to_string())
        }
    };

    match key {
        "terminotes_dir" => config.terminotes_dir = PathBuf::from(value.trim()),
        "git_remote_url" => config.git_remote_url = optional(value),
        "sync_backend" => config.sync_backend = value.parse()?,
        "editor" => config.editor = optional(value),
        "allowed_tags" => {
            config.allowed_tags = value
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        "log_file" => config.log_file = optional(value).map(PathBuf::from),
        "log_level" => config.log_level = value.trim().to_string(),
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: terminotes_dir, git_remote_url, sync_backend, editor, \
                 allowed_tags, log_file, log_level",
                key
            );
        }
    }
    Ok(())
}

/// Open the config file in the editor, creating it from the template first
pub fn edit(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let path = effective_path(config_path);
    let created = Config::bootstrap_file(&path)?;

    // A broken file must still be editable
    let editor = Config::load_with_cli_override(Some(&path))
        .ok()
        .and_then(|c| c.editor);
    edit_file(editor.as_deref(), &path)?;

    validate(&path, output);
    if created {
        output.success(&format!("Created configuration at {}", path.display()));
    } else {
        output.success(&format!("Updated configuration at {}", path.display()));
    }
    Ok(())
}

fn validate(path: &Path, output: &Output) {
    if let Err(e) = Config::load_with_cli_override(Some(&path.to_path_buf())) {
        output.warn(&format!("Configuration is not valid: {:#}", e));
    }
}

/// Print the config file location
pub fn path(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let path = effective_path(config_path);
    match output.format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "config_file": path })),
        _ => println!("{}", path.display()),
    }
    Ok(())
}

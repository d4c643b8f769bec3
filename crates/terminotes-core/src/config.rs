//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/terminotes/config.toml)
//! 3. Environment variables (TERMINOTES_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::storage::DB_FILENAME;
use crate::sync::SyncSettings;

/// Environment variable prefix
const ENV_PREFIX: &str = "TERMINOTES";

/// Contents written by `Config::bootstrap_file` on first run
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Terminotes configuration

# Directory holding the notes database. It doubles as the git working copy.
# terminotes_dir = "~/.local/share/terminotes"

# Remote the notes repository is synchronized with. Leave unset for
# local-only mode: notes are still committed locally but never pushed.
# git_remote_url = "git@github.com:example/terminotes-notes.git"

# "git" (default) records every change in the notes repository,
# "none" disables version control entirely.
sync_backend = "git"

# Tags accepted on notes. An empty list accepts any tag.
allowed_tags = []

# editor = "vim"
"#;

/// Which sync provider backs the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncBackend {
    /// Commit locally and synchronize with a git remote
    #[default]
    Git,
    /// No version control at all
    None,
}

impl fmt::Display for SyncBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncBackend::Git => write!(f, "git"),
            SyncBackend::None => write!(f, "none"),
        }
    }
}

impl FromStr for SyncBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "git" => Ok(SyncBackend::Git),
            "none" | "off" => Ok(SyncBackend::None),
            other => bail!("Unknown sync backend '{}'. Use 'git' or 'none'.", other),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the notes database and the git working copy
    #[serde(default = "default_terminotes_dir")]
    pub terminotes_dir: PathBuf,

    /// Git remote the notes repository syncs with (optional)
    #[serde(default)]
    pub git_remote_url: Option<String>,

    /// Sync provider selection
    #[serde(default)]
    pub sync_backend: SyncBackend,

    /// Editor command used by `tn new` and `tn edit`
    #[serde(default)]
    pub editor: Option<String>,

    /// Tags accepted on notes; empty accepts everything
    #[serde(default)]
    pub allowed_tags: Vec<String>,

    /// Log file path (logs go to stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Default log level (overridden by TN_LOG)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            terminotes_dir: default_terminotes_dir(),
            git_remote_url: None,
            sync_backend: SyncBackend::Git,
            editor: None,
            allowed_tags: Vec::new(),
            log_file: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (TERMINOTES_DIR, TERMINOTES_GIT_REMOTE_URL, ...)
    /// 2. Config file (~/.config/terminotes/config.toml or TERMINOTES_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.expand_home();
        config.ensure_terminotes_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        config.expand_home();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var(format!("{}_DIR", ENV_PREFIX)) {
            self.terminotes_dir = PathBuf::from(val);
        }

        // An empty value switches to local-only mode
        if let Ok(val) = std::env::var(format!("{}_GIT_REMOTE_URL", ENV_PREFIX)) {
            self.git_remote_url = if val.trim().is_empty() {
                None
            } else {
                Some(val)
            };
        }

        if let Ok(val) = std::env::var(format!("{}_SYNC_BACKEND", ENV_PREFIX)) {
            self.sync_backend = val.parse()?;
        }

        if let Ok(val) = std::env::var(format!("{}_EDITOR", ENV_PREFIX)) {
            self.editor = if val.is_empty() { None } else { Some(val) };
        }

        Ok(())
    }

    /// Expand a leading `~/` in the notes directory
    fn expand_home(&mut self) {
        let Ok(rest) = self.terminotes_dir.strip_prefix("~") else {
            return;
        };
        if let Some(home) = dirs::home_dir() {
            self.terminotes_dir = home.join(rest);
        }
    }

    /// Ensure the notes directory exists
    fn ensure_terminotes_dir(&self) -> Result<()> {
        if !self.terminotes_dir.exists() {
            std::fs::create_dir_all(&self.terminotes_dir).with_context(|| {
                format!(
                    "Failed to create notes directory: {:?}",
                    self.terminotes_dir
                )
            })?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Write the commented default config file if none exists
    ///
    /// Returns true when a new file was created.
    pub fn bootstrap_file(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(true)
    }

    /// Get the config file path
    ///
    /// Can be overridden with TERMINOTES_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("terminotes")
            .join("config.toml")
    }

    /// Get the path to the notes database (the tracked file)
    pub fn database_path(&self) -> PathBuf {
        self.terminotes_dir.join(DB_FILENAME)
    }

    /// Build the immutable settings handed to the sync engine
    pub fn sync_settings(&self, interactive: bool) -> SyncSettings {
        SyncSettings {
            work_dir: self.terminotes_dir.clone(),
            remote_url: self.git_remote_url.clone(),
            tracked_file: PathBuf::from(DB_FILENAME),
            interactive,
        }
    }
}

/// Get the default notes directory
fn default_terminotes_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("terminotes")
}

fn default_log_level() -> String {
    "warn".to_string()
}

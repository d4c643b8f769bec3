//! Terminotes Core Library
//!
//! This crate provides the core functionality for Terminotes, a terminal
//! note-taking tool that keeps every note in one SQLite file versioned by git.
//!
//! # Architecture
//!
//! - **SQLite**: single database file holding notes and tags
//! - **Git**: the database file is committed after every change and
//!   synchronized explicitly with `tn sync`
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let provider = sync_provider_for(&config, false, Box::new(NoPrompt));
//! let mut store = Store::open(&config, provider)?;
//!
//! store.create_log_entry("Shipped the release #work", &[], None)?;
//! let report = store.sync(false)?;
//! ```
//!
//! # Modules
//!
//! - `store`: Unified storage interface (main entry point)
//! - `models`: Notes and drafts
//! - `frontmatter`: Editor documents with YAML metadata
//! - `tags`: Allow-list validation and hashtag extraction
//! - `storage`: SQLite database
//! - `sync`: Git commits, divergence detection and resolution
//! - `config`: Application configuration

pub mod config;
pub mod frontmatter;
pub mod models;
pub mod storage;
pub mod store;
pub mod sync;
pub mod tags;

pub use config::{Config, SyncBackend};
pub use models::{Note, NoteDraft, NoteKind};
pub use storage::{NoteDatabase, StorageError};
pub use store::{sync_provider_for, SavedNote, Store};
pub use sync::{
    Divergence, Resolution, ResolutionPrompt, SyncError, SyncOutcome, SyncReport, EXIT_FAILED,
};

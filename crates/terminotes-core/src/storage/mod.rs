//! Storage layer
//!
//! A single SQLite file holds every note. The file lives at the root of the
//! notes directory, which doubles as the git working copy the sync engine
//! versions.

pub mod database;
pub mod error;
pub mod schema;

pub use database::NoteDatabase;
pub use error::{StorageError, StorageResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};

/// Name of the database file inside the notes directory
pub const DB_FILENAME: &str = "terminotes.sqlite3";

//! Command handlers, one module per command group

pub mod config;
pub mod info;
pub mod list;
pub mod note;
pub mod sync;
pub mod tag;

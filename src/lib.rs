//! Support helpers for the framework core.
//!
//! The crate groups three small facilities behind one explicit `Config`:
//! namespace resolution and component construction (`resolver`), recursive
//! file-tree operations (`tree`), and zip archive handling (`archive`).
//! Helpers report failure through `false`/`None` rather than errors; the
//! exceptions are config loading and extracting from an unreadable archive.

pub mod archive;
pub mod config;
pub mod error;
pub mod resolver;
pub mod tree;

pub use archive::{Selector, ZipStatus};
pub use config::{ArchiveSettings, Config, Namespaces, TreeSettings, load_config_from_path};
pub use error::{Error, Result};
pub use resolver::{
    Capability, Component, Identifier, Kind, NameResolver, Scope, TypeRegistry, capitalize,
};
pub use tree::{EntryOutcome, FileTree, TreeAction, TreeReport};

/// Split comma- or whitespace-delimited lists into tokens.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .replace(',', " ")
        .split_whitespace()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

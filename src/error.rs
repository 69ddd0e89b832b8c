//! Error type for the few operations that fail loudly.
//!
//! Most helpers in this crate convert filesystem and archive failures into
//! `false`/`None`. The variants here cover what callers must not ignore: an
//! archive that cannot be opened for extraction, and names that do not map to
//! a known identifier kind.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The file could not be opened as a zip archive.
    #[error("Zip file not valid: {} ({reason})", path.display())]
    InvalidArchive { path: PathBuf, reason: String },

    #[error("Unknown identifier kind: {0}")]
    UnknownKind(String),
}

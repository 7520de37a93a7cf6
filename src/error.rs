use std::io;
use std::path::PathBuf;

/// Every failure an archive operation can report.
///
/// All entry-level and container-level errors abort the whole operation.
/// The only failure handled locally is permission restoration during
/// extraction, which is logged instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration is incomplete: {0}")]
    Configuration(&'static str),

    #[error("source does not exist: '{path}'")]
    SourceNotFound { path: PathBuf },

    #[error("destination already exists: '{path}'")]
    DestinationExists { path: PathBuf },

    #[error("cannot open archive '{path}': {reason}")]
    ContainerOpen { path: PathBuf, reason: String },

    #[error("cannot open entry '{name}': {reason}")]
    EntryOpen { name: String, reason: String },

    #[error("cannot read entry metadata: {0}")]
    EntryMetadata(String),

    #[error("entry has an empty name")]
    EmptyName,

    #[error("entry not found: '{name}'")]
    EntryNotFound { name: String },

    #[error("wrong password for entry '{name}': {reason}")]
    Password { name: String, reason: String },

    #[error("entry '{name}' wrote {written} bytes, expected {expected}")]
    Integrity {
        name: String,
        expected: u64,
        written: u64,
    },

    #[error("CRC-32 mismatch in entry '{name}': expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("entry '{name}' is corrupted: {source}")]
    Corrupted { name: String, source: io::Error },

    #[error("cannot open source file '{path}': {source}")]
    SourceOpen { path: PathBuf, source: io::Error },

    #[error("entry '{name}' escapes the destination directory")]
    PathTraversal { name: String },

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether the error means the supplied password was rejected.
    pub fn is_password(&self) -> bool {
        matches!(self, Error::Password { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

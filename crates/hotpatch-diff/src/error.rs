//! Error types for the diff crate.

use std::io;
use std::path::PathBuf;

use hotpatch_types::ErrorKind;

/// Errors that can occur during diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A code container could not be decoded.
    #[error("malformed code container {container}: {reason}")]
    MalformedContainer { container: String, reason: String },

    /// A code container could not be encoded.
    #[error("failed to encode code container {container}: {reason}")]
    Encode { container: String, reason: String },

    /// A tree root exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Reading a file or directory failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DiffError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Taxonomy kind for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedContainer { .. } => ErrorKind::CodeUnitParseFailed,
            Self::Encode { .. } => ErrorKind::CompareFailed,
            Self::NotADirectory(_) => ErrorKind::CompareFailed,
            Self::Io { source, .. } => ErrorKind::from_io(source, ErrorKind::FileReadFailed),
        }
    }
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;

use std::path::PathBuf;

use hotpatch_crypto::SignatureError;
use hotpatch_delta::EngineError;
use hotpatch_diff::DiffError;
use hotpatch_pack::PackError;
use hotpatch_types::ErrorKind;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ParseError
// ---------------------------------------------------------------------------

/// Failures while turning an input package into a [`crate::ParsedPackage`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("package not found: {0}")]
    NotFound(PathBuf),

    #[error("{path} is not a package archive: {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("cannot read archive {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("invalid package metadata in {path}: {reason}")]
    Metadata { path: PathBuf, reason: String },

    #[error("unsafe entry path in {path}: {entry}")]
    UnsafeEntry { path: PathBuf, entry: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ParseError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::FileNotFound,
            Self::InvalidFormat { .. } => ErrorKind::InvalidInputFormat,
            Self::Archive { .. } | Self::UnsafeEntry { .. } => ErrorKind::ContainerParseFailed,
            Self::Metadata { .. } => ErrorKind::MetadataParseFailed,
            Self::Io { source, .. } => ErrorKind::from_io(source, ErrorKind::FileReadFailed),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

// ---------------------------------------------------------------------------
// SignError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SignError {
    #[error("cannot load signing key {path}: {reason}")]
    KeyUnreadable { path: PathBuf, reason: String },

    #[error("invalid signing key: {0}")]
    InvalidKey(#[from] SignatureError),

    #[error("patch is already signed")]
    AlreadySigned,

    #[error("signature entry missing")]
    Unsigned,

    #[error("signature does not match patch contents")]
    Mismatch,

    #[error("malformed signature entry: {0}")]
    MalformedSignature(String),

    #[error("signing failed: {0}")]
    Container(#[from] PackError),

    #[error("signing failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("signing failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SignError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyUnreadable { .. } | Self::InvalidKey(_) => ErrorKind::SigningKeyInvalid,
            _ => ErrorKind::SigningFailed,
        }
    }
}

// ---------------------------------------------------------------------------
// GenerateError
// ---------------------------------------------------------------------------

/// Any failure of a generation run, tagged by the stage that raised it.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("a generation is already running on this instance")]
    AlreadyRunning,

    #[error("generation cancelled")]
    Cancelled,

    #[error("no tokio runtime to spawn on: {0}")]
    NoRuntime(String),

    #[error("generation timed out after {0}s")]
    Timeout(u64),

    #[error("version mismatch: base is {base}, new is {new}")]
    VersionMismatch { base: String, new: String },

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("diff failed: {0}")]
    Diff(#[from] DiffError),

    #[error("pack failed: {0}")]
    Pack(#[from] PackError),

    #[error("byte diff failed: {0}")]
    Engine(#[from] EngineError),

    #[error("sign failed: {0}")]
    Sign(#[from] SignError),

    /// Byte diff that did not reproduce its target when applied.
    #[error("byte diff for {0} does not reproduce the new container")]
    DeltaMismatch(String),

    #[error("{stage} I/O error at {path}: {source}")]
    Io {
        stage: ErrorKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GenerateError {
    pub(crate) fn io(stage: ErrorKind, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            stage,
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) | Self::NoRuntime(_) => ErrorKind::Unknown,
            Self::InputNotFound(_) => ErrorKind::FileNotFound,
            Self::AlreadyRunning => ErrorKind::AlreadyRunning,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::VersionMismatch { .. } => ErrorKind::VersionMismatch,
            Self::Parse(e) => e.kind(),
            Self::Diff(e) => e.kind(),
            Self::Pack(e) => e.kind(),
            Self::Engine(e) => e.kind(),
            Self::Sign(e) => e.kind(),
            Self::DeltaMismatch(_) => ErrorKind::BytePatchFailed,
            Self::Io { stage, source, .. } => ErrorKind::from_io(source, *stage),
        }
    }
}

pub type GenerateResult<T> = Result<T, GenerateError>;

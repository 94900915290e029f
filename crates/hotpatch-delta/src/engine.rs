use std::fmt;
use std::path::Path;

use hotpatch_crypto::ContainerDigests;

use crate::error::{EngineError, EngineResult};

/// Progress callback: `(processed, total)` in bytes.
pub type Progress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Operation an engine failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineOp {
    Diff,
    Apply,
    Hash,
}

impl fmt::Display for EngineOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diff => write!(f, "diff"),
            Self::Apply => write!(f, "apply"),
            Self::Hash => write!(f, "hash"),
        }
    }
}

/// Numeric failure codes shared by every engine, including ones behind a
/// foreign-function boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineErrorCode {
    Success,
    FileNotFound,
    FileRead,
    FileWrite,
    OutOfMemory,
    InvalidParam,
    Cancelled,
    CorruptPatch,
    CompressFailed,
    DecompressFailed,
    HashFailed,
    SizeMismatch,
    ChecksumMismatch,
    Internal,
}

impl EngineErrorCode {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::FileNotFound => -1,
            Self::FileRead => -2,
            Self::FileWrite => -3,
            Self::OutOfMemory => -4,
            Self::InvalidParam => -5,
            Self::Cancelled => -6,
            Self::CorruptPatch => -7,
            Self::CompressFailed => -8,
            Self::DecompressFailed => -9,
            Self::HashFailed => -10,
            Self::SizeMismatch => -11,
            Self::ChecksumMismatch => -12,
            Self::Internal => -99,
        }
    }

    /// Unknown codes map to `Internal`.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Success,
            -1 => Self::FileNotFound,
            -2 => Self::FileRead,
            -3 => Self::FileWrite,
            -4 => Self::OutOfMemory,
            -5 => Self::InvalidParam,
            -6 => Self::Cancelled,
            -7 => Self::CorruptPatch,
            -8 => Self::CompressFailed,
            -9 => Self::DecompressFailed,
            -10 => Self::HashFailed,
            -11 => Self::SizeMismatch,
            -12 => Self::ChecksumMismatch,
            _ => Self::Internal,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::FileNotFound => "file not found",
            Self::FileRead => "file read error",
            Self::FileWrite => "file write error",
            Self::OutOfMemory => "out of memory",
            Self::InvalidParam => "invalid parameter",
            Self::Cancelled => "operation cancelled",
            Self::CorruptPatch => "corrupt patch",
            Self::CompressFailed => "compression failed",
            Self::DecompressFailed => "decompression failed",
            Self::HashFailed => "hash calculation failed",
            Self::SizeMismatch => "size mismatch",
            Self::ChecksumMismatch => "checksum mismatch",
            Self::Internal => "internal error",
        }
    }

    pub(crate) fn from_io(err: &std::io::Error, fallback: Self) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound,
            std::io::ErrorKind::OutOfMemory => Self::OutOfMemory,
            _ => fallback,
        }
    }
}

impl fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

/// Narrow contract every byte-diff engine implements.
///
/// `apply(old, diff(old, new))` must return `new` byte for byte. `cancel`
/// is cooperative: a running operation notices it at its next checkpoint
/// and fails with [`EngineErrorCode::Cancelled`]; `reset` clears it.
pub trait ByteDiffEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn diff(&self, old: &[u8], new: &[u8], progress: Progress<'_>) -> EngineResult<Vec<u8>>;

    fn apply(&self, old: &[u8], patch: &[u8], progress: Progress<'_>) -> EngineResult<Vec<u8>>;

    /// MD5 and SHA-256 of a file on disk.
    fn hash(&self, path: &Path) -> EngineResult<ContainerDigests> {
        ContainerDigests::compute_file(path).map_err(|e| {
            let code = EngineErrorCode::from_io(&e, EngineErrorCode::HashFailed);
            EngineError::failed(EngineOp::Hash, code, format!("{}: {e}", path.display()))
        })
    }

    fn cancel(&self);

    fn reset(&self);

    fn error_to_string(&self, code: i32) -> String {
        EngineErrorCode::from_code(code).description().to_string()
    }
}

/// Progress callback that ignores every report.
pub fn no_progress(_processed: u64, _total: u64) {}

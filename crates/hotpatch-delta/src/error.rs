use hotpatch_types::ErrorKind;
use thiserror::Error;

use crate::engine::{EngineErrorCode, EngineOp};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("byte-diff engine unavailable: {0}")]
    Unavailable(String),

    #[error("{op} failed with engine code {code}: {message}")]
    Failed {
        op: EngineOp,
        code: EngineErrorCode,
        message: String,
    },
}

impl EngineError {
    pub fn failed(op: EngineOp, code: EngineErrorCode, message: impl Into<String>) -> Self {
        Self::Failed {
            op,
            code,
            message: message.into(),
        }
    }

    /// Engine code carried by this error, `Internal` for unavailability.
    pub fn code(&self) -> EngineErrorCode {
        match self {
            Self::Unavailable(_) => EngineErrorCode::Internal,
            Self::Failed { code, .. } => *code,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.code() == EngineErrorCode::Cancelled
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::ByteDiffEngineUnavailable,
            Self::Failed { code, op, .. } => match (code, op) {
                (EngineErrorCode::Cancelled, _) => ErrorKind::Cancelled,
                (EngineErrorCode::FileNotFound, _) => ErrorKind::FileNotFound,
                (_, EngineOp::Apply) => ErrorKind::BytePatchFailed,
                _ => ErrorKind::ByteDiffFailed,
            },
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_mapping() {
        let apply = EngineError::failed(EngineOp::Apply, EngineErrorCode::ChecksumMismatch, "crc");
        assert_eq!(apply.kind(), ErrorKind::BytePatchFailed);

        let diff = EngineError::failed(EngineOp::Diff, EngineErrorCode::CompressFailed, "zstd");
        assert_eq!(diff.kind(), ErrorKind::ByteDiffFailed);

        let cancelled = EngineError::failed(EngineOp::Diff, EngineErrorCode::Cancelled, "stop");
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.kind(), ErrorKind::Cancelled);

        assert_eq!(
            EngineError::Unavailable("native".into()).kind(),
            ErrorKind::ByteDiffEngineUnavailable
        );
    }

    #[test]
    fn display_includes_op_and_code() {
        let err = EngineError::failed(EngineOp::Apply, EngineErrorCode::SizeMismatch, "got 3 bytes");
        assert_eq!(
            err.to_string(),
            "apply failed with engine code -11 (size mismatch): got 3 bytes"
        );
    }
}

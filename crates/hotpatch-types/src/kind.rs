use std::fmt;

use serde::{Deserialize, Serialize};

/// Failure taxonomy shared by every generation stage.
///
/// Each kind carries a stable numeric code grouped by category (1xxx file
/// system, 2xxx input parsing, 3xxx comparison, 4xxx signing, 5xxx byte-diff
/// engine, 6xxx run control). `NoChanges` is a terminal outcome, not a
/// failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FileNotFound,
    FileReadFailed,
    FileWriteFailed,
    InsufficientSpace,
    PermissionDenied,
    InvalidInputFormat,
    ContainerParseFailed,
    CodeUnitParseFailed,
    MetadataParseFailed,
    VersionMismatch,
    CompareFailed,
    NoChanges,
    SigningKeyInvalid,
    SigningFailed,
    ByteDiffEngineUnavailable,
    ByteDiffFailed,
    BytePatchFailed,
    Cancelled,
    Timeout,
    /// A second run was started while one is still in flight.
    AlreadyRunning,
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 21] = [
        Self::FileNotFound,
        Self::FileReadFailed,
        Self::FileWriteFailed,
        Self::InsufficientSpace,
        Self::PermissionDenied,
        Self::InvalidInputFormat,
        Self::ContainerParseFailed,
        Self::CodeUnitParseFailed,
        Self::MetadataParseFailed,
        Self::VersionMismatch,
        Self::CompareFailed,
        Self::NoChanges,
        Self::SigningKeyInvalid,
        Self::SigningFailed,
        Self::ByteDiffEngineUnavailable,
        Self::ByteDiffFailed,
        Self::BytePatchFailed,
        Self::Cancelled,
        Self::Timeout,
        Self::AlreadyRunning,
        Self::Unknown,
    ];

    /// Stable numeric code reported to library callers.
    pub fn code(self) -> u16 {
        match self {
            Self::FileNotFound => 1001,
            Self::FileReadFailed => 1002,
            Self::FileWriteFailed => 1003,
            Self::InsufficientSpace => 1004,
            Self::PermissionDenied => 1005,
            Self::InvalidInputFormat => 2001,
            Self::ContainerParseFailed => 2002,
            Self::CodeUnitParseFailed => 2003,
            Self::MetadataParseFailed => 2004,
            Self::VersionMismatch => 3001,
            Self::CompareFailed => 3002,
            Self::NoChanges => 3003,
            Self::SigningKeyInvalid => 4001,
            Self::SigningFailed => 4002,
            Self::ByteDiffEngineUnavailable => 5001,
            Self::ByteDiffFailed => 5003,
            Self::BytePatchFailed => 5004,
            Self::Cancelled => 6001,
            Self::Timeout => 6002,
            Self::AlreadyRunning => 6003,
            Self::Unknown => 6999,
        }
    }

    /// Look up a kind by its numeric code.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::FileNotFound => "file not found",
            Self::FileReadFailed => "failed to read file",
            Self::FileWriteFailed => "failed to write file",
            Self::InsufficientSpace => "insufficient storage space",
            Self::PermissionDenied => "permission denied",
            Self::InvalidInputFormat => "invalid input package format",
            Self::ContainerParseFailed => "failed to parse input package",
            Self::CodeUnitParseFailed => "failed to parse code container",
            Self::MetadataParseFailed => "failed to parse package metadata",
            Self::VersionMismatch => "input packages do not match",
            Self::CompareFailed => "comparison failed",
            Self::NoChanges => "no changes detected",
            Self::SigningKeyInvalid => "signing key is invalid",
            Self::SigningFailed => "signing failed",
            Self::ByteDiffEngineUnavailable => "byte-diff engine unavailable",
            Self::ByteDiffFailed => "byte diff failed",
            Self::BytePatchFailed => "byte patch failed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timed out",
            Self::AlreadyRunning => "a generation is already running",
            Self::Unknown => "unknown error",
        }
    }

    /// Process exit status for command-line callers. Zero only for `NoChanges`.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::NoChanges => 0,
            Self::Unknown => 1,
            Self::FileNotFound => 2,
            Self::FileReadFailed => 3,
            Self::FileWriteFailed => 4,
            Self::InsufficientSpace => 5,
            Self::PermissionDenied => 6,
            Self::InvalidInputFormat => 10,
            Self::ContainerParseFailed => 11,
            Self::CodeUnitParseFailed => 12,
            Self::MetadataParseFailed => 13,
            Self::VersionMismatch => 20,
            Self::CompareFailed => 21,
            Self::SigningKeyInvalid => 30,
            Self::SigningFailed => 31,
            Self::ByteDiffEngineUnavailable => 40,
            Self::ByteDiffFailed => 41,
            Self::BytePatchFailed => 42,
            Self::Cancelled => 50,
            Self::Timeout => 51,
            Self::AlreadyRunning => 52,
        }
    }

    /// Classify an I/O failure, falling back to `stage_default` for errors
    /// that carry no more specific meaning.
    pub fn from_io(err: &std::io::Error, stage_default: ErrorKind) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            // ENOSPC
            _ if err.raw_os_error() == Some(28) => Self::InsufficientSpace,
            _ => stage_default,
        }
    }

    /// Returns `true` for every kind except `NoChanges`.
    pub fn is_failure(self) -> bool {
        self != Self::NoChanges
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn codes_are_unique() {
        let codes: HashSet<u16> = ErrorKind::ALL.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn codes_are_grouped_by_category() {
        assert_eq!(ErrorKind::FileNotFound.code() / 1000, 1);
        assert_eq!(ErrorKind::CodeUnitParseFailed.code() / 1000, 2);
        assert_eq!(ErrorKind::CompareFailed.code() / 1000, 3);
        assert_eq!(ErrorKind::SigningFailed.code() / 1000, 4);
        assert_eq!(ErrorKind::BytePatchFailed.code() / 1000, 5);
        assert_eq!(ErrorKind::Cancelled.code() / 1000, 6);
    }

    #[test]
    fn from_code_roundtrip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code(42), None);
    }

    #[test]
    fn only_no_changes_exits_zero() {
        for kind in ErrorKind::ALL {
            assert_eq!(kind.exit_code() == 0, !kind.is_failure(), "{kind:?}");
        }
    }

    #[test]
    fn io_errors_are_classified() {
        use std::io;
        let not_found = io::Error::new(io::ErrorKind::NotFound, "gone");
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let full = io::Error::from_raw_os_error(28);
        let other = io::Error::new(io::ErrorKind::Other, "boom");
        let fallback = ErrorKind::FileWriteFailed;
        assert_eq!(ErrorKind::from_io(&not_found, fallback), ErrorKind::FileNotFound);
        assert_eq!(ErrorKind::from_io(&denied, fallback), ErrorKind::PermissionDenied);
        assert_eq!(ErrorKind::from_io(&full, fallback), ErrorKind::InsufficientSpace);
        assert_eq!(ErrorKind::from_io(&other, fallback), fallback);
    }

    #[test]
    fn display_includes_code() {
        assert_eq!(ErrorKind::Timeout.to_string(), "timed out (6002)");
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ByteDiffEngineUnavailable).unwrap();
        assert_eq!(json, "\"byte_diff_engine_unavailable\"");
    }
}

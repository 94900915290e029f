use std::path::PathBuf;
use std::time::Duration;

use hotpatch_pack::PatchManifest;
use hotpatch_types::{ChangeSummary, ErrorKind};
use serde::Serialize;

use crate::error::GenerateError;

/// Terminal outcome of one generation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A patch was written.
    Completed,
    /// Both inputs are equivalent; no patch was written.
    NoChanges,
    Failed { kind: ErrorKind, message: String },
    Cancelled,
}

/// What a caller gets back from every run, successful or not.
#[derive(Clone, Debug, Serialize)]
pub struct GenerationResult {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub patch_path: Option<PathBuf>,
    pub manifest: Option<PatchManifest>,
    pub summary: ChangeSummary,
    pub elapsed: Duration,
    pub base_size: u64,
    pub new_size: u64,
    pub patch_size: u64,
    /// `patch_size / new_size`, zero when no patch was written.
    pub compression_ratio: f64,
    pub signed: bool,
}

impl GenerationResult {
    pub(crate) fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            patch_path: None,
            manifest: None,
            summary: ChangeSummary::default(),
            elapsed: Duration::ZERO,
            base_size: 0,
            new_size: 0,
            patch_size: 0,
            compression_ratio: 0.0,
            signed: false,
        }
    }

    pub(crate) fn from_error(err: &GenerateError) -> Self {
        match err.kind() {
            ErrorKind::Cancelled => Self::new(Outcome::Cancelled),
            kind => Self::new(Outcome::Failed {
                kind,
                message: err.to_string(),
            }),
        }
    }

    /// Completed or no changes.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Completed | Outcome::NoChanges)
    }

    pub fn has_changes(&self) -> bool {
        self.summary.has_changes()
    }

    /// Taxonomy kind for anything other than a written patch.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            Outcome::Completed => None,
            Outcome::NoChanges => Some(ErrorKind::NoChanges),
            Outcome::Failed { kind, .. } => Some(*kind),
            Outcome::Cancelled => Some(ErrorKind::Cancelled),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.error_kind().map_or(0, ErrorKind::exit_code)
    }
}

pub(crate) fn compression_ratio(patch_size: u64, new_size: u64) -> f64 {
    if new_size == 0 {
        0.0
    } else {
        patch_size as f64 / new_size as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_map_to_exit_codes() {
        let done = GenerationResult::new(Outcome::Completed);
        assert!(done.is_success());
        assert_eq!(done.exit_code(), 0);
        assert_eq!(done.error_kind(), None);

        let same = GenerationResult::new(Outcome::NoChanges);
        assert!(same.is_success());
        assert_eq!(same.exit_code(), 0);
        assert_eq!(same.error_kind(), Some(ErrorKind::NoChanges));

        let cancelled = GenerationResult::from_error(&GenerateError::Cancelled);
        assert_eq!(cancelled.outcome, Outcome::Cancelled);
        assert!(!cancelled.is_success());
        assert_eq!(cancelled.exit_code(), ErrorKind::Cancelled.exit_code());
    }

    #[test]
    fn failure_carries_kind_and_message() {
        let result = GenerationResult::from_error(&GenerateError::Timeout(3));
        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
        assert_eq!(result.message(), Some("generation timed out after 3s"));
        assert_ne!(result.exit_code(), 0);
    }

    #[test]
    fn ratio_handles_empty_target() {
        assert_eq!(compression_ratio(10, 0), 0.0);
        assert!((compression_ratio(25, 100) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn serializes_outcome_inline() {
        let result = GenerationResult::new(Outcome::NoChanges);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "no_changes");
        assert_eq!(json["signed"], false);
    }
}

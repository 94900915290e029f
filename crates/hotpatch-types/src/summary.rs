use std::fmt;

use serde::{Deserialize, Serialize};

/// Aggregated change counts across code containers, resources, and assets.
///
/// Built once per run by the orchestrator and read-only afterwards.
/// `changes` holds one human-readable descriptor per change, prefixed with
/// its domain (`dex:`, `res:`, `assets:`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub code_modified: usize,
    pub code_added: usize,
    pub code_deleted: usize,
    pub resources_modified: usize,
    pub resources_added: usize,
    pub resources_deleted: usize,
    pub assets_modified: usize,
    pub assets_added: usize,
    pub assets_deleted: usize,
    pub changes: Vec<String>,
}

impl ChangeSummary {
    pub fn code_total(&self) -> usize {
        self.code_modified + self.code_added + self.code_deleted
    }

    pub fn resources_total(&self) -> usize {
        self.resources_modified + self.resources_added + self.resources_deleted
    }

    pub fn assets_total(&self) -> usize {
        self.assets_modified + self.assets_added + self.assets_deleted
    }

    pub fn total(&self) -> usize {
        self.code_total() + self.resources_total() + self.assets_total()
    }

    /// Returns `true` if any domain recorded at least one change.
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "code: {}~ {}+ {}-, resources: {}~ {}+ {}-, assets: {}~ {}+ {}-",
            self.code_modified,
            self.code_added,
            self.code_deleted,
            self.resources_modified,
            self.resources_added,
            self.resources_deleted,
            self.assets_modified,
            self.assets_added,
            self.assets_deleted,
        )
    }
}

//! File-tree diff: compare two directories by content hash.
//!
//! Paths are relative to the tree root with `/` separators. A root that does
//! not exist is an empty tree, so a missing side turns every entry on the
//! other side into an addition or a deletion.

use std::collections::BTreeMap;
use std::path::Path;

use hotpatch_crypto::ContentHasher;
use hotpatch_types::ContentId;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{DiffError, DiffResult};

/// One regular file in a tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub hash: ContentId,
    pub size: u64,
}

/// The result of comparing two trees.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeDiff {
    pub changes: Vec<TreeChange>,
}

/// A single change between two trees.
#[derive(Clone, Debug, PartialEq)]
pub enum TreeChange {
    Added(FileEntry),
    Deleted(FileEntry),
    /// Same path, different content hash.
    Modified { old: FileEntry, new: FileEntry },
}

impl TreeChange {
    pub fn path(&self) -> &str {
        match self {
            Self::Added(entry) | Self::Deleted(entry) => &entry.path,
            Self::Modified { new, .. } => &new.path,
        }
    }
}

impl TreeDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn has_changes(&self) -> bool {
        !self.is_empty()
    }

    pub fn added(&self) -> impl Iterator<Item = &FileEntry> {
        self.changes.iter().filter_map(|c| match c {
            TreeChange::Added(entry) => Some(entry),
            _ => None,
        })
    }

    pub fn deleted(&self) -> impl Iterator<Item = &FileEntry> {
        self.changes.iter().filter_map(|c| match c {
            TreeChange::Deleted(entry) => Some(entry),
            _ => None,
        })
    }

    /// New-side entries of modified files.
    pub fn modified(&self) -> impl Iterator<Item = &FileEntry> {
        self.changes.iter().filter_map(|c| match c {
            TreeChange::Modified { new, .. } => Some(new),
            _ => None,
        })
    }

    /// Paths whose new content must be shipped (added or modified).
    pub fn paths_to_ship(&self) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| !matches!(c, TreeChange::Deleted(_)))
            .map(TreeChange::path)
            .collect()
    }
}

/// Enumerate every regular file under `root`, keyed by relative path.
///
/// A nonexistent root yields an empty map.
pub fn scan_tree(root: &Path) -> DiffResult<BTreeMap<String, FileEntry>> {
    let mut entries = BTreeMap::new();
    if !root.exists() {
        return Ok(entries);
    }
    if !root.is_dir() {
        return Err(DiffError::NotADirectory(root.to_path_buf()));
    }

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            DiffError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| DiffError::io(entry.path(), std::io::Error::other(e)))?;
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let (hash, size) = ContentHasher::FILE
            .hash_file(entry.path())
            .map_err(|e| DiffError::io(entry.path(), e))?;
        entries.insert(path.clone(), FileEntry { path, hash, size });
    }
    Ok(entries)
}

/// Compare two path-keyed entry maps.
pub fn diff_entries(
    old: &BTreeMap<String, FileEntry>,
    new: &BTreeMap<String, FileEntry>,
) -> TreeDiff {
    let mut changes = Vec::new();

    for (path, old_entry) in old {
        match new.get(path) {
            Some(new_entry) if new_entry.hash != old_entry.hash => {
                changes.push(TreeChange::Modified {
                    old: old_entry.clone(),
                    new: new_entry.clone(),
                });
            }
            Some(_) => {}
            None => changes.push(TreeChange::Deleted(old_entry.clone())),
        }
    }
    for (path, new_entry) in new {
        if !old.contains_key(path) {
            changes.push(TreeChange::Added(new_entry.clone()));
        }
    }

    TreeDiff { changes }
}

/// Scan and compare two directories. Either may be absent.
pub fn diff_directories(base: &Path, new: &Path) -> DiffResult<TreeDiff> {
    let old_entries = scan_tree(base)?;
    let new_entries = scan_tree(new)?;
    let diff = diff_entries(&old_entries, &new_entries);
    debug!(
        base = %base.display(),
        new = %new.display(),
        base_files = old_entries.len(),
        new_files = new_entries.len(),
        changes = diff.len(),
        "compared file trees"
    );
    Ok(diff)
}

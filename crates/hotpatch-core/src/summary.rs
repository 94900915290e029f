use hotpatch_diff::{ClassDiff, TreeChange, TreeDiff, WHOLE_CONTAINER};
use hotpatch_pack::{ChangeList, DomainChanges, ASSETS_PREFIX, RESOURCES_PREFIX, RESOURCE_TABLE_ENTRY};
use hotpatch_types::ChangeSummary;

/// Everything the diffing stage found, before anything is packed.
#[derive(Clone, Debug, Default)]
pub struct DiffReport {
    /// One entry per container present on either side, in name order.
    pub code: Vec<ClassDiff>,
    pub resources: TreeDiff,
    /// Change of the binary resource table; its path is the table name.
    pub resource_table: Option<TreeChange>,
    pub assets: TreeDiff,
}

impl DiffReport {
    pub fn has_changes(&self) -> bool {
        self.code.iter().any(ClassDiff::has_changes)
            || self.resources.has_changes()
            || self.resource_table.is_some()
            || self.assets.has_changes()
    }

    /// The table ships when any resource changed and the new side has one.
    pub fn ships_resource_table(&self) -> bool {
        let table_deleted = matches!(self.resource_table, Some(TreeChange::Deleted(_)));
        !table_deleted && (self.resources.has_changes() || self.resource_table.is_some())
    }

    /// Counts plus one `domain:change:name` descriptor per change.
    ///
    /// A whole-container add or delete counts once and is described by the
    /// container name.
    pub fn summary(&self) -> ChangeSummary {
        let mut summary = ChangeSummary::default();

        for diff in &self.code {
            if diff.is_whole_added() {
                summary.code_added += 1;
                summary.changes.push(format!("dex:added:{}", diff.container));
                continue;
            }
            if diff.is_whole_deleted() {
                summary.code_deleted += 1;
                summary.changes.push(format!("dex:deleted:{}", diff.container));
                continue;
            }
            summary.code_modified += diff.modified.len();
            summary.code_added += diff.added.len();
            summary.code_deleted += diff.deleted.len();
            for (label, ids) in [
                ("modified", &diff.modified),
                ("added", &diff.added),
                ("deleted", &diff.deleted),
            ] {
                summary
                    .changes
                    .extend(ids.iter().map(|id| format!("dex:{label}:{id}")));
            }
        }

        let resources = self.resources.changes.iter().chain(self.resource_table.as_ref());
        let (m, a, d) = count_tree("res", resources, &mut summary.changes);
        summary.resources_modified = m;
        summary.resources_added = a;
        summary.resources_deleted = d;

        let (m, a, d) = count_tree("assets", self.assets.changes.iter(), &mut summary.changes);
        summary.assets_modified = m;
        summary.assets_added = a;
        summary.assets_deleted = d;

        summary
    }

    /// Structured lists for the manifest.
    pub fn change_list(&self) -> ChangeList {
        let mut list = ChangeList::default();

        for diff in &self.code {
            if diff.is_whole_added() {
                list.code_containers.added.push(diff.container.clone());
            } else if diff.is_whole_deleted() {
                list.code_containers.deleted.push(diff.container.clone());
            } else if diff.has_changes() {
                list.code_containers.modified.push(diff.container.clone());
            }
            let classes = |ids: &std::collections::BTreeSet<String>| {
                ids.iter()
                    .filter(|id| id.as_str() != WHOLE_CONTAINER)
                    .cloned()
                    .collect::<Vec<_>>()
            };
            list.code.modified.extend(classes(&diff.modified));
            list.code.added.extend(classes(&diff.added));
            list.code.deleted.extend(classes(&diff.deleted));
        }

        for change in &self.resources.changes {
            record(&mut list.resources, change, format!("{RESOURCES_PREFIX}{}", change.path()));
        }
        if let Some(change) = &self.resource_table {
            record(&mut list.resources, change, RESOURCE_TABLE_ENTRY.to_string());
        }
        for change in &self.assets.changes {
            record(&mut list.assets, change, format!("{ASSETS_PREFIX}{}", change.path()));
        }
        list
    }
}

fn count_tree<'a>(
    domain: &str,
    changes: impl Iterator<Item = &'a TreeChange>,
    descriptors: &mut Vec<String>,
) -> (usize, usize, usize) {
    let (mut modified, mut added, mut deleted) = (0, 0, 0);
    for change in changes {
        let label = match change {
            TreeChange::Modified { .. } => {
                modified += 1;
                "modified"
            }
            TreeChange::Added(_) => {
                added += 1;
                "added"
            }
            TreeChange::Deleted(_) => {
                deleted += 1;
                "deleted"
            }
        };
        descriptors.push(format!("{domain}:{label}:{}", change.path()));
    }
    (modified, added, deleted)
}

fn record(domain: &mut DomainChanges, change: &TreeChange, name: String) {
    match change {
        TreeChange::Modified { .. } => domain.modified.push(name),
        TreeChange::Added(_) => domain.added.push(name),
        TreeChange::Deleted(_) => domain.deleted.push(name),
    }
}

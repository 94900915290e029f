//! Code-container diff: classify classes as modified, added, or deleted,
//! expand the selection to nested and synthetic classes, and build reduced
//! containers holding only what must ship.

use std::collections::BTreeSet;

use tracing::debug;

use crate::container::{BincodeCodec, CodeContainer, ContainerCodec};
use crate::error::DiffResult;
use crate::fingerprint::fingerprint_container;

/// Sentinel identifier meaning "the entire container".
pub const WHOLE_CONTAINER: &str = "*";

/// Class-level changes within one named code container.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassDiff {
    pub container: String,
    pub modified: BTreeSet<String>,
    pub added: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
}

impl ClassDiff {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Default::default()
        }
    }

    /// The container exists only on the new side.
    pub fn whole_added(container: impl Into<String>) -> Self {
        let mut diff = Self::new(container);
        diff.added.insert(WHOLE_CONTAINER.to_string());
        diff
    }

    /// The container exists only on the base side.
    pub fn whole_deleted(container: impl Into<String>) -> Self {
        let mut diff = Self::new(container);
        diff.deleted.insert(WHOLE_CONTAINER.to_string());
        diff
    }

    pub fn is_whole_added(&self) -> bool {
        self.added.contains(WHOLE_CONTAINER)
    }

    pub fn is_whole_deleted(&self) -> bool {
        self.deleted.contains(WHOLE_CONTAINER)
    }

    pub fn has_changes(&self) -> bool {
        !(self.modified.is_empty() && self.added.is_empty() && self.deleted.is_empty())
    }

    /// Classes that must be shipped before closure expansion.
    pub fn selected(&self) -> BTreeSet<String> {
        self.modified.union(&self.added).cloned().collect()
    }
}

/// Coarse comparison from class identifier lists alone.
///
/// Detects added and deleted classes only; a class present on both sides
/// is never reported as modified because no structure is available.
pub fn compare_class_lists(container: &str, base: &[String], new: &[String]) -> ClassDiff {
    let base: BTreeSet<&String> = base.iter().collect();
    let new: BTreeSet<&String> = new.iter().collect();
    let mut diff = ClassDiff::new(container);
    diff.added = new.difference(&base).map(|s| s.to_string()).collect();
    diff.deleted = base.difference(&new).map(|s| s.to_string()).collect();
    diff
}

/// Add every class in `container` whose identifier starts with `C$` for a
/// selected identifier `C`. This also matches `C$$` synthetic classes.
///
/// This is a naming heuristic, not an ownership graph.
pub fn expand_closure(selected: &BTreeSet<String>, container: &CodeContainer) -> BTreeSet<String> {
    let mut expanded = selected.clone();
    let identifiers = container.identifiers();
    for owner in selected {
        let prefix = format!("{owner}$");
        for candidate in &identifiers {
            if candidate.starts_with(&prefix) && expanded.insert(candidate.clone()) {
                debug!(owner = %owner, class = %candidate, "closure member selected");
            }
        }
    }
    expanded
}

/// Compares code containers and builds reduced containers.
pub struct CodeDiffer<C: ContainerCodec = BincodeCodec> {
    codec: C,
}

impl Default for CodeDiffer<BincodeCodec> {
    fn default() -> Self {
        Self::new(BincodeCodec)
    }
}

impl<C: ContainerCodec> CodeDiffer<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Compare two decoded containers by class fingerprint.
    pub fn compare(&self, name: &str, base: &CodeContainer, new: &CodeContainer) -> ClassDiff {
        let base_prints = fingerprint_container(base);
        let new_prints = fingerprint_container(new);
        let mut diff = ClassDiff::new(name);

        for (id, base_print) in &base_prints {
            match new_prints.get(id) {
                Some(new_print) if new_print != base_print => {
                    diff.modified.insert(id.clone());
                }
                Some(_) => {}
                None => {
                    diff.deleted.insert(id.clone());
                }
            }
        }
        for id in new_prints.keys() {
            if !base_prints.contains_key(id) {
                diff.added.insert(id.clone());
            }
        }

        debug!(
            container = name,
            modified = diff.modified.len(),
            added = diff.added.len(),
            deleted = diff.deleted.len(),
            "compared code container"
        );
        diff
    }

    /// Compare raw container bytes. A side that is `None` does not exist,
    /// which yields the whole-container sentinel without decoding anything.
    pub fn compare_bytes(
        &self,
        name: &str,
        base: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> DiffResult<ClassDiff> {
        match (base, new) {
            (Some(base), Some(new)) => {
                let base = self.codec.decode(name, base)?;
                let new = self.codec.decode(name, new)?;
                Ok(self.compare(name, &base, &new))
            }
            (None, Some(_)) => Ok(ClassDiff::whole_added(name)),
            (Some(_), None) => Ok(ClassDiff::whole_deleted(name)),
            (None, None) => Ok(ClassDiff::new(name)),
        }
    }

    /// Build the container to ship for `diff`.
    ///
    /// Returns `None` when nothing must be written: the container was
    /// deleted outright, or no class was modified or added. A wholly new
    /// container is returned verbatim. Otherwise the new-side classes in
    /// `modified ∪ added`, expanded by [`expand_closure`], are re-encoded in
    /// their original order.
    pub fn build_reduced(&self, diff: &ClassDiff, new: Option<&[u8]>) -> DiffResult<Option<Vec<u8>>> {
        if diff.is_whole_deleted() {
            return Ok(None);
        }
        let Some(new) = new else {
            return Ok(None);
        };
        if diff.is_whole_added() {
            return Ok(Some(new.to_vec()));
        }

        let selected = diff.selected();
        if selected.is_empty() {
            return Ok(None);
        }

        let container = self.codec.decode(&diff.container, new)?;
        let keep = expand_closure(&selected, &container);
        let reduced = CodeContainer::new(
            container
                .classes
                .into_iter()
                .filter(|c| keep.contains(&c.identifier()))
                .collect(),
        );
        debug!(
            container = %diff.container,
            selected = selected.len(),
            written = reduced.len(),
            "built reduced container"
        );
        self.codec.encode(&diff.container, &reduced).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ClassDef, FieldDef, Instruction, MethodDef};

    fn class(name: &str, opcode: u8) -> ClassDef {
        ClassDef::new(format!("L{name};")).with_method(
            MethodDef::new("init", &[], "V", 1)
                .with_code(2, vec![Instruction::new(opcode, &[0, 7]), Instruction::new(0x0e, &[])]),
        )
    }

    fn encode(classes: Vec<ClassDef>) -> Vec<u8> {
        BincodeCodec.encode("classes.dex", &CodeContainer::new(classes)).unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_containers_have_no_changes() {
        let container = CodeContainer::new(vec![class("A", 0x12), class("B", 0x12)]);
        let diff = CodeDiffer::new(BincodeCodec).compare("classes.dex", &container, &container);
        assert!(!diff.has_changes());
        assert!(diff.modified.is_empty() && diff.added.is_empty() && diff.deleted.is_empty());
    }

    #[test]
    fn modified_added_deleted_scenario() {
        let base = encode(vec![class("A", 0x12), class("B", 0x12), class("C", 0x12)]);
        let new = encode(vec![class("A", 0x13), class("B", 0x12), class("D", 0x12)]);
        let differ = CodeDiffer::new(BincodeCodec);

        let diff = differ.compare_bytes("classes.dex", Some(&base), Some(&new)).unwrap();
        assert_eq!(diff.modified, set(&["A"]));
        assert_eq!(diff.added, set(&["D"]));
        assert_eq!(diff.deleted, set(&["C"]));

        let reduced = differ.build_reduced(&diff, Some(&new)).unwrap().unwrap();
        let reduced = BincodeCodec.decode("classes.dex", &reduced).unwrap();
        assert_eq!(reduced.identifiers(), vec!["A", "D"]);
        assert_eq!(reduced.find("A").unwrap(), &class("A", 0x13));
    }

    #[test]
    fn closure_expansion_follows_name_prefix() {
        let container = CodeContainer::new(vec![
            ClassDef::new("LA;"),
            ClassDef::new("LA$1;"),
            ClassDef::new("LA$$Lambda$0;"),
            ClassDef::new("LB;"),
            ClassDef::new("LAB;"),
        ]);
        let expanded = expand_closure(&set(&["A"]), &container);
        assert_eq!(expanded, set(&["A", "A$$Lambda$0", "A$1"]));
    }

    #[test]
    fn reduced_container_includes_closure_members() {
        let base = encode(vec![class("A", 0x12), ClassDef::new("LA$Inner;"), class("B", 0x12)]);
        let new = encode(vec![class("A", 0x14), ClassDef::new("LA$Inner;"), class("B", 0x12)]);
        let differ = CodeDiffer::new(BincodeCodec);
        let diff = differ.compare_bytes("classes.dex", Some(&base), Some(&new)).unwrap();
        assert_eq!(diff.modified, set(&["A"]));

        let reduced = differ.build_reduced(&diff, Some(&new)).unwrap().unwrap();
        let reduced = BincodeCodec.decode("classes.dex", &reduced).unwrap();
        assert_eq!(reduced.identifiers(), vec!["A", "A$Inner"]);
    }

    #[test]
    fn whole_container_added_ships_verbatim() {
        let new = encode(vec![class("X", 0x12)]);
        let differ = CodeDiffer::new(BincodeCodec);
        let diff = differ.compare_bytes("classes2.dex", None, Some(&new)).unwrap();
        assert!(diff.is_whole_added());
        assert_eq!(diff.added, set(&[WHOLE_CONTAINER]));
        assert_eq!(differ.build_reduced(&diff, Some(&new)).unwrap(), Some(new));
    }

    #[test]
    fn whole_container_deleted_emits_nothing() {
        let base = encode(vec![class("X", 0x12)]);
        let differ = CodeDiffer::new(BincodeCodec);
        let diff = differ.compare_bytes("classes2.dex", Some(&base), None).unwrap();
        assert!(diff.is_whole_deleted());
        assert!(diff.has_changes());
        assert_eq!(differ.build_reduced(&diff, None).unwrap(), None);
    }

    #[test]
    fn deletions_only_emit_nothing() {
        let base = encode(vec![class("A", 0x12), class("B", 0x12)]);
        let new = encode(vec![class("A", 0x12)]);
        let differ = CodeDiffer::new(BincodeCodec);
        let diff = differ.compare_bytes("classes.dex", Some(&base), Some(&new)).unwrap();
        assert_eq!(diff.deleted, set(&["B"]));
        assert_eq!(differ.build_reduced(&diff, Some(&new)).unwrap(), None);
    }

    #[test]
    fn malformed_side_is_a_parse_failure() {
        let good = encode(vec![class("A", 0x12)]);
        let err = CodeDiffer::new(BincodeCodec)
            .compare_bytes("classes.dex", Some(b"garbage!!"), Some(&good))
            .unwrap_err();
        assert_eq!(err.kind(), hotpatch_types::ErrorKind::CodeUnitParseFailed);
    }

    #[test]
    fn coarse_path_misses_modifications() {
        let base = vec!["A".to_string(), "B".to_string()];
        let new = vec!["A".to_string(), "C".to_string()];
        let diff = compare_class_lists("classes.dex", &base, &new);
        assert_eq!(diff.added, set(&["C"]));
        assert_eq!(diff.deleted, set(&["B"]));
        assert!(diff.modified.is_empty());
    }

    #[test]
    fn field_only_change_marks_modified() {
        let base = CodeContainer::new(vec![ClassDef::new("LA;")]);
        let new = CodeContainer::new(vec![ClassDef::new("LA;").with_field(FieldDef::new("f", "I", 0))]);
        let diff = CodeDiffer::new(BincodeCodec).compare("classes.dex", &base, &new);
        assert_eq!(diff.modified, set(&["A"]));
    }
}

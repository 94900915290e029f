//! Diff engine for hotpatch.
//!
//! Compares two versions of a package's contents: compiled-code containers
//! class by class, and resource/asset directories file by file.
//!
//! # Key Types
//!
//! - [`CodeContainer`] / [`ClassDef`] -- Structured view of one compiled-code unit
//! - [`ContainerCodec`] / [`BincodeCodec`] -- Byte encoding of a container
//! - [`class_fingerprint`] -- Order-independent structural digest of one class
//! - [`CodeDiffer`] / [`ClassDiff`] -- Class-level diff, closure expansion, reduced containers
//! - [`TreeDiff`] / [`TreeChange`] / [`FileEntry`] -- File-tree diff by content hash

pub mod code_diff;
pub mod container;
pub mod error;
pub mod fingerprint;
pub mod tree_diff;

pub use code_diff::{compare_class_lists, expand_closure, ClassDiff, CodeDiffer, WHOLE_CONTAINER};
pub use container::{
    BincodeCodec, ClassDef, CodeContainer, CodeItem, ContainerCodec, FieldDef, Instruction,
    MethodDef,
};
pub use error::{DiffError, DiffResult};
pub use fingerprint::{class_fingerprint, fingerprint_container, method_digest};
pub use tree_diff::{diff_directories, diff_entries, scan_tree, FileEntry, TreeChange, TreeDiff};

//! Patch container format for hotpatch.
//!
//! A patch is a zip container whose first entry is a JSON manifest,
//! followed by reduced code containers, the changed resource subtree, the
//! resource table (always stored uncompressed), the changed asset subtree,
//! and byte-diff artifacts in byte-diff mode.
//!
//! # Architecture
//!
//! - **PatchManifest**: identity, versions, digests, and per-domain change lists
//! - **PackageContent**: everything selected for one patch
//! - **PatchPacker**: writes a container to a temporary file, then moves it into place
//! - **PatchReader**: reads manifests, entries, and storage methods back

pub mod content;
pub mod entry;
pub mod error;
pub mod manifest;
pub mod reader;
pub mod writer;

pub use content::{Artifact, ArtifactSource, PackageContent};
pub use entry::{is_code_container_name, EntryInfo, EntryKind, Storage};
pub use error::{PackError, PackResult};
pub use manifest::{
    ChangeList, DomainChanges, PatchManifest, ASSETS_PREFIX, MANIFEST_ENTRY, RESOURCES_PREFIX,
    RESOURCE_TABLE_ENTRY, SIGNATURE_ENTRY,
};
pub use reader::PatchReader;
pub use writer::{PackOutput, PatchPacker};

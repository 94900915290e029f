use std::fmt;

use serde::{Deserialize, Serialize};

use crate::manifest::{
    ASSETS_PREFIX, MANIFEST_ENTRY, RESOURCES_PREFIX, RESOURCE_TABLE_ENTRY, SIGNATURE_ENTRY,
};

/// How an entry's bytes are stored in the container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Storage {
    Deflated,
    Stored,
}

impl Storage {
    pub fn compression_method(self) -> zip::CompressionMethod {
        match self {
            Self::Deflated => zip::CompressionMethod::Deflated,
            Self::Stored => zip::CompressionMethod::Stored,
        }
    }

    pub fn from_compression_method(method: zip::CompressionMethod) -> Option<Self> {
        match method {
            zip::CompressionMethod::Deflated => Some(Self::Deflated),
            zip::CompressionMethod::Stored => Some(Self::Stored),
            _ => None,
        }
    }
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deflated => write!(f, "deflated"),
            Self::Stored => write!(f, "stored"),
        }
    }
}

/// Role of an entry inside a patch container, derived from its name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Manifest,
    CodeContainer,
    Resource,
    ResourceTable,
    Asset,
    ByteDiff,
    Signature,
    Other,
}

impl EntryKind {
    pub fn from_entry_name(name: &str) -> Self {
        if name == MANIFEST_ENTRY {
            Self::Manifest
        } else if name == RESOURCE_TABLE_ENTRY {
            Self::ResourceTable
        } else if name == SIGNATURE_ENTRY {
            Self::Signature
        } else if name.starts_with(RESOURCES_PREFIX) {
            Self::Resource
        } else if name.starts_with(ASSETS_PREFIX) {
            Self::Asset
        } else if name.ends_with(".delta") {
            Self::ByteDiff
        } else if is_code_container_name(name) {
            Self::CodeContainer
        } else {
            Self::Other
        }
    }

    /// Storage method the packer uses for this kind. The resource table is
    /// always stored so the runtime can map it directly.
    pub fn storage(self) -> Storage {
        match self {
            Self::ResourceTable => Storage::Stored,
            _ => Storage::Deflated,
        }
    }
}

/// `classes.dex`, `classes2.dex`, `classes3.dex`, ...
pub fn is_code_container_name(name: &str) -> bool {
    name.strip_prefix("classes")
        .and_then(|rest| rest.strip_suffix(".dex"))
        .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
}

/// One entry as listed by [`crate::PatchReader`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub name: String,
    pub kind: EntryKind,
    pub storage: Option<Storage>,
    pub size: u64,
    pub compressed_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_entry_names() {
        assert_eq!(EntryKind::from_entry_name("patch.json"), EntryKind::Manifest);
        assert_eq!(EntryKind::from_entry_name("classes.dex"), EntryKind::CodeContainer);
        assert_eq!(EntryKind::from_entry_name("classes12.dex"), EntryKind::CodeContainer);
        assert_eq!(EntryKind::from_entry_name("classes.dex.delta"), EntryKind::ByteDiff);
        assert_eq!(EntryKind::from_entry_name("res/layout/a.xml"), EntryKind::Resource);
        assert_eq!(EntryKind::from_entry_name("resources.arsc"), EntryKind::ResourceTable);
        assert_eq!(EntryKind::from_entry_name("assets/x.bin"), EntryKind::Asset);
        assert_eq!(EntryKind::from_entry_name("META-INF/PATCH.SIG"), EntryKind::Signature);
        assert_eq!(EntryKind::from_entry_name("classesX.dex"), EntryKind::Other);
    }

    #[test]
    fn only_resource_table_is_stored() {
        for kind in [
            EntryKind::Manifest,
            EntryKind::CodeContainer,
            EntryKind::Resource,
            EntryKind::Asset,
            EntryKind::ByteDiff,
            EntryKind::Signature,
        ] {
            assert_eq!(kind.storage(), Storage::Deflated);
        }
        assert_eq!(EntryKind::ResourceTable.storage(), Storage::Stored);
    }

    #[test]
    fn code_container_names() {
        assert!(is_code_container_name("classes.dex"));
        assert!(is_code_container_name("classes2.dex"));
        assert!(!is_code_container_name("lib/classes.dex.bak"));
        assert!(!is_code_container_name("classes2.jar"));
    }

    #[test]
    fn storage_maps_to_zip_methods() {
        assert_eq!(
            Storage::from_compression_method(Storage::Stored.compression_method()),
            Some(Storage::Stored)
        );
        assert_eq!(Storage::Deflated.to_string(), "deflated");
    }
}

use chrono::{DateTime, Utc};
use hotpatch_crypto::{ContainerDigests, MD5_HEX_LEN, SHA256_HEX_LEN};
use hotpatch_types::{PatchMode, VersionInfo};
use serde::{Deserialize, Serialize};

use crate::error::{PackError, PackResult};

/// Name of the manifest entry; always the first entry in a patch.
pub const MANIFEST_ENTRY: &str = "patch.json";
/// Name of the binary resource table entry; always stored uncompressed.
pub const RESOURCE_TABLE_ENTRY: &str = "resources.arsc";
/// Prefix of the resource subtree inside a patch.
pub const RESOURCES_PREFIX: &str = "res/";
/// Prefix of the asset subtree inside a patch.
pub const ASSETS_PREFIX: &str = "assets/";
/// Detached signature appended by the signer.
pub const SIGNATURE_ENTRY: &str = "META-INF/PATCH.SIG";

/// Added, modified, and deleted names within one change domain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainChanges {
    pub modified: Vec<String>,
    pub added: Vec<String>,
    pub deleted: Vec<String>,
}

impl DomainChanges {
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.added.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modified.len() + self.added.len() + self.deleted.len()
    }
}

/// Structured change list carried by the manifest.
///
/// `code` lists class identifiers, `code_containers` lists container file
/// names, `resources` and `assets` list paths with their patch prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeList {
    pub code: DomainChanges,
    pub code_containers: DomainChanges,
    pub resources: DomainChanges,
    pub assets: DomainChanges,
}

impl ChangeList {
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
            && self.code_containers.is_empty()
            && self.resources.is_empty()
            && self.assets.is_empty()
    }
}

/// Self-describing metadata record of a patch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchManifest {
    pub patch_id: String,
    pub patch_version: String,
    pub base_version: String,
    pub base_version_code: i64,
    pub target_version: String,
    pub target_version_code: i64,
    pub patch_mode: PatchMode,
    pub created_at: DateTime<Utc>,
    pub md5: String,
    pub sha256: String,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub changes: ChangeList,
}

impl PatchManifest {
    /// A manifest for `base -> target` with pending digests.
    pub fn new(
        patch_id: impl Into<String>,
        base: &VersionInfo,
        target: &VersionInfo,
        patch_mode: PatchMode,
    ) -> Self {
        let pending = ContainerDigests::pending();
        Self {
            patch_id: patch_id.into(),
            patch_version: target.version_name.clone(),
            base_version: base.version_name.clone(),
            base_version_code: base.version_code,
            target_version: target.version_name.clone(),
            target_version_code: target.version_code,
            patch_mode,
            created_at: Utc::now(),
            md5: pending.md5,
            sha256: pending.sha256,
            file_size: pending.size,
            description: None,
            changes: ChangeList::default(),
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_changes(mut self, changes: ChangeList) -> Self {
        self.changes = changes;
        self
    }

    pub fn with_digests(mut self, digests: ContainerDigests) -> Self {
        self.md5 = digests.md5;
        self.sha256 = digests.sha256;
        self.file_size = digests.size;
        self
    }

    pub fn digests(&self) -> ContainerDigests {
        ContainerDigests {
            md5: self.md5.clone(),
            sha256: self.sha256.clone(),
            size: self.file_size,
        }
    }

    /// Check that identity, versions, and digests are present and well formed.
    pub fn validate(&self) -> PackResult<()> {
        let required = [
            ("patch_id", &self.patch_id),
            ("patch_version", &self.patch_version),
            ("base_version", &self.base_version),
            ("target_version", &self.target_version),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(PackError::InvalidManifest(format!("{field} is empty")));
            }
        }
        if self.md5.len() != MD5_HEX_LEN {
            return Err(PackError::InvalidManifest(format!(
                "md5 must be {MD5_HEX_LEN} hex chars, got {}",
                self.md5.len()
            )));
        }
        if self.sha256.len() != SHA256_HEX_LEN {
            return Err(PackError::InvalidManifest(format!(
                "sha256 must be {SHA256_HEX_LEN} hex chars, got {}",
                self.sha256.len()
            )));
        }
        if !self.digests().is_well_formed() {
            return Err(PackError::InvalidManifest("digests are not lowercase hex".into()));
        }
        if self.created_at.timestamp_millis() <= 0 {
            return Err(PackError::InvalidManifest("created_at is not set".into()));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn to_json_pretty(&self) -> PackResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| PackError::Serialization(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> PackResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| PackError::Serialization(e.to_string()))
    }
}

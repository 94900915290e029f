use std::path::PathBuf;

use crate::error::PackResult;
use crate::manifest::PatchManifest;

/// Where an artifact's bytes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactSource {
    Memory(Vec<u8>),
    File(PathBuf),
}

impl ArtifactSource {
    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Memory(bytes) => Ok(bytes.clone()),
            Self::File(path) => std::fs::read(path),
        }
    }
}

/// A named binary artifact written at the container root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub source: ArtifactSource,
}

impl Artifact {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            source: ArtifactSource::Memory(bytes),
        }
    }

    pub fn from_file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: ArtifactSource::File(path.into()),
        }
    }
}

/// Everything selected for one patch.
///
/// `resources` and `assets` point at staged directories that hold only the
/// added and modified files; their relative layout is preserved under the
/// matching prefix.
#[derive(Clone, Debug)]
pub struct PackageContent {
    pub manifest: PatchManifest,
    pub code_containers: Vec<Artifact>,
    pub resources: Option<PathBuf>,
    pub resource_table: Option<ArtifactSource>,
    pub assets: Option<PathBuf>,
    pub byte_diffs: Vec<Artifact>,
}

impl PackageContent {
    pub fn new(manifest: PatchManifest) -> Self {
        Self {
            manifest,
            code_containers: Vec::new(),
            resources: None,
            resource_table: None,
            assets: None,
            byte_diffs: Vec::new(),
        }
    }

    pub fn with_code_container(mut self, artifact: Artifact) -> Self {
        self.code_containers.push(artifact);
        self
    }

    pub fn with_resources(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resources = Some(dir.into());
        self
    }

    pub fn with_resource_table(mut self, source: ArtifactSource) -> Self {
        self.resource_table = Some(source);
        self
    }

    pub fn with_assets(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets = Some(dir.into());
        self
    }

    pub fn with_byte_diff(mut self, artifact: Artifact) -> Self {
        self.byte_diffs.push(artifact);
        self
    }

    /// Content is valid only if it carries a valid manifest.
    pub fn validate(&self) -> PackResult<()> {
        self.manifest.validate()
    }
}

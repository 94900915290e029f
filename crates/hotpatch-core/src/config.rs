use std::path::{Path, PathBuf};
use std::time::Duration;

use hotpatch_types::{EngineKind, PatchMode};
use serde::{Deserialize, Serialize};

use crate::error::{GenerateError, GenerateResult};

/// Optional generation settings.
///
/// Every field has a default, so a settings file only needs the keys it
/// changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorSettings {
    pub mode: PatchMode,
    pub engine: EngineKind,
    /// Whole-run limit, checked at stage boundaries.
    pub timeout_secs: Option<u64>,
    /// Parent directory for the per-run working directory. Defaults to the
    /// system temporary directory.
    pub work_dir: Option<PathBuf>,
    /// Hex-encoded Ed25519 secret key file. Signing is skipped when unset.
    pub signing_key: Option<PathBuf>,
    /// Write the final manifest next to the patch as `<output>.json`.
    pub write_sidecar_manifest: bool,
    /// Apply every byte diff and compare against the target before packing.
    pub verify_byte_diff: bool,
    pub description: Option<String>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            mode: PatchMode::FullCodeSelection,
            engine: EngineKind::Auto,
            timeout_secs: None,
            work_dir: None,
            signing_key: None,
            write_sidecar_manifest: true,
            verify_byte_diff: true,
            description: None,
        }
    }
}

impl GeneratorSettings {
    pub fn from_toml_str(text: &str) -> GenerateResult<Self> {
        toml::from_str(text).map_err(|e| GenerateError::InvalidConfig(e.to_string()))
    }

    pub fn from_file(path: &Path) -> GenerateResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GenerateError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }
}

/// Complete, immutable description of one generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub base_package: PathBuf,
    pub new_package: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub settings: GeneratorSettings,
}

impl GeneratorConfig {
    pub fn new(
        base_package: impl Into<PathBuf>,
        new_package: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            base_package: base_package.into(),
            new_package: new_package.into(),
            output: output.into(),
            settings: GeneratorSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: GeneratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_mode(mut self, mode: PatchMode) -> Self {
        self.settings.mode = mode;
        self
    }

    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.settings.engine = engine;
        self
    }

    /// Whole-second granularity; fractions round up.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self.settings.timeout_secs = Some(secs.max(1));
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.work_dir = Some(dir.into());
        self
    }

    pub fn with_signing_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.signing_key = Some(path.into());
        self
    }

    pub fn with_sidecar_manifest(mut self, enabled: bool) -> Self {
        self.settings.write_sidecar_manifest = enabled;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.settings.description = Some(description.into());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.settings.timeout_secs.map(Duration::from_secs)
    }

    /// Path of the sidecar manifest: the output path with `.json` appended.
    pub fn sidecar_path(&self) -> PathBuf {
        let mut name = self.output.clone().into_os_string();
        name.push(".json");
        PathBuf::from(name)
    }

    /// Static checks that need no file system access beyond `output`.
    pub fn validate(&self) -> GenerateResult<()> {
        for (field, path) in [
            ("base package", &self.base_package),
            ("new package", &self.new_package),
            ("output", &self.output),
        ] {
            if path.as_os_str().is_empty() {
                return Err(GenerateError::InvalidConfig(format!("{field} path is empty")));
            }
        }
        if self.output.is_dir() {
            return Err(GenerateError::InvalidConfig(format!(
                "output {} is a directory",
                self.output.display()
            )));
        }
        if self.output == self.base_package || self.output == self.new_package {
            return Err(GenerateError::InvalidConfig(
                "output must differ from both inputs".to_string(),
            ));
        }
        if self.settings.timeout_secs == Some(0) {
            return Err(GenerateError::InvalidConfig(
                "timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// How changed compiled code is carried in a patch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchMode {
    /// Ship reduced code containers holding only the selected classes.
    #[default]
    FullCodeSelection,
    /// Ship byte-level deltas of each changed container.
    ByteDiff,
}

impl PatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullCodeSelection => "full-code-selection",
            Self::ByteDiff => "byte-diff",
        }
    }
}

impl fmt::Display for PatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatchMode {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full-code-selection" => Ok(Self::FullCodeSelection),
            "byte-diff" => Ok(Self::ByteDiff),
            other => Err(TypeError::UnknownVariant {
                kind: "patch mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Which byte-diff engine to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// Accelerated engine when registered, otherwise primary.
    #[default]
    Auto,
    /// In-process engine, always available.
    Primary,
    /// Accelerated engine only; unavailable is an error.
    NativeAccelerated,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Primary => "primary",
            Self::NativeAccelerated => "native-accelerated",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "primary" => Ok(Self::Primary),
            "native-accelerated" => Ok(Self::NativeAccelerated),
            other => Err(TypeError::UnknownVariant {
                kind: "engine",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_mode_parse_and_display_agree() {
        for mode in [PatchMode::FullCodeSelection, PatchMode::ByteDiff] {
            assert_eq!(mode.to_string().parse::<PatchMode>().unwrap(), mode);
        }
        assert!("bsdiff".parse::<PatchMode>().is_err());
    }

    #[test]
    fn engine_kind_parse_and_display_agree() {
        for engine in [
            EngineKind::Auto,
            EngineKind::Primary,
            EngineKind::NativeAccelerated,
        ] {
            assert_eq!(engine.to_string().parse::<EngineKind>().unwrap(), engine);
        }
        let err = "java".parse::<EngineKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown engine: java");
    }

    #[test]
    fn serde_matches_wire_names() {
        assert_eq!(
            serde_json::to_string(&PatchMode::FullCodeSelection).unwrap(),
            "\"full-code-selection\""
        );
        assert_eq!(
            serde_json::from_str::<EngineKind>("\"native-accelerated\"").unwrap(),
            EngineKind::NativeAccelerated
        );
    }

    #[test]
    fn defaults() {
        assert_eq!(PatchMode::default(), PatchMode::FullCodeSelection);
        assert_eq!(EngineKind::default(), EngineKind::Auto);
    }
}

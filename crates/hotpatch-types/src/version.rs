use std::fmt;

use serde::{Deserialize, Serialize};

/// Version metadata extracted from one input package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub package_name: String,
    pub version_name: String,
    pub version_code: i64,
}

impl VersionInfo {
    pub fn new(
        package_name: impl Into<String>,
        version_name: impl Into<String>,
        version_code: i64,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            version_name: version_name.into(),
            version_code,
        }
    }

    /// Returns `true` if both inputs describe the same application.
    pub fn same_package(&self, other: &VersionInfo) -> bool {
        self.package_name == other.package_name
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.package_name, self.version_name, self.version_code
        )
    }
}

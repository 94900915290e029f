use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use hotpatch_pack::{is_code_container_name, RESOURCE_TABLE_ENTRY};
use hotpatch_types::VersionInfo;
use tracing::debug;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{ParseError, ParseResult};

/// Metadata file every package carries at its root.
pub const PACKAGE_INFO: &str = "package-info.json";

const RESOURCES_DIR: &str = "res";
const ASSETS_DIR: &str = "assets";

/// Turns an input package into version metadata and an exploded tree.
pub trait PackageParser: Send + Sync {
    /// Parse `input`. Anything that must be extracted goes under `scratch`,
    /// which the caller owns and removes.
    fn parse(&self, input: &Path, scratch: &Path) -> ParseResult<ParsedPackage>;
}

/// A package laid out on disk.
#[derive(Clone, Debug)]
pub struct ParsedPackage {
    pub source: PathBuf,
    pub version: VersionInfo,
    /// Root of the exploded tree.
    pub root: PathBuf,
    /// Size of the input as given: archive length or total file bytes.
    pub size: u64,
}

impl ParsedPackage {
    /// Code containers at the package root, keyed by file name.
    pub fn code_containers(&self) -> ParseResult<BTreeMap<String, PathBuf>> {
        let mut found = BTreeMap::new();
        let entries = fs::read_dir(&self.root).map_err(|e| ParseError::io(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ParseError::io(&self.root, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_code_container_name(&name) && entry.path().is_file() {
                found.insert(name, entry.path());
            }
        }
        Ok(found)
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.root.join(RESOURCES_DIR)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }

    pub fn resource_table(&self) -> Option<PathBuf> {
        let path = self.root.join(RESOURCE_TABLE_ENTRY);
        path.is_file().then_some(path)
    }
}

/// Accepts a zip package or an already exploded directory.
#[derive(Clone, Debug, Default)]
pub struct ArchiveParser;

impl ArchiveParser {
    pub fn new() -> Self {
        Self
    }

    fn extract(&self, input: &Path, dest: &Path) -> ParseResult<u64> {
        let file = File::open(input).map_err(|e| ParseError::io(input, e))?;
        let size = file.metadata().map_err(|e| ParseError::io(input, e))?.len();
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|e| ParseError::InvalidFormat {
                path: input.to_path_buf(),
                reason: e.to_string(),
            })?;

        fs::create_dir_all(dest).map_err(|e| ParseError::io(dest, e))?;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| ParseError::Archive {
                path: input.to_path_buf(),
                reason: e.to_string(),
            })?;
            let Some(relative) = entry.enclosed_name() else {
                return Err(ParseError::UnsafeEntry {
                    path: input.to_path_buf(),
                    entry: entry.name().to_string(),
                });
            };
            let target = dest.join(relative);
            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(|e| ParseError::io(&target, e))?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| ParseError::io(parent, e))?;
            }
            let mut out = File::create(&target).map_err(|e| ParseError::io(&target, e))?;
            io::copy(&mut entry, &mut out).map_err(|e| ParseError::io(&target, e))?;
        }
        debug!(input = %input.display(), entries = archive.len(), "extracted package");
        Ok(size)
    }
}

impl PackageParser for ArchiveParser {
    fn parse(&self, input: &Path, scratch: &Path) -> ParseResult<ParsedPackage> {
        if !input.exists() {
            return Err(ParseError::NotFound(input.to_path_buf()));
        }
        let (root, size) = if input.is_dir() {
            (input.to_path_buf(), tree_size(input)?)
        } else {
            let size = self.extract(input, scratch)?;
            (scratch.to_path_buf(), size)
        };
        let version = read_package_info(&root)?;
        debug!(
            input = %input.display(),
            package = %version.package_name,
            version = %version.version_name,
            "parsed package"
        );
        Ok(ParsedPackage {
            source: input.to_path_buf(),
            version,
            root,
            size,
        })
    }
}

fn tree_size(root: &Path) -> ParseResult<u64> {
    let mut total = 0;
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| ParseError::io(root, e.into()))?;
        if entry.file_type().is_file() {
            let meta = entry.metadata().map_err(|e| ParseError::io(entry.path(), e.into()))?;
            total += meta.len();
        }
    }
    Ok(total)
}

fn read_package_info(root: &Path) -> ParseResult<VersionInfo> {
    let path = root.join(PACKAGE_INFO);
    let metadata = |reason: String| ParseError::Metadata {
        path: path.clone(),
        reason,
    };
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(metadata(format!("{PACKAGE_INFO} missing")));
        }
        Err(e) => return Err(ParseError::io(&path, e)),
    };
    let info: VersionInfo =
        serde_json::from_slice(&bytes).map_err(|e| metadata(e.to_string()))?;
    if info.package_name.trim().is_empty() || info.version_name.trim().is_empty() {
        return Err(metadata("package_name and version_name are required".into()));
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{write_dir_package, write_zip_package, PackageSpec};
    use hotpatch_types::ErrorKind;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn spec() -> PackageSpec {
        PackageSpec::new("com.example.app", "1.0.0", 100)
            .file("classes.dex", b"dex")
            .file("classes2.dex", b"dex2")
            .file("classes-extra.dex", b"not a container")
            .file("res/values/strings.xml", b"<resources/>")
            .file("assets/config.json", b"{}")
            .file("resources.arsc", b"table")
    }

    #[test]
    fn parses_directory_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pkg");
        write_dir_package(&root, &spec());

        let parsed = ArchiveParser.parse(&root, &dir.path().join("scratch")).unwrap();
        assert_eq!(parsed.root, root);
        assert_eq!(parsed.version.package_name, "com.example.app");
        assert_eq!(parsed.version.version_code, 100);
        assert!(parsed.size > 0);
        assert!(!dir.path().join("scratch").exists());

        let containers = parsed.code_containers().unwrap();
        let names: Vec<_> = containers.keys().cloned().collect();
        assert_eq!(names, vec!["classes.dex", "classes2.dex"]);
        assert!(parsed.resources_dir().join("values/strings.xml").is_file());
        assert!(parsed.assets_dir().is_dir());
        assert!(parsed.resource_table().is_some());
    }

    #[test]
    fn parses_zip_into_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("app.zip");
        write_zip_package(&archive, &spec());
        let scratch = dir.path().join("scratch");

        let parsed = ArchiveParser.parse(&archive, &scratch).unwrap();
        assert_eq!(parsed.root, scratch);
        assert_eq!(parsed.size, fs::metadata(&archive).unwrap().len());
        assert_eq!(fs::read(scratch.join("classes.dex")).unwrap(), b"dex");
        assert_eq!(parsed.code_containers().unwrap().len(), 2);
    }

    #[test]
    fn missing_input_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArchiveParser
            .parse(&dir.path().join("nope.zip"), dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn non_zip_file_is_invalid_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("app.zip");
        fs::write(&input, b"plain text").unwrap();
        let err = ArchiveParser.parse(&input, &dir.path().join("s")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInputFormat);
    }

    #[test]
    fn missing_or_bad_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pkg");
        fs::create_dir_all(&root).unwrap();
        let err = ArchiveParser.parse(&root, dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MetadataParseFailed);

        fs::write(root.join(PACKAGE_INFO), br#"{"package_name": ""}"#).unwrap();
        let err = ArchiveParser.parse(&root, dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MetadataParseFailed);

        fs::write(
            root.join(PACKAGE_INFO),
            br#"{"package_name": "", "version_name": "1", "version_code": 1}"#,
        )
        .unwrap();
        let err = ArchiveParser.parse(&root, dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MetadataParseFailed);
    }

    #[test]
    fn traversal_entries_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("evil.zip");
        let mut zip = zip::ZipWriter::new(File::create(&input).unwrap());
        zip.start_file("../escape.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"x").unwrap();
        zip.finish().unwrap();

        let scratch = dir.path().join("scratch");
        let err = ArchiveParser.parse(&input, &scratch).unwrap_err();
        assert!(matches!(err, ParseError::UnsafeEntry { .. }));
        assert!(!dir.path().join("escape.txt").exists());
    }
}

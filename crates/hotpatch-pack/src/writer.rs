use std::fs;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use hotpatch_crypto::ContainerDigests;
use hotpatch_types::PatchMode;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::content::PackageContent;
use crate::entry::{EntryKind, Storage};
use crate::error::{PackError, PackResult};
use crate::manifest::{
    PatchManifest, ASSETS_PREFIX, MANIFEST_ENTRY, RESOURCES_PREFIX, RESOURCE_TABLE_ENTRY,
};

/// Result of writing a patch container.
#[derive(Clone, Debug)]
pub struct PackOutput {
    pub path: PathBuf,
    /// Manifest with the final container's digests filled in.
    pub manifest: PatchManifest,
    /// Entry names in write order.
    pub entries: Vec<String>,
}

/// Writes [`PackageContent`] into a single deterministic patch container.
///
/// Entries are written in a fixed order: manifest, code containers,
/// resources, resource table, assets, byte-diff artifacts. Every entry uses
/// the same fixed timestamp, so identical content produces identical bytes.
#[derive(Clone, Debug, Default)]
pub struct PatchPacker;

impl PatchPacker {
    pub fn new() -> Self {
        Self
    }

    /// Pack `content` into `output`.
    ///
    /// The container is written to a temporary file beside `output` and
    /// persisted only once complete. The embedded manifest carries pending
    /// digests; the returned manifest carries the digests of the final file.
    pub fn pack(&self, content: &PackageContent, output: &Path) -> PackResult<PackOutput> {
        content.validate()?;

        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".hotpatch-")
            .suffix(".tmp")
            .tempfile_in(&parent)?;

        let entries = {
            let mut sink = EntrySink::new(BufWriter::new(tmp.as_file_mut()));
            self.write_entries(content, &mut sink)?;
            let (entries, buffered) = sink.finish()?;
            buffered
                .into_inner()
                .map_err(|e| PackError::Io(e.into_error()))?
                .sync_all()?;
            entries
        };

        if output.exists() {
            debug!(path = %output.display(), "replacing existing patch");
        }
        tmp.persist(output).map_err(|e| PackError::Io(e.error))?;

        let digests = ContainerDigests::compute_file(output)?;
        info!(
            path = %output.display(),
            entries = entries.len(),
            size = digests.size,
            md5 = %digests.md5,
            "patch container written"
        );

        Ok(PackOutput {
            path: output.to_path_buf(),
            manifest: content.manifest.clone().with_digests(digests),
            entries,
        })
    }

    fn write_entries<W: Write + Seek>(
        &self,
        content: &PackageContent,
        sink: &mut EntrySink<W>,
    ) -> PackResult<()> {
        let embedded = content
            .manifest
            .clone()
            .with_digests(ContainerDigests::pending());
        sink.add(MANIFEST_ENTRY, &embedded.to_json_pretty()?)?;

        for artifact in &content.code_containers {
            sink.add(&artifact.name, &artifact.source.read()?)?;
        }

        if let Some(dir) = &content.resources {
            sink.add_tree(dir, RESOURCES_PREFIX)?;
        }

        if let Some(table) = &content.resource_table {
            sink.add(RESOURCE_TABLE_ENTRY, &table.read()?)?;
        }

        if let Some(dir) = &content.assets {
            sink.add_tree(dir, ASSETS_PREFIX)?;
        }

        if content.manifest.patch_mode == PatchMode::ByteDiff {
            for artifact in &content.byte_diffs {
                sink.add(&artifact.name, &artifact.source.read()?)?;
            }
        } else if !content.byte_diffs.is_empty() {
            warn!(
                count = content.byte_diffs.len(),
                "ignoring byte-diff artifacts outside byte-diff mode"
            );
        }
        Ok(())
    }
}

/// Zip writer that applies per-kind storage and records entry order.
struct EntrySink<W: Write + Seek> {
    zip: ZipWriter<W>,
    names: Vec<String>,
}

impl<W: Write + Seek> EntrySink<W> {
    fn new(inner: W) -> Self {
        Self {
            zip: ZipWriter::new(inner),
            names: Vec::new(),
        }
    }

    fn options(storage: Storage) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(storage.compression_method())
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644)
    }

    fn add(&mut self, name: &str, data: &[u8]) -> PackResult<()> {
        let storage = EntryKind::from_entry_name(name).storage();
        self.zip.start_file(name, Self::options(storage))?;
        self.zip.write_all(data)?;
        debug!(entry = name, bytes = data.len(), storage = %storage, "wrote entry");
        self.names.push(name.to_string());
        Ok(())
    }

    /// Add every file under `root` as `prefix + relative path`, sorted by name.
    fn add_tree(&mut self, root: &Path, prefix: &str) -> PackResult<()> {
        if !root.is_dir() {
            return Ok(());
        }
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| PackError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let data = fs::read(entry.path())?;
            self.add(&format!("{prefix}{relative}"), &data)?;
        }
        Ok(())
    }

    fn finish(self) -> PackResult<(Vec<String>, W)> {
        let inner = self.zip.finish()?;
        Ok((self.names, inner))
    }
}

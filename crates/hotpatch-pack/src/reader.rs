use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::ZipArchive;

use crate::entry::{EntryInfo, EntryKind, Storage};
use crate::error::{PackError, PackResult};
use crate::manifest::{PatchManifest, MANIFEST_ENTRY};

/// Reads a patch container produced by [`crate::PatchPacker`].
pub struct PatchReader {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
}

impl PatchReader {
    pub fn open(path: &Path) -> PackResult<Self> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(BufReader::new(file)).map_err(|e| match e {
            ZipError::Io(io) => PackError::Io(io),
            other => PackError::NotAPatch(format!("{}: {other}", path.display())),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Entry names in archive order.
    pub fn entry_names(&mut self) -> PackResult<Vec<String>> {
        let mut names = Vec::with_capacity(self.archive.len());
        for i in 0..self.archive.len() {
            names.push(self.archive.by_index(i)?.name().to_string());
        }
        Ok(names)
    }

    /// Name, role, storage method, and sizes of every entry, in archive order.
    pub fn entries(&mut self) -> PackResult<Vec<EntryInfo>> {
        let mut infos = Vec::with_capacity(self.archive.len());
        for i in 0..self.archive.len() {
            let file = self.archive.by_index(i)?;
            infos.push(EntryInfo {
                name: file.name().to_string(),
                kind: EntryKind::from_entry_name(file.name()),
                storage: Storage::from_compression_method(file.compression()),
                size: file.size(),
                compressed_size: file.compressed_size(),
            });
        }
        Ok(infos)
    }

    /// Storage method of `name`, or `None` if it uses neither deflate nor store.
    pub fn storage_of(&mut self, name: &str) -> PackResult<Option<Storage>> {
        let file = self.archive.by_name(name).map_err(|e| missing(name, e))?;
        Ok(Storage::from_compression_method(file.compression()))
    }

    pub fn read_entry(&mut self, name: &str) -> PackResult<Vec<u8>> {
        let mut file = self.archive.by_name(name).map_err(|e| missing(name, e))?;
        let mut data = Vec::with_capacity(prealloc(file.size()));
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Read entry `index` in archive order, returning its name and bytes.
    pub fn read_index(&mut self, index: usize) -> PackResult<(String, Vec<u8>)> {
        let mut file = self.archive.by_index(index)?;
        let mut data = Vec::with_capacity(prealloc(file.size()));
        file.read_to_end(&mut data)?;
        Ok((file.name().to_string(), data))
    }

    /// The embedded manifest. It must be the first entry.
    pub fn manifest(&mut self) -> PackResult<PatchManifest> {
        if self.archive.len() == 0 {
            return Err(PackError::MissingEntry(MANIFEST_ENTRY.to_string()));
        }
        let (first, data) = self.read_index(0)?;
        if first != MANIFEST_ENTRY {
            return Err(PackError::NotAPatch(format!(
                "first entry is {first}, expected {MANIFEST_ENTRY}"
            )));
        }
        PatchManifest::from_json(&data)
    }
}

/// Header sizes are untrusted; reserve at most this much up front.
const MAX_PREALLOC: u64 = 1 << 20;

fn prealloc(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

fn missing(name: &str, err: ZipError) -> PackError {
    match err {
        ZipError::FileNotFound => PackError::MissingEntry(name.to_string()),
        other => PackError::Zip(other),
    }
}

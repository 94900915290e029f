//! Package fixtures shared by the crate's tests.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use hotpatch_diff::{BincodeCodec, ClassDef, CodeContainer, ContainerCodec, Instruction, MethodDef};
use hotpatch_types::VersionInfo;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::parser::PACKAGE_INFO;

#[derive(Clone, Debug)]
pub(crate) struct PackageSpec {
    pub info: VersionInfo,
    pub files: BTreeMap<String, Vec<u8>>,
}

impl PackageSpec {
    pub fn new(package: &str, version: &str, code: i64) -> Self {
        Self {
            info: VersionInfo::new(package, version, code),
            files: BTreeMap::new(),
        }
    }

    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        self.files.insert(path.to_string(), data.to_vec());
        self
    }

    pub fn container(self, name: &str, classes: Vec<ClassDef>) -> Self {
        let bytes = BincodeCodec
            .encode(name, &CodeContainer::new(classes))
            .unwrap();
        self.file(name, &bytes)
    }

    pub fn without(mut self, path: &str) -> Self {
        self.files.remove(path);
        self
    }

    pub fn version(mut self, version: &str, code: i64) -> Self {
        self.info = VersionInfo::new(self.info.package_name.clone(), version, code);
        self
    }

    fn info_json(&self) -> Vec<u8> {
        serde_json::to_vec(&self.info).unwrap()
    }
}

/// A class with one method whose first instruction uses `opcode`.
pub(crate) fn class(name: &str, opcode: u8) -> ClassDef {
    ClassDef::new(format!("L{};", name.replace('.', "/"))).with_method(
        MethodDef::new("run", &[], "V", 1)
            .with_code(2, vec![Instruction::new(opcode, &[0, 1]), Instruction::new(0x0e, &[])]),
    )
}

pub(crate) fn write_dir_package(root: &Path, spec: &PackageSpec) {
    fs::create_dir_all(root).unwrap();
    fs::write(root.join(PACKAGE_INFO), spec.info_json()).unwrap();
    for (path, data) in &spec.files {
        let target = root.join(path);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(target, data).unwrap();
    }
}

pub(crate) fn write_zip_package(path: &Path, spec: &PackageSpec) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    zip.start_file(PACKAGE_INFO, options).unwrap();
    zip.write_all(&spec.info_json()).unwrap();
    for (name, data) in &spec.files {
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

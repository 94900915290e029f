use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use hotpatch_types::ContentId;

const READ_BUFFER_SIZE: usize = 8192;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a class fingerprint and a file digest over identical
/// bytes never collide.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for whole-class structural fingerprints.
    pub const CLASS: Self = Self {
        domain: "hotpatch-class-v1",
    };
    /// Hasher for a single method's instruction stream.
    pub const METHOD: Self = Self {
        domain: "hotpatch-method-v1",
    };
    /// Hasher for file contents in resource and asset trees.
    pub const FILE: Self = Self {
        domain: "hotpatch-file-v1",
    };
    /// Hasher for the canonical digest covered by a patch signature.
    pub const SIGNATURE: Self = Self {
        domain: "hotpatch-signature-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ContentId {
        let mut hasher = self.start();
        hasher.update(data);
        hasher.finish()
    }

    /// Begin an incremental hash in this domain.
    pub fn start(&self) -> DomainHasher {
        let mut inner = blake3::Hasher::new();
        inner.update(self.domain.as_bytes());
        inner.update(b":");
        DomainHasher { inner }
    }

    /// Hash everything readable from `reader`, returning the digest and the
    /// number of bytes consumed.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> io::Result<(ContentId, u64)> {
        let mut hasher = self.start();
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            total += n as u64;
        }
        Ok((hasher.finish(), total))
    }

    /// Stream a file from disk through the hasher.
    pub fn hash_file(&self, path: &Path) -> io::Result<(ContentId, u64)> {
        self.hash_reader(File::open(path)?)
    }

    pub fn verify(&self, data: &[u8], expected: &ContentId) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Incremental hasher returned by [`ContentHasher::start`].
pub struct DomainHasher {
    inner: blake3::Hasher,
}

impl DomainHasher {
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Feed a length-prefixed field so adjacent fields cannot run together.
    pub fn update_field(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(&(data.len() as u64).to_be_bytes());
        self.inner.update(data);
        self
    }

    pub fn finish(&self) -> ContentId {
        ContentId::from_hash(*self.inner.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let id1 = ContentHasher::FILE.hash(b"hello world");
        let id2 = ContentHasher::FILE.hash(b"hello world");
        assert_eq!(id1, id2);
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        let class = ContentHasher::CLASS.hash(data);
        let method = ContentHasher::METHOD.hash(data);
        let file = ContentHasher::FILE.hash(data);
        assert_ne!(class, method);
        assert_ne!(class, file);
        assert_ne!(method, file);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut hasher = ContentHasher::FILE.start();
        hasher.update(b"hello ").update(b"world");
        assert_eq!(hasher.finish(), ContentHasher::FILE.hash(b"hello world"));
    }

    #[test]
    fn fields_do_not_run_together() {
        let mut a = ContentHasher::CLASS.start();
        a.update_field(b"ab").update_field(b"c");
        let mut b = ContentHasher::CLASS.start();
        b.update_field(b"a").update_field(b"bc");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn hash_reader_counts_bytes() {
        let data = vec![7u8; READ_BUFFER_SIZE * 3 + 11];
        let (id, len) = ContentHasher::FILE.hash_reader(data.as_slice()).unwrap();
        assert_eq!(len, data.len() as u64);
        assert_eq!(id, ContentHasher::FILE.hash(&data));
    }

    #[test]
    fn hash_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asset.bin");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"asset payload").unwrap();
        drop(file);

        let (id, len) = ContentHasher::FILE.hash_file(&path).unwrap();
        assert_eq!(len, 13);
        assert!(ContentHasher::FILE.verify(b"asset payload", &id));
    }

    #[test]
    fn hash_file_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContentHasher::FILE
            .hash_file(&dir.path().join("missing"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Length of a hex-encoded MD5 digest.
pub const MD5_HEX_LEN: usize = 32;
/// Length of a hex-encoded SHA-256 digest.
pub const SHA256_HEX_LEN: usize = 64;

/// Integrity digests of a finished patch container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDigests {
    pub md5: String,
    pub sha256: String,
    pub size: u64,
}

impl ContainerDigests {
    /// Correct-length placeholder used inside a container that cannot
    /// describe its own digest.
    pub fn pending() -> Self {
        Self {
            md5: "0".repeat(MD5_HEX_LEN),
            sha256: "0".repeat(SHA256_HEX_LEN),
            size: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.size == 0 && self.md5.bytes().all(|b| b == b'0')
    }

    /// Returns `true` when both digests are lowercase hex of the right length.
    pub fn is_well_formed(&self) -> bool {
        is_hex_of_len(&self.md5, MD5_HEX_LEN) && is_hex_of_len(&self.sha256, SHA256_HEX_LEN)
    }

    pub fn compute(data: &[u8]) -> Self {
        Self {
            md5: format!("{:x}", Md5::digest(data)),
            sha256: format!("{:x}", Sha256::digest(data)),
            size: data.len() as u64,
        }
    }

    /// Stream a file once through both digests.
    pub fn compute_file(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut md5 = Md5::new();
        let mut sha256 = Sha256::new();
        let mut buffer = [0u8; 8192];
        let mut size = 0u64;
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            md5.update(&buffer[..n]);
            sha256.update(&buffer[..n]);
            size += n as u64;
        }
        Ok(Self {
            md5: format!("{:x}", md5.finalize()),
            sha256: format!("{:x}", sha256.finalize()),
            size,
        })
    }
}

fn is_hex_of_len(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

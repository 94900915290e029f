use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use hotpatch_crypto::{ContentHasher, Signature, SigningKey, VerifyingKey};
use hotpatch_pack::{PatchReader, Storage, SIGNATURE_ENTRY};
use hotpatch_types::ContentId;
use serde::{Deserialize, Serialize};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::SignError;

pub const SIGNATURE_ALGORITHM: &str = "ed25519";

/// Adds a verifiable signature to a finished patch, in place.
pub trait PatchSigner: Send + Sync {
    fn sign(&self, patch: &Path) -> Result<SignatureRecord, SignError>;
}

/// Contents of the signature entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub algorithm: String,
    pub public_key: String,
    pub signature: Signature,
    /// Hex of the canonical entry digest that was signed.
    pub digest: String,
}

/// Signs with an Ed25519 key loaded from a hex file.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn from_key_file(path: &Path) -> Result<Self, SignError> {
        let text = std::fs::read_to_string(path).map_err(|e| SignError::KeyUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(SigningKey::from_hex(&text)?))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl PatchSigner for Ed25519Signer {
    fn sign(&self, patch: &Path) -> Result<SignatureRecord, SignError> {
        let digest = {
            let mut reader = PatchReader::open(patch)?;
            if reader.entry_names()?.iter().any(|n| n == SIGNATURE_ENTRY) {
                return Err(SignError::AlreadySigned);
            }
            canonical_digest(&mut reader)?
        };

        let record = SignatureRecord {
            algorithm: SIGNATURE_ALGORITHM.to_string(),
            public_key: self.key.verifying_key().to_hex(),
            signature: self.key.sign_digest(&digest),
            digest: digest.to_hex(),
        };
        let body = serde_json::to_vec_pretty(&record)
            .map_err(|e| SignError::MalformedSignature(e.to_string()))?;

        let file = OpenOptions::new().read(true).write(true).open(patch)?;
        let mut zip = ZipWriter::new_append(file)?;
        let options = SimpleFileOptions::default()
            .compression_method(Storage::Deflated.compression_method())
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);
        zip.start_file(SIGNATURE_ENTRY, options)?;
        zip.write_all(&body)?;
        zip.finish()?.sync_all()?;

        info!(
            path = %patch.display(),
            public_key = %record.public_key,
            digest = %digest.short_hex(),
            "patch signed"
        );
        Ok(record)
    }
}

/// Digest over every entry except the signature, in archive order.
///
/// Each entry contributes its length-prefixed name and bytes.
pub fn canonical_digest(reader: &mut PatchReader) -> Result<ContentId, SignError> {
    let mut hasher = ContentHasher::SIGNATURE.start();
    for index in 0..reader.len() {
        let (name, data) = reader.read_index(index)?;
        if name == SIGNATURE_ENTRY {
            continue;
        }
        hasher.update_field(name.as_bytes()).update_field(&data);
    }
    Ok(hasher.finish())
}

/// Check the signature entry of `patch` against `key`.
pub fn verify_container(patch: &Path, key: &VerifyingKey) -> Result<SignatureRecord, SignError> {
    let mut reader = PatchReader::open(patch)?;
    if !reader.entry_names()?.iter().any(|n| n == SIGNATURE_ENTRY) {
        return Err(SignError::Unsigned);
    }
    let body = reader.read_entry(SIGNATURE_ENTRY)?;
    let record: SignatureRecord = serde_json::from_slice(&body)
        .map_err(|e| SignError::MalformedSignature(e.to_string()))?;
    if record.algorithm != SIGNATURE_ALGORITHM {
        return Err(SignError::MalformedSignature(format!(
            "unsupported algorithm {}",
            record.algorithm
        )));
    }
    if record.public_key != key.to_hex() {
        return Err(SignError::Mismatch);
    }

    let digest = canonical_digest(&mut reader)?;
    if digest.to_hex() != record.digest {
        return Err(SignError::Mismatch);
    }
    key.verify_digest(&digest, &record.signature)
        .map_err(|_| SignError::Mismatch)?;
    Ok(record)
}

//! Ed25519 keys for patch signatures.
//!
//! Patches are signed over a 32-byte [`ContentId`] digest, never over raw
//! archive bytes. Keys and signatures travel as lowercase hex, which is also
//! the on-disk format of a key file.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signer as _, Verifier as _};
use hotpatch_types::ContentId;
use serde::{Deserialize, Serialize};

const SECRET_LEN: usize = 32;
const SIGNATURE_LEN: usize = 64;

/// Secret half of a patch signing key.
pub struct SigningKey(ed25519_dalek::SigningKey);

/// Public half, distributed to whoever installs patches.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

/// Detached signature over a patch digest.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature(ed25519_dalek::Signature);

impl SigningKey {
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::thread_rng()))
    }

    /// Parse the contents of a key file. Surrounding whitespace is ignored.
    pub fn from_hex(text: &str) -> Result<Self, SignatureError> {
        let secret: [u8; SECRET_LEN] = decode_fixed(text)?;
        Ok(Self(ed25519_dalek::SigningKey::from_bytes(&secret)))
    }

    /// Key file contents.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    pub fn sign_digest(&self, digest: &ContentId) -> Signature {
        Signature(self.0.sign(digest.as_bytes()))
    }
}

impl VerifyingKey {
    pub fn from_hex(text: &str) -> Result<Self, SignatureError> {
        let bytes: [u8; SECRET_LEN] = decode_fixed(text)?;
        ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| SignatureError::InvalidKey)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_bytes())
    }

    pub fn verify_digest(&self, digest: &ContentId, sig: &Signature) -> Result<(), SignatureError> {
        self.0
            .verify(digest.as_bytes(), &sig.0)
            .map_err(|_| SignatureError::Rejected)
    }
}

impl Signature {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }
}

impl FromStr for VerifyingKey {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; SIGNATURE_LEN] = decode_fixed(s)?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&bytes)))
    }
}

impl TryFrom<String> for Signature {
    type Error = SignatureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Signature> for String {
    fn from(sig: Signature) -> Self {
        sig.to_hex()
    }
}

fn decode_fixed<const N: usize>(text: &str) -> Result<[u8; N], SignatureError> {
    let bytes = hex::decode(text.trim())?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| SignatureError::WrongLength { expected: N, actual })
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

impl fmt::Display for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyingKey({self})")
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Signature({}..)", &hex[..16])
    }
}

/// Key or signature decoding and verification failures.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SignatureError {
    #[error("not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("bytes do not form an Ed25519 public key")]
    InvalidKey,
    #[error("signature rejected")]
    Rejected,
}

//! Cryptographic primitives for hotpatch.
//!
//! Provides domain-separated BLAKE3 hashing for class fingerprints and file
//! contents, MD5/SHA-256 integrity digests for finished patch containers,
//! and Ed25519 keys for patch signing.
//!
//! All crypto operations wrap established libraries.

pub mod digest;
pub mod hasher;
pub mod signer;

pub use digest::{ContainerDigests, MD5_HEX_LEN, SHA256_HEX_LEN};
pub use hasher::{ContentHasher, DomainHasher};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};

//! Patch generation orchestrator.
//!
//! A [`PatchGenerator`] runs one generation as a staged pipeline:
//! validate, parse both packages, diff code containers and file trees,
//! pack the selected artifacts, and optionally sign the result. Every run
//! ends in a [`GenerationResult`]; expected failures never panic.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hotpatch_core::{GeneratorConfig, Outcome, PatchGenerator};
//!
//! let config = GeneratorConfig::new("app-1.0.zip", "app-1.1.zip", "out/patch.zip");
//! let generator = PatchGenerator::new(config).unwrap();
//! let result = generator.generate();
//! match result.outcome {
//!     Outcome::Completed => println!("patch: {} bytes", result.patch_size),
//!     Outcome::NoChanges => println!("nothing to ship"),
//!     _ => std::process::exit(result.exit_code()),
//! }
//! ```
//!
//! # Key Types
//!
//! - [`GeneratorConfig`] / [`GeneratorSettings`] - immutable run description
//! - [`PatchGenerator`] - the pipeline, run inline or on tokio's blocking pool
//! - [`PackageParser`] / [`ArchiveParser`] - input packages to exploded trees
//! - [`GeneratorObserver`] - stage, progress, and completion callbacks
//! - [`PatchSigner`] / [`Ed25519Signer`] - in-place patch signatures
//! - [`GenerateError`] - stage errors mapped onto the error taxonomy

pub mod config;
pub mod error;
pub mod generator;
pub mod observer;
pub mod parser;
pub mod result;
pub mod signer;
pub mod state;
pub mod summary;

#[cfg(test)]
mod testutil;

pub use config::{GeneratorConfig, GeneratorSettings};
pub use error::{GenerateError, GenerateResult, ParseError, ParseResult, SignError};
pub use generator::PatchGenerator;
pub use observer::{
    ChannelObserver, GeneratorEvent, GeneratorObserver, NoopObserver, TracingObserver,
};
pub use parser::{ArchiveParser, PackageParser, ParsedPackage, PACKAGE_INFO};
pub use result::{GenerationResult, Outcome};
pub use signer::{
    canonical_digest, verify_container, Ed25519Signer, PatchSigner, SignatureRecord,
    SIGNATURE_ALGORITHM,
};
pub use state::{CancelToken, GeneratorState};
pub use summary::DiffReport;

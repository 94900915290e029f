//! Foundation types for hotpatch.
//!
//! This crate holds the identity, taxonomy, and summary types shared by every
//! stage of patch generation. Every other hotpatch crate depends on
//! `hotpatch-types`.
//!
//! # Key Types
//!
//! - [`ContentId`]: BLAKE3 digest of file content or class structure
//! - [`ErrorKind`]: Stable error taxonomy with numeric codes
//! - [`VersionInfo`]: Package name and version metadata of one input
//! - [`PatchMode`]: Class selection or byte-level delta
//! - [`EngineKind`]: Byte-diff engine selector
//! - [`PatchId`]: UUID v7 patch identifier
//! - [`ChangeSummary`]: Aggregated change counts for one run

pub mod content;
pub mod error;
pub mod identity;
pub mod kind;
pub mod mode;
pub mod summary;
pub mod version;

pub use content::ContentId;
pub use error::TypeError;
pub use identity::PatchId;
pub use kind::ErrorKind;
pub use mode::{EngineKind, PatchMode};
pub use summary::ChangeSummary;
pub use version::VersionInfo;

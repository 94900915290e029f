//! Byte-level diff engines for hotpatch.
//!
//! The byte-diff patch mode encodes each changed code container as a delta
//! against its base version. Engines implement [`ByteDiffEngine`]; the
//! in-process [`PrimaryEngine`] is always available, and an accelerated
//! engine may be registered by the embedder and picked by
//! [`EngineRegistry::select`].
//!
//! # Delta format
//!
//! `HPDL` magic, big-endian `u32` version, varint target length, big-endian
//! CRC32 of the target, then a zstd-compressed stream of copy/insert
//! commands.

pub mod engine;
pub mod error;
pub mod format;
pub mod primary;
pub mod registry;

pub use engine::{no_progress, ByteDiffEngine, EngineErrorCode, EngineOp, Progress};
pub use error::{EngineError, EngineResult};
pub use format::{Command, DeltaHeader};
pub use primary::PrimaryEngine;
pub use registry::EngineRegistry;

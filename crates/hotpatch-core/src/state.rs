use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Pipeline position of a generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum GeneratorState {
    Idle = 0,
    Validating = 1,
    Parsing = 2,
    Diffing = 3,
    Packing = 4,
    Signing = 5,
    Completed = 6,
    Failed = 7,
    Cancelled = 8,
}

impl GeneratorState {
    const ALL: [GeneratorState; 9] = [
        Self::Idle,
        Self::Validating,
        Self::Parsing,
        Self::Diffing,
        Self::Packing,
        Self::Signing,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    fn from_u8(value: u8) -> Self {
        Self::ALL
            .get(value as usize)
            .copied()
            .unwrap_or(Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Parsing => "parsing",
            Self::Diffing => "diffing",
            Self::Packing => "packing",
            Self::Signing => "signing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Stages that do work, as opposed to resting states.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Validating | Self::Parsing | Self::Diffing | Self::Packing | Self::Signing
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for GeneratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free cell holding a [`GeneratorState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(GeneratorState::Idle as u8))
    }

    pub(crate) fn get(&self) -> GeneratorState {
        GeneratorState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: GeneratorState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Cloneable handle to a generator's cancellation flag.
///
/// Setting the flag is all a caller does; the generator polls it between
/// stages.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

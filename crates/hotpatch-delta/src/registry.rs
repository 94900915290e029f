use std::sync::Arc;

use hotpatch_types::EngineKind;
use tracing::{info, warn};

use crate::engine::ByteDiffEngine;
use crate::error::{EngineError, EngineResult};
use crate::primary::PrimaryEngine;

/// Holds the available byte-diff engines and resolves an [`EngineKind`].
///
/// The primary engine is always present. An accelerated engine exists only
/// when the embedder registers one.
#[derive(Clone)]
pub struct EngineRegistry {
    primary: Arc<PrimaryEngine>,
    native: Option<Arc<dyn ByteDiffEngine>>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            primary: Arc::new(PrimaryEngine::new()),
            native: None,
        }
    }

    /// Register an accelerated engine.
    pub fn with_native(mut self, engine: Arc<dyn ByteDiffEngine>) -> Self {
        info!(engine = engine.name(), "registered accelerated byte-diff engine");
        self.native = Some(engine);
        self
    }

    fn primary(&self) -> Arc<dyn ByteDiffEngine> {
        self.primary.clone()
    }

    pub fn has_native(&self) -> bool {
        self.native.is_some()
    }

    /// Resolve `kind` to a concrete engine.
    ///
    /// `Auto` falls back to the primary engine when no accelerated engine is
    /// registered; `NativeAccelerated` does not.
    pub fn select(&self, kind: EngineKind) -> EngineResult<Arc<dyn ByteDiffEngine>> {
        match (kind, &self.native) {
            (EngineKind::Primary, _) => Ok(self.primary()),
            (EngineKind::Auto | EngineKind::NativeAccelerated, Some(native)) => Ok(native.clone()),
            (EngineKind::Auto, None) => {
                warn!("no accelerated byte-diff engine registered, using primary");
                Ok(self.primary())
            }
            (EngineKind::NativeAccelerated, None) => Err(EngineError::Unavailable(
                "no accelerated engine is registered".to_string(),
            )),
        }
    }

    /// Request cancellation on every engine.
    pub fn cancel_all(&self) {
        self.primary.cancel();
        if let Some(native) = &self.native {
            native.cancel();
        }
    }

    /// Clear cancellation on every engine.
    pub fn reset_all(&self) {
        self.primary.reset();
        if let Some(native) = &self.native {
            native.reset();
        }
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("native", &self.native.as_ref().map(|e| e.name()))
            .finish()
    }
}

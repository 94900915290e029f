use std::time::Duration;

use hotpatch_types::ErrorKind;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

use crate::result::GenerationResult;
use crate::state::GeneratorState;

/// Receives progress from a running generation.
///
/// Callbacks run synchronously on the generation thread and must not call
/// back into the generator other than through its cancel handle.
pub trait GeneratorObserver: Send + Sync {
    fn on_stage_started(&self, _stage: GeneratorState) {}

    fn on_stage_finished(&self, _stage: GeneratorState, _elapsed: Duration) {}

    /// `done` of `total` code containers compared.
    fn on_compare_progress(&self, _container: &str, _done: usize, _total: usize) {}

    fn on_complete(&self, _result: &GenerationResult) {}

    fn on_error(&self, _kind: ErrorKind, _message: &str) {}
}

pub struct NoopObserver;

impl GeneratorObserver for NoopObserver {}

/// Logs every callback through `tracing`.
pub struct TracingObserver;

impl GeneratorObserver for TracingObserver {
    fn on_stage_started(&self, stage: GeneratorState) {
        debug!(%stage, "stage started");
    }

    fn on_stage_finished(&self, stage: GeneratorState, elapsed: Duration) {
        debug!(%stage, elapsed_ms = elapsed.as_millis() as u64, "stage finished");
    }

    fn on_compare_progress(&self, container: &str, done: usize, total: usize) {
        debug!(container, done, total, "compared container");
    }

    fn on_complete(&self, result: &GenerationResult) {
        info!(
            outcome = ?result.outcome,
            changes = result.summary.total(),
            patch_size = result.patch_size,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "generation finished"
        );
    }

    fn on_error(&self, kind: ErrorKind, message: &str) {
        error!(%kind, error = message, "generation failed");
    }
}

/// One observer callback as a value.
#[derive(Clone, Debug)]
pub enum GeneratorEvent {
    StageStarted(GeneratorState),
    StageFinished {
        stage: GeneratorState,
        elapsed: Duration,
    },
    CompareProgress {
        container: String,
        done: usize,
        total: usize,
    },
    Complete(Box<GenerationResult>),
    Error {
        kind: ErrorKind,
        message: String,
    },
}

/// Forwards callbacks into an unbounded channel so another task can consume
/// them. Events sent after the receiver is dropped are discarded.
pub struct ChannelObserver {
    tx: UnboundedSender<GeneratorEvent>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<GeneratorEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: GeneratorEvent) {
        let _ = self.tx.send(event);
    }
}

impl GeneratorObserver for ChannelObserver {
    fn on_stage_started(&self, stage: GeneratorState) {
        self.send(GeneratorEvent::StageStarted(stage));
    }

    fn on_stage_finished(&self, stage: GeneratorState, elapsed: Duration) {
        self.send(GeneratorEvent::StageFinished { stage, elapsed });
    }

    fn on_compare_progress(&self, container: &str, done: usize, total: usize) {
        self.send(GeneratorEvent::CompareProgress {
            container: container.to_string(),
            done,
            total,
        });
    }

    fn on_complete(&self, result: &GenerationResult) {
        self.send(GeneratorEvent::Complete(Box::new(result.clone())));
    }

    fn on_error(&self, kind: ErrorKind, message: &str) {
        self.send(GeneratorEvent::Error {
            kind,
            message: message.to_string(),
        });
    }
}

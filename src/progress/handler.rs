//! Progress handler trait and events

use std::time::Duration;

/// Events emitted while an image is being built
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Build started
    Started { tag: String, total_instructions: usize },

    /// Docker began executing a Dockerfile instruction
    InstructionStarted {
        index: usize,
        total: usize,
        step: String,
        instruction: String,
    },

    /// A line of build output
    Output { line: String },

    /// Built image was inspected and checked against the recipe
    Verified { image_id: String },

    /// Build completed successfully
    Completed { tag: String, total_time: Duration },

    /// Build failed
    Failed { error: String },
}

/// Trait for handling progress events during a build
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

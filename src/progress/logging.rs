//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started {
                tag,
                total_instructions,
            } => {
                info!(tag = %tag, instructions = total_instructions, "Starting image build");
            }
            ProgressEvent::InstructionStarted {
                index,
                total,
                step,
                instruction,
            } => {
                info!(
                    step = %step,
                    progress = format!("{}/{}", index, total),
                    "{}",
                    instruction
                );
            }
            ProgressEvent::Output { line } => {
                debug!("{}", line);
            }
            ProgressEvent::Verified { image_id } => {
                debug!(image = %image_id, "Image matches recipe");
            }
            ProgressEvent::Completed { tag, total_time } => {
                info!(
                    tag = %tag,
                    total_time_ms = total_time.as_millis(),
                    "Image build complete"
                );
            }
            ProgressEvent::Failed { error } => {
                warn!(error = %error, "Image build failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_logging_all_events() {
        let handler = LoggingHandler;

        let events = vec![
            ProgressEvent::Started {
                tag: "analyst:dev".to_string(),
                total_instructions: 9,
            },
            ProgressEvent::InstructionStarted {
                index: 3,
                total: 9,
                step: "install-toolchain".to_string(),
                instruction: "RUN apt-get update".to_string(),
            },
            ProgressEvent::Output {
                line: "Successfully built abc".to_string(),
            },
            ProgressEvent::Verified {
                image_id: "sha256:abc".to_string(),
            },
            ProgressEvent::Completed {
                tag: "analyst:dev".to_string(),
                total_time: Duration::from_secs(30),
            },
            ProgressEvent::Failed {
                error: "Test error".to_string(),
            },
        ];

        for event in events {
            handler.on_progress(&event);
        }
    }
}

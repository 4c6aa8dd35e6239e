//! Terminal progress bar for interactive builds

use super::{ProgressEvent, ProgressHandler};
use indicatif::{ProgressBar, ProgressStyle};

pub struct ProgressBarHandler {
    bar: ProgressBar,
}

impl ProgressBarHandler {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}") {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar }
    }

    /// A bar when stderr is a terminal, `None` otherwise
    pub fn interactive() -> Option<Self> {
        atty::is(atty::Stream::Stderr).then(Self::new)
    }
}

impl Default for ProgressBarHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHandler for ProgressBarHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started {
                total_instructions, ..
            } => {
                self.bar.set_length(*total_instructions as u64);
                self.bar.set_position(0);
            }
            ProgressEvent::InstructionStarted {
                index, instruction, ..
            } => {
                self.bar.set_position(index.saturating_sub(1) as u64);
                self.bar.set_message(instruction.clone());
            }
            ProgressEvent::Output { .. } => self.bar.tick(),
            ProgressEvent::Verified { .. } => {}
            ProgressEvent::Completed { tag, .. } => {
                if let Some(len) = self.bar.length() {
                    self.bar.set_position(len);
                }
                self.bar.finish_with_message(format!("built {}", tag));
            }
            ProgressEvent::Failed { error } => {
                self.bar.abandon_with_message(error.clone());
            }
        }
    }
}

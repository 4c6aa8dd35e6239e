//! Progress reporting for image builds

mod bar;
mod handler;
mod logging;

pub use bar::ProgressBarHandler;
pub use handler::{NoOpHandler, ProgressEvent, ProgressHandler};
pub use logging::LoggingHandler;

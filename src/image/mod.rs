//! Container image builder
//!
//! Turns an [`ImageRecipe`] and a host directory into a Dockerfile, a staged
//! build context, per-step layer keys, and finally a verified image.

mod context;
mod docker;
mod dockerfile;
mod error;
mod layers;
mod recipe;
mod state;

pub use context::{stage_context, stage_to_bytes, stage_to_path, BuildContext};
pub use docker::{docker_available, verify_image, BuildReport, ImageBuilder, StepTracker};
pub use dockerfile::{render_dockerfile, Dockerfile, Instruction};
pub use error::{ContextError, ImageError};
pub use layers::{layer_keys, LayerKey};
pub use recipe::{BuildStep, ImageRecipe, LaunchCommand};
pub use state::BuildState;

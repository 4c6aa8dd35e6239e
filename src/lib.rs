//! analyst - data analyst agent service and its container image builder
//!
//! The service answers questions about uploaded files: a planner model writes
//! Python, each script runs in a throwaway Docker container, and an assembler
//! model shapes the results into the answer the question asked for. The image
//! builder produces the container the service is deployed in, from a typed
//! recipe and a validated build context.
//!
//! # Project Structure
//!
//! - [`agent`]: plan, execute and assemble pipeline
//! - [`llm`]: provider-independent chat client, backed by genai
//! - [`sandbox`]: script execution in Docker containers
//! - [`server`]: axum HTTP front end
//! - [`image`]: recipe, build state machine, context staging and Docker builds
//! - [`progress`]: build progress reporting
//! - [`cli`]: command-line arguments and output formatting
//!
//! # Example Usage
//!
//! ```no_run
//! use analyst::image::{render_dockerfile, BuildContext, ImageRecipe};
//! use std::path::Path;
//!
//! let recipe = ImageRecipe::default();
//! let context = BuildContext::resolve(Path::new("."), &recipe)?;
//! println!("{}", render_dockerfile(&recipe, &context));
//! # Ok::<(), analyst::image::ImageError>(())
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod image;
pub mod llm;
pub mod progress;
pub mod sandbox;
pub mod server;
pub mod util;

pub use agent::{AgentError, Analyst, FinalAnswer};
pub use config::{AgentConfig, ConfigError};
pub use image::{BuildContext, ImageBuilder, ImageError, ImageRecipe};
pub use llm::{BackendError, GenAIClient, LLMClient, MockLLMClient};
pub use sandbox::{DockerSandbox, MockScriptRunner, ScriptRunner};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

pub mod commands;
pub mod output;

pub use commands::{BuildArgs, CliArgs, Commands, HealthArgs, RecipeArgs, ServeArgs, StageArgs};
pub use output::{HealthStatus, OutputFormat, OutputFormatter};

use std::path::PathBuf;
use thiserror::Error;

/// Problems found while resolving a build context on the host
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Build context {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("Missing {role} '{path}' in build context")]
    MissingSource { role: &'static str, path: String },

    #[error("Launch target '{module}:{object}' cannot be loaded: {reason}")]
    LaunchTargetMissing {
        module: String,
        object: String,
        reason: String,
    },

    #[error("Invalid env file pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ContextError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ContextError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Build step '{step}' cannot run from state {from}")]
    OutOfOrder { from: String, step: String },

    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("Build failed at step '{step}': {message}")]
    BuildFailed { step: String, message: String },

    #[error("Built image does not match the recipe: {0}")]
    Verification(String),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("Script timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Failed to package script files: {0}")]
    Archive(#[source] std::io::Error),

    #[error("Sandbox error: {0}")]
    Other(String),
}

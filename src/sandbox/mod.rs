//! Isolated execution of generated Python scripts

mod docker;
mod error;
mod mock;

pub use docker::{DockerSandbox, SandboxSettings};
pub use error::SandboxError;
pub use mock::{MockRun, MockScriptRunner};

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

/// A request file made available to scripts in the working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub data: Bytes,
}

impl Attachment {
    /// Keeps only the final path component of `name`
    pub fn new(name: &str, data: impl Into<Bytes>) -> Self {
        let base = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("attachment")
            .to_string();
        Self {
            name: base,
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i64>,
}

impl ScriptOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// Stdout followed by stderr, as an interactive run would show it
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}{}", self.stdout, self.stderr)
        }
    }
}

/// Runs one script with the request's attachments
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, code: &str, attachments: &[Attachment]) -> Result<ScriptOutput, SandboxError>;

    /// Directory scripts should treat as their working directory
    fn workdir(&self) -> &str;

    fn name(&self) -> &str;
}

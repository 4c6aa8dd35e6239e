use crate::llm::BackendError;
use crate::sandbox::SandboxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{stage} request failed: {source}")]
    Llm {
        stage: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("Python block {index} ({filename}) failed: {source}")]
    Sandbox {
        index: usize,
        filename: String,
        #[source]
        source: SandboxError,
    },
}

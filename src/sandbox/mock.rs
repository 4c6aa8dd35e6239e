//! Scripted runner for tests

use super::{Attachment, SandboxError, ScriptOutput, ScriptRunner};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A recorded call to [`MockScriptRunner::run`]
#[derive(Debug, Clone)]
pub struct MockRun {
    pub code: String,
    pub attachments: Vec<String>,
}

#[derive(Clone)]
pub struct MockScriptRunner {
    outputs: Arc<Mutex<VecDeque<Result<ScriptOutput, String>>>>,
    runs: Arc<Mutex<Vec<MockRun>>>,
    workdir: String,
}

impl MockScriptRunner {
    pub fn new() -> Self {
        Self {
            outputs: Arc::new(Mutex::new(VecDeque::new())),
            runs: Arc::new(Mutex::new(Vec::new())),
            workdir: "/workspace".to_string(),
        }
    }

    pub fn add_output(&self, stdout: impl Into<String>) {
        self.push(Ok(ScriptOutput::success(stdout)));
    }

    pub fn add_error(&self, message: impl Into<String>) {
        self.push(Err(message.into()));
    }

    pub fn runs(&self) -> Vec<MockRun> {
        self.runs.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn push(&self, output: Result<ScriptOutput, String>) {
        if let Ok(mut queue) = self.outputs.lock() {
            queue.push_back(output);
        }
    }
}

impl Default for MockScriptRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScriptRunner for MockScriptRunner {
    async fn run(&self, code: &str, attachments: &[Attachment]) -> Result<ScriptOutput, SandboxError> {
        if let Ok(mut runs) = self.runs.lock() {
            runs.push(MockRun {
                code: code.to_string(),
                attachments: attachments.iter().map(|a| a.name.clone()).collect(),
            });
        }

        let next = self
            .outputs
            .lock()
            .map_err(|_| SandboxError::Other("mock output queue poisoned".to_string()))?
            .pop_front();

        match next {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(SandboxError::Other(message)),
            None => Err(SandboxError::Other("no mock output queued".to_string())),
        }
    }

    fn workdir(&self) -> &str {
        &self.workdir
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outputs_in_order() {
        let runner = MockScriptRunner::new();
        runner.add_output("first");
        runner.add_error("boom");

        assert_eq!(runner.run("a", &[]).await.unwrap().stdout, "first");
        assert!(runner.run("b", &[]).await.is_err());
        assert!(runner.run("c", &[]).await.is_err());

        let runs = runner.runs();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].code, "a");
    }

    #[tokio::test]
    async fn test_records_attachment_names() {
        let runner = MockScriptRunner::new();
        runner.add_output("{}");
        runner
            .run("print(1)", &[Attachment::new("data.csv", "a,b\n")])
            .await
            .unwrap();
        assert_eq!(runner.runs()[0].attachments, vec!["data.csv"]);
    }
}

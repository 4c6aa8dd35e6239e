//! Plan, execute, assemble

use super::answer::FinalAnswer;
use super::error::AgentError;
use super::plan::{merge_output, Plan};
use super::prompts::{chdir_prelude, planner_user, ASSEMBLER_SYSTEM, PLANNER_SYSTEM};
use crate::llm::{ChatMessage, LLMClient, LLMRequest};
use crate::sandbox::{Attachment, ScriptRunner};
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const PLAN_TEMPERATURE: f32 = 0.1;
const PLAN_MAX_TOKENS: u32 = 1200;
const ASSEMBLE_TEMPERATURE: f32 = 0.0;
const ASSEMBLE_MAX_TOKENS: u32 = 1000;

pub struct Analyst {
    llm: Arc<dyn LLMClient>,
    runner: Arc<dyn ScriptRunner>,
}

impl Analyst {
    pub fn new(llm: Arc<dyn LLMClient>, runner: Arc<dyn ScriptRunner>) -> Self {
        Self { llm, runner }
    }

    pub fn backend_name(&self) -> &str {
        self.llm.name()
    }

    pub fn runner_name(&self) -> &str {
        self.runner.name()
    }

    /// Answers one question using the attached files
    pub async fn answer(
        &self,
        question: &[u8],
        attachments: &[Attachment],
    ) -> Result<FinalAnswer, AgentError> {
        let start = Instant::now();
        let question = String::from_utf8_lossy(question);
        let workdir = self.runner.workdir();
        let files: Vec<String> = attachments.iter().map(|a| a.name.clone()).collect();

        info!(
            question_chars = question.len(),
            attachments = files.len(),
            backend = self.llm.name(),
            "Planning analysis"
        );

        let plan_request = LLMRequest::new(vec![
            ChatMessage::system(PLANNER_SYSTEM),
            ChatMessage::user(planner_user(&question, workdir, &files)),
        ])
        .with_temperature(PLAN_TEMPERATURE)
        .with_max_tokens(PLAN_MAX_TOKENS);

        let plan_reply = self
            .llm
            .chat(plan_request)
            .await
            .map_err(|source| AgentError::Llm {
                stage: "Planning",
                source,
            })?;
        let plan = Plan::parse(&plan_reply.content);

        let mut interim = Map::new();
        for (index, block) in plan.python_blocks.iter().enumerate() {
            debug!(block = index, filename = %block.filename, "Running Python block");
            let code = format!("{}{}", chdir_prelude(workdir), block.code);
            let output = self
                .runner
                .run(&code, attachments)
                .await
                .map_err(|source| AgentError::Sandbox {
                    index,
                    filename: block.filename.clone(),
                    source,
                })?;
            merge_output(&mut interim, index, &output);
        }

        info!(
            blocks = plan.python_blocks.len(),
            interim_keys = interim.len(),
            "Assembling answer"
        );

        let payload = json!({
            "question": question,
            "interim": interim,
            "expected_format": plan.final_format,
            "postprocess_instructions": plan.postprocess_instructions,
        });

        let assemble_request = LLMRequest::new(vec![
            ChatMessage::system(ASSEMBLER_SYSTEM),
            ChatMessage::user(payload.to_string()),
        ])
        .with_temperature(ASSEMBLE_TEMPERATURE)
        .with_max_tokens(ASSEMBLE_MAX_TOKENS);

        let final_reply = self
            .llm
            .chat(assemble_request)
            .await
            .map_err(|source| AgentError::Llm {
                stage: "Assembly",
                source,
            })?;

        let answer = FinalAnswer::from_reply(&final_reply.content);
        info!(
            json = answer.is_json(),
            elapsed_ms = start.elapsed().as_millis(),
            "Analysis complete"
        );
        Ok(answer)
    }
}

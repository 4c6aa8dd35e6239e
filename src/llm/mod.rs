//! LLM client abstraction layer
//!
//! The analyst talks to a chat-completion model twice per request: once to plan
//! the analysis and once to assemble the final answer. This module hides the
//! provider behind [`LLMClient`] so the pipeline can run against a mock in tests.

mod client;
mod error;
mod genai;
mod mock;
mod types;

pub use client::LLMClient;
pub use error::BackendError;
pub use genai::GenAIClient;
pub use mock::{MockLLMClient, MockResponse};
pub use types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};

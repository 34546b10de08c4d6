//! Language model abstractions.
//!
//! Defines the `LLM` trait the agent loop and the answer composers talk to, an
//! OpenAI-compatible HTTP client, and a decorator that bounds each call with a
//! timeout.

pub use crate::core_types::{LLMResponse, Message};
use crate::errors::AgentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub mod providers;

pub use providers::create_llm_client;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[async_trait]
pub trait LLM: Send + Sync {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AgentError>;
}

/// Fails a call with `AgentError::Timeout` when the wrapped model does not
/// answer in time.
#[derive(Clone)]
pub struct TimeoutLLM {
    inner: Arc<dyn LLM>,
    timeout: Duration,
}

impl TimeoutLLM {
    pub fn new(inner: Arc<dyn LLM>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl LLM for TimeoutLLM {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AgentError> {
        match tokio::time::timeout(self.timeout, self.inner.generate(messages, tools)).await {
            Ok(result) => result,
            Err(_) => {
                log::error!("Language model call exceeded {:?}", self.timeout);
                Err(AgentError::Timeout {
                    operation: "language model call".to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}

/// Single-shot prompt helper used by the answer composers.
pub async fn complete(llm: &dyn LLM, prompt: String) -> Result<String, AgentError> {
    let response = llm.generate(vec![Message::user(prompt)], None).await?;
    response
        .content
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| AgentError::UpstreamModel("model returned an empty completion".to_string()))
}

//! LLM provider implementations
//!
//! Every supported provider exposes the OpenAI chat-completions protocol, so
//! they differ only in base URL and the key they expect.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{LlmConfig, LlmProvider};
use crate::errors::AgentError;
use crate::llm::{TimeoutLLM, LLM};

pub mod openai;

pub use openai::OpenAIClient;

pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Base URL for the configured provider
pub fn api_base(provider: &LlmProvider) -> &str {
    match provider {
        LlmProvider::Groq => GROQ_API_BASE,
        LlmProvider::OpenAI => OPENAI_API_BASE,
        LlmProvider::Custom { base_url } => base_url,
    }
}

/// Create an LLM client based on the provider configuration, bounded by the
/// configured timeout
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LLM>, AgentError> {
    let client = openai::create_client(config, api_base(&config.provider))?;
    Ok(Arc::new(TimeoutLLM::new(
        client,
        Duration::from_secs(config.timeout_secs),
    )))
}

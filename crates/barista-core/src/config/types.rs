//! Configuration type definitions
//!
//! Every section has defaults, so an empty YAML document (or no file at all)
//! yields a runnable configuration. Secrets are referenced through `*_env`
//! fields and resolved by the loader.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AgentError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BaristaConfig {
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rag: RagSettings,
    #[serde(default)]
    pub outlets: OutletSettings,
    #[serde(default)]
    pub scraper: ScraperSettings,
    #[serde(default)]
    pub tools: ToolSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Replaces the built-in system instructions when set.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            max_tool_rounds: default_max_tool_rounds(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub parameters: ModelParameters,
    #[serde(default)]
    pub auth: LlmAuth,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            parameters: ModelParameters::default(),
            auth: LlmAuth::default(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// LLM provider types. All of them speak the OpenAI chat-completions protocol.
///
/// In YAML a provider is either a name (`groq`, `openai`) or a map
/// `custom: {base_url: ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(try_from = "ProviderRepr", into = "ProviderRepr")]
pub enum LlmProvider {
    #[default]
    Groq,
    OpenAI,
    Custom {
        base_url: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ProviderRepr {
    Named(String),
    Custom { custom: CustomEndpoint },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CustomEndpoint {
    base_url: String,
}

impl TryFrom<ProviderRepr> for LlmProvider {
    type Error = String;

    fn try_from(repr: ProviderRepr) -> Result<Self, Self::Error> {
        match repr {
            ProviderRepr::Named(name) => match name.to_ascii_lowercase().as_str() {
                "groq" => Ok(LlmProvider::Groq),
                "openai" => Ok(LlmProvider::OpenAI),
                "custom" => Err("the custom provider needs a base_url: use `custom: {base_url: ...}`".to_string()),
                other => Err(format!(
                    "unknown LLM provider '{}', expected groq, openai or custom",
                    other
                )),
            },
            ProviderRepr::Custom { custom } => Ok(LlmProvider::Custom {
                base_url: custom.base_url,
            }),
        }
    }
}

impl From<LlmProvider> for ProviderRepr {
    fn from(provider: LlmProvider) -> Self {
        match provider {
            LlmProvider::Groq => ProviderRepr::Named("groq".to_string()),
            LlmProvider::OpenAI => ProviderRepr::Named("openai".to_string()),
            LlmProvider::Custom { base_url } => ProviderRepr::Custom {
                custom: CustomEndpoint { base_url },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAuth {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: Option<String>,
}

impl Default for LlmAuth {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_llm_key_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagSettings {
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            embeddings: EmbeddingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub auth: EmbeddingAuth,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            base_url: None,
            auth: EmbeddingAuth::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Offline token-hashing embeddings.
    #[default]
    Hashed,
    OpenAI,
    HuggingFace,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmbeddingAuth {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutletSettings {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

impl Default for OutletSettings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            max_rows: default_max_rows(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperSettings {
    #[serde(default = "default_products_url")]
    pub products_url: String,
    #[serde(default = "default_outlets_url")]
    pub outlets_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_scrape_timeout")]
    pub timeout_secs: u64,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            products_url: default_products_url(),
            outlets_url: default_outlets_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_scrape_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors_origins: default_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "barista".to_string()
}

fn default_max_tool_rounds() -> usize {
    3
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_llm_key_env() -> Option<String> {
    Some("GROQ_API_KEY".to_string())
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/product_index.json")
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_top_k() -> usize {
    3
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/outlets.db")
}

fn default_max_rows() -> usize {
    50
}

fn default_products_url() -> String {
    "https://shop.zuscoffee.com/collections/drinkware".to_string()
}

fn default_outlets_url() -> String {
    "https://zuscoffee.com/category/store/kuala-lumpur-selangor/".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

fn default_scrape_timeout() -> u64 {
    30
}

fn default_tool_timeout() -> u64 {
    45
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_cors_origins() -> Vec<String> {
    [
        "http://localhost:3000",
        "http://localhost:5173",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:5173",
        "null",
    ]
    .iter()
    .map(|origin| origin.to_string())
    .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BaristaConfig {
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.agent.max_tool_rounds == 0 {
            return Err(AgentError::ConfigError(
                "agent.max_tool_rounds must be greater than 0".to_string(),
            ));
        }

        if self.llm.model.trim().is_empty() {
            return Err(AgentError::ConfigError("LLM model cannot be empty".to_string()));
        }
        if let LlmProvider::Custom { base_url } = &self.llm.provider {
            if base_url.trim().is_empty() {
                return Err(AgentError::ConfigError(
                    "Custom provider requires a valid 'base_url'".to_string(),
                ));
            }
        }
        if self.llm.timeout_secs == 0 || self.tools.timeout_secs == 0 {
            return Err(AgentError::ConfigError(
                "timeouts must be greater than 0 seconds".to_string(),
            ));
        }

        if self.rag.chunk_size == 0 {
            return Err(AgentError::ConfigError(
                "RAG chunk size must be greater than 0".to_string(),
            ));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(AgentError::ConfigError(format!(
                "RAG chunk overlap ({}) must be smaller than the chunk size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if self.rag.top_k == 0 {
            return Err(AgentError::ConfigError(
                "RAG top_k must be greater than 0".to_string(),
            ));
        }
        if self.rag.embeddings.dimension == 0 {
            return Err(AgentError::ConfigError(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }

        if self.outlets.max_rows == 0 {
            return Err(AgentError::ConfigError(
                "outlets.max_rows must be greater than 0".to_string(),
            ));
        }

        for (field, url) in [
            ("scraper.products_url", &self.scraper.products_url),
            ("scraper.outlets_url", &self.scraper.outlets_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AgentError::ConfigError(format!(
                    "{} must be an http(s) URL, got '{}'",
                    field, url
                )));
            }
        }

        self.server.bind_addr.parse::<SocketAddr>().map_err(|e| {
            AgentError::ConfigError(format!(
                "Invalid server.bind_addr '{}': {}",
                self.server.bind_addr, e
            ))
        })?;

        Ok(())
    }
}

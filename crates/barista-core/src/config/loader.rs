//! Configuration loader for YAML files and environment resolution

use crate::config::types::*;
use crate::errors::AgentError;
use std::env;
use std::path::Path;
use tokio::fs;

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<BaristaConfig, AgentError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            AgentError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Load the file when it exists, otherwise start from the built-in defaults.
    pub async fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<BaristaConfig, AgentError> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            return Self::from_file(path).await;
        }

        log::info!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        let mut config = BaristaConfig::default();
        Self::resolve_environment(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<BaristaConfig, AgentError> {
        let mut config: BaristaConfig = if content.trim().is_empty() {
            BaristaConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                AgentError::ConfigError(format!("Failed to parse YAML config: {}", e))
            })?
        };

        Self::resolve_environment(&mut config);
        config.validate()?;

        Ok(config)
    }

    fn resolve_environment(config: &mut BaristaConfig) {
        // A missing .env file is the normal case in deployments.
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }

        Self::resolve_llm_auth(&mut config.llm.auth);
        Self::resolve_embedding_auth(&config.rag.embeddings.provider, &mut config.rag.embeddings.auth);
    }

    /// Resolve LLM authentication from environment
    fn resolve_llm_auth(auth: &mut LlmAuth) {
        if auth.api_key.is_some() {
            return;
        }
        if let Some(env_var) = &auth.api_key_env {
            if let Ok(api_key) = env::var(env_var) {
                auth.api_key = Some(api_key);
            }
        }
    }

    /// Resolve embedding authentication from environment
    fn resolve_embedding_auth(provider: &EmbeddingProvider, auth: &mut EmbeddingAuth) {
        if auth.api_key.is_some() {
            return;
        }
        let fallback = match provider {
            EmbeddingProvider::Hashed => return,
            EmbeddingProvider::OpenAI => "OPENAI_API_KEY",
            EmbeddingProvider::HuggingFace => "HUGGINGFACE_API_KEY",
        };
        let env_var = auth.api_key_env.as_deref().unwrap_or(fallback);
        if let Ok(api_key) = env::var(env_var) {
            auth.api_key = Some(api_key);
        }
    }
}

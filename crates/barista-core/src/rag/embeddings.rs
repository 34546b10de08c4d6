use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::errors::AgentError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

pub const OPENAI_EMBEDDINGS_BASE: &str = "https://api.openai.com/v1";
pub const HUGGINGFACE_INFERENCE_BASE: &str = "https://api-inference.huggingface.co";

#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, AgentError>;

    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AgentError> {
        let mut embeddings = Vec::new();
        for text in texts {
            let embedding = self.generate_embedding(text).await?;
            embeddings.push(embedding);
        }
        Ok(embeddings)
    }

    fn embedding_dimension(&self) -> usize;

    /// Identifies the embedding space; snapshots built under another model are rejected.
    fn model_name(&self) -> String;
}

/// Offline embeddings from hashed word and word-pair features.
///
/// Each lowercase token and each adjacent token pair is hashed with SHA-256
/// into one of `dimension` buckets with a hash-derived sign, then the vector is
/// L2-normalised. Texts sharing vocabulary land close together, which is enough
/// for keyword-heavy product listings and keeps the index reproducible across
/// builds and platforms.
pub struct HashedEmbeddingGenerator {
    embedding_dimension: usize,
}

impl HashedEmbeddingGenerator {
    pub fn new() -> Self {
        Self {
            embedding_dimension: 384,
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            embedding_dimension: dimension.max(1),
        }
    }

    fn accumulate(&self, embedding: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(bytes);
        let bucket = (hash % self.embedding_dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        embedding[bucket] += sign * weight;
    }
}

impl Default for HashedEmbeddingGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

#[async_trait]
impl EmbeddingGenerator for HashedEmbeddingGenerator {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, AgentError> {
        let tokens = tokenize(text);
        let mut embedding = vec![0.0; self.embedding_dimension];

        for token in &tokens {
            self.accumulate(&mut embedding, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&mut embedding, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }

        Ok(embedding)
    }

    fn embedding_dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> String {
        format!("hashed-{}", self.embedding_dimension)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

#[derive(Debug, Clone)]
pub struct RestEmbeddingConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub model_name: String,
    pub embedding_dimension: usize,
    pub timeout_seconds: u64,
    pub max_batch_size: usize,
    pub provider: EmbeddingProvider,
}

/// Embedding client for hosted OpenAI and HuggingFace inference endpoints
pub struct RestEmbeddingClient {
    client: Client,
    config: RestEmbeddingConfig,
}

impl RestEmbeddingClient {
    pub fn new(config: RestEmbeddingConfig) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AgentError::RagError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn api_key(&self) -> Result<&str, AgentError> {
        self.config.api_key.as_deref().ok_or_else(|| {
            AgentError::ConfigError(format!(
                "{:?} embeddings require an API key",
                self.config.provider
            ))
        })
    }

    async fn call_openai_api(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AgentError> {
        let url = format!("{}/embeddings", self.config.api_base_url);
        let payload = json!({
            "model": self.config.model_name,
            "input": texts,
            "encoding_format": "float"
        });

        let response_text = self.post(&url, &payload).await?;
        let response_data: OpenAIEmbeddingResponse =
            serde_json::from_str(&response_text).map_err(|e| {
                AgentError::RagError(format!("Failed to parse OpenAI embeddings response: {}", e))
            })?;

        let mut items = response_data.data;
        items.sort_by_key(|item| item.index);
        Ok(items.into_iter().map(|item| item.embedding).collect())
    }

    async fn call_huggingface_api(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AgentError> {
        let url = format!(
            "{}/pipeline/feature-extraction/{}",
            self.config.api_base_url, self.config.model_name
        );
        let payload = json!({
            "inputs": texts,
            "options": {
                "wait_for_model": true
            }
        });

        let response_text = self.post(&url, &payload).await?;
        serde_json::from_str(&response_text).map_err(|e| {
            AgentError::RagError(format!(
                "Failed to parse HuggingFace embeddings response: {}",
                e
            ))
        })
    }

    async fn post(&self, url: &str, payload: &serde_json::Value) -> Result<String, AgentError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key()?)
            .json(payload)
            .send()
            .await
            .map_err(|e| AgentError::RagError(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| AgentError::RagError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            log::error!("Embedding API error response: {}", response_text);
            return Err(AgentError::RagError(format!(
                "Embedding API error ({}): {}",
                status, response_text
            )));
        }
        Ok(response_text)
    }
}

#[async_trait]
impl EmbeddingGenerator for RestEmbeddingClient {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, AgentError> {
        let embeddings = self.generate_embeddings(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::RagError("No embedding returned from API".to_string()))
    }

    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AgentError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        log::info!(
            "Generating embeddings for {} texts using {:?} provider",
            texts.len(),
            self.config.provider
        );

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.max_batch_size.max(1)) {
            let batch_embeddings = match self.config.provider {
                EmbeddingProvider::OpenAI => self.call_openai_api(batch).await?,
                EmbeddingProvider::HuggingFace => self.call_huggingface_api(batch).await?,
                EmbeddingProvider::Hashed => {
                    return Err(AgentError::ConfigError(
                        "hashed embeddings are computed locally".to_string(),
                    ))
                }
            };
            if batch_embeddings.len() != batch.len() {
                return Err(AgentError::RagError(format!(
                    "Mismatch between input texts ({}) and returned embeddings ({})",
                    batch.len(),
                    batch_embeddings.len()
                )));
            }
            all_embeddings.extend(batch_embeddings);
        }

        if let Some(wrong) = all_embeddings
            .iter()
            .find(|e| e.len() != self.config.embedding_dimension)
        {
            return Err(AgentError::RagError(format!(
                "Embedding dimension mismatch: configured {}, received {}",
                self.config.embedding_dimension,
                wrong.len()
            )));
        }

        Ok(all_embeddings)
    }

    fn embedding_dimension(&self) -> usize {
        self.config.embedding_dimension
    }

    fn model_name(&self) -> String {
        self.config.model_name.clone()
    }
}

#[derive(Debug, serde::Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingItem>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAIEmbeddingItem {
    embedding: Vec<f32>,
    index: usize,
}

/// Builds the embedding generator selected in configuration
pub fn create_embedding_generator(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingGenerator>, AgentError> {
    let default_base = match config.provider {
        EmbeddingProvider::Hashed => {
            return Ok(Arc::new(HashedEmbeddingGenerator::with_dimension(
                config.dimension,
            )))
        }
        EmbeddingProvider::OpenAI => OPENAI_EMBEDDINGS_BASE,
        EmbeddingProvider::HuggingFace => HUGGINGFACE_INFERENCE_BASE,
    };

    let client = RestEmbeddingClient::new(RestEmbeddingConfig {
        api_base_url: config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base.to_string())
            .trim_end_matches('/')
            .to_string(),
        api_key: config.auth.api_key.clone(),
        model_name: config.model.clone(),
        embedding_dimension: config.dimension,
        timeout_seconds: 30,
        max_batch_size: 64,
        provider: config.provider.clone(),
    })?;
    client.api_key()?;
    Ok(Arc::new(client))
}

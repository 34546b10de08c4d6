//! Retrieval over the drinkware catalogue
//!
//! Product listings are split into chunks, embedded and held in an in-memory
//! vector index that is persisted as a JSON snapshot. Questions are answered by
//! retrieving the closest chunks and handing them to the language model as the
//! only permitted context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

pub mod answer;
pub mod embeddings;
pub mod index;
pub mod splitter;
pub mod vector_store;

pub use answer::{ProductAnswer, ProductQa, RagAnswerer};
pub use embeddings::*;
pub use index::{ProductIndex, RagDocument};
pub use splitter::TextSplitter;
pub use vector_store::*;

/// A retrieved chunk of product text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    pub source: String,
    pub score: f32,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// The `k` passages most relevant to `text`, most relevant first.
    /// Identical index state gives identical results.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<Passage>, AgentError>;
}

/// Joins passages into the single context block given to the model.
pub fn format_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|passage| passage.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

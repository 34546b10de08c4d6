use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::AgentError;
use crate::rag::embeddings::cosine_similarity;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub document_id: usize,
    pub score: f32,
}

impl SearchResult {
    pub fn new(document_id: usize, score: f32) -> Self {
        Self { document_id, score }
    }
}

pub trait VectorStore: Send + Sync {
    fn add_document(&mut self, document_id: usize, embedding: Vec<f32>) -> Result<(), AgentError>;

    fn add_documents(&mut self, documents: Vec<(usize, Vec<f32>)>) -> Result<(), AgentError> {
        for (doc_id, embedding) in documents {
            self.add_document(doc_id, embedding)?;
        }
        Ok(())
    }

    /// The `top_k` most similar documents, best first. Ties keep id order.
    fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>, AgentError>;

    fn document_count(&self) -> usize;

    fn embedding_dimension(&self) -> Option<usize>;
}

/// Exhaustive cosine-similarity search over embeddings held in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryVectorStore {
    embeddings: BTreeMap<usize, Vec<f32>>,
    embedding_dimension: Option<usize>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embedding(&self, document_id: usize) -> Option<&[f32]> {
        self.embeddings.get(&document_id).map(Vec::as_slice)
    }
}

impl VectorStore for InMemoryVectorStore {
    fn add_document(&mut self, document_id: usize, embedding: Vec<f32>) -> Result<(), AgentError> {
        if let Some(expected_dim) = self.embedding_dimension {
            if embedding.len() != expected_dim {
                return Err(AgentError::RagError(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    expected_dim,
                    embedding.len()
                )));
            }
        } else {
            self.embedding_dimension = Some(embedding.len());
        }

        self.embeddings.insert(document_id, embedding);
        Ok(())
    }

    fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>, AgentError> {
        if self.embeddings.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(expected_dim) = self.embedding_dimension {
            if query_embedding.len() != expected_dim {
                return Err(AgentError::RagError(format!(
                    "Query embedding dimension mismatch: expected {}, got {}",
                    expected_dim,
                    query_embedding.len()
                )));
            }
        }

        let mut results: Vec<SearchResult> = self
            .embeddings
            .iter()
            .map(|(doc_id, embedding)| {
                SearchResult::new(*doc_id, cosine_similarity(query_embedding, embedding))
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        results.truncate(top_k);
        Ok(results)
    }

    fn document_count(&self) -> usize {
        self.embeddings.len()
    }

    fn embedding_dimension(&self) -> Option<usize> {
        self.embedding_dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_vector_store() {
        let mut store = InMemoryVectorStore::new();

        store.add_document(1, vec![1.0, 0.0, 0.0]).unwrap();
        store.add_document(2, vec![0.0, 1.0, 0.0]).unwrap();
        store.add_document(3, vec![0.0, 0.0, 1.0]).unwrap();

        assert_eq!(store.document_count(), 3);
        assert_eq!(store.embedding_dimension(), Some(3));

        let results = store.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document_id, 1);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_vector_store_dimension_validation() {
        let mut store = InMemoryVectorStore::new();
        store.add_document(1, vec![1.0, 0.0, 0.0]).unwrap();

        assert!(store.add_document(2, vec![1.0, 0.0]).is_err());
        assert!(store.search(&[1.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_search_empty_store() {
        let store = InMemoryVectorStore::new();
        assert!(store.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_ties_keep_id_order() {
        let mut store = InMemoryVectorStore::new();
        store
            .add_documents(vec![
                (7, vec![0.0, 1.0]),
                (2, vec![0.0, 1.0]),
                (5, vec![1.0, 0.0]),
            ])
            .unwrap();

        let ids: Vec<usize> = store
            .search(&[0.0, 1.0], 3)
            .unwrap()
            .into_iter()
            .map(|r| r.document_id)
            .collect();
        assert_eq!(ids, vec![2, 7, 5]);
    }

    #[test]
    fn test_serde_round_trip_preserves_search() {
        let mut store = InMemoryVectorStore::new();
        store.add_document(0, vec![0.6, 0.8]).unwrap();
        let json = serde_json::to_string(&store).unwrap();
        let restored: InMemoryVectorStore = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.embedding(0), Some(&[0.6, 0.8][..]));
        assert_eq!(restored.embedding_dimension(), Some(2));
    }
}

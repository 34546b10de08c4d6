use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::errors::AgentError;
use crate::persist;
use crate::rag::embeddings::EmbeddingGenerator;
use crate::rag::splitter::TextSplitter;
use crate::rag::vector_store::{InMemoryVectorStore, VectorStore};
use crate::rag::{Passage, Retriever};
use crate::scrape::ProductSource;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagDocument {
    pub content: String,
    pub source: String,
    pub chunk_index: usize,
}

#[derive(Serialize, Deserialize)]
struct IndexSnapshot {
    version: u32,
    built_at: DateTime<Utc>,
    embedding_model: String,
    embedding_dimension: usize,
    entries: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    #[serde(flatten)]
    document: RagDocument,
    embedding: Vec<f32>,
}

/// Vector index over chunked product listings.
///
/// Immutable once built; a refresh builds a new index and replaces the
/// snapshot file atomically.
pub struct ProductIndex {
    store: InMemoryVectorStore,
    documents: Vec<RagDocument>,
    embedder: Arc<dyn EmbeddingGenerator>,
    built_at: DateTime<Utc>,
}

impl ProductIndex {
    /// Splits and embeds product listings. Fails when nothing indexable remains.
    pub async fn build(
        listings: &[String],
        splitter: &TextSplitter,
        embedder: Arc<dyn EmbeddingGenerator>,
    ) -> Result<Self, AgentError> {
        let mut documents = Vec::new();
        for (listing_no, listing) in listings.iter().enumerate() {
            for (chunk_index, chunk) in splitter.split_text(listing).into_iter().enumerate() {
                documents.push(RagDocument {
                    content: chunk,
                    source: format!("listing-{}", listing_no),
                    chunk_index,
                });
            }
        }
        if documents.is_empty() {
            return Err(AgentError::RagError(
                "no product text to index".to_string(),
            ));
        }

        let chunks: Vec<String> = documents.iter().map(|doc| doc.content.clone()).collect();
        let embeddings = embedder.generate_embeddings(&chunks).await?;
        if embeddings.len() != documents.len() {
            return Err(AgentError::RagError(format!(
                "expected {} embeddings, got {}",
                documents.len(),
                embeddings.len()
            )));
        }

        let mut store = InMemoryVectorStore::new();
        store.add_documents(embeddings.into_iter().enumerate().collect())?;
        log::info!(
            "Built product index: {} listings, {} chunks, model {}",
            listings.len(),
            documents.len(),
            embedder.model_name()
        );

        Ok(Self {
            store,
            documents,
            embedder,
            built_at: Utc::now(),
        })
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn documents(&self) -> &[RagDocument] {
        &self.documents
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Writes the snapshot to `path`, replacing any previous one atomically.
    pub async fn save(&self, path: &Path) -> Result<(), AgentError> {
        let entries = self
            .documents
            .iter()
            .enumerate()
            .map(|(id, document)| {
                let embedding = self.store.embedding(id).ok_or_else(|| {
                    AgentError::InternalError(format!("chunk {} has no embedding", id))
                })?;
                Ok(SnapshotEntry {
                    document: document.clone(),
                    embedding: embedding.to_vec(),
                })
            })
            .collect::<Result<Vec<_>, AgentError>>()?;

        let snapshot = IndexSnapshot {
            version: SNAPSHOT_VERSION,
            built_at: self.built_at,
            embedding_model: self.embedder.model_name(),
            embedding_dimension: self.embedder.embedding_dimension(),
            entries,
        };
        let json = serde_json::to_vec(&snapshot)
            .map_err(|e| AgentError::RagError(format!("Failed to serialize index: {}", e)))?;

        persist::write_atomically(path, &json).await?;
        log::info!("Saved product index to {}", path.display());
        Ok(())
    }

    /// Loads a snapshot built with the same embedding model and dimension.
    pub async fn load(
        path: &Path,
        embedder: Arc<dyn EmbeddingGenerator>,
    ) -> Result<Self, AgentError> {
        let json = tokio::fs::read(path).await.map_err(|e| {
            AgentError::RagError(format!(
                "Failed to read index snapshot {}: {}",
                path.display(),
                e
            ))
        })?;
        let snapshot: IndexSnapshot = serde_json::from_slice(&json)
            .map_err(|e| AgentError::RagError(format!("Corrupt index snapshot: {}", e)))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(AgentError::RagError(format!(
                "Unsupported index snapshot version {}",
                snapshot.version
            )));
        }
        if snapshot.embedding_model != embedder.model_name()
            || snapshot.embedding_dimension != embedder.embedding_dimension()
        {
            return Err(AgentError::RagError(format!(
                "Index was built with {} ({} dims) but {} ({} dims) is configured",
                snapshot.embedding_model,
                snapshot.embedding_dimension,
                embedder.model_name(),
                embedder.embedding_dimension()
            )));
        }
        if snapshot.entries.is_empty() {
            return Err(AgentError::RagError("Index snapshot is empty".to_string()));
        }

        let mut store = InMemoryVectorStore::new();
        let mut documents = Vec::with_capacity(snapshot.entries.len());
        for (id, entry) in snapshot.entries.into_iter().enumerate() {
            store.add_document(id, entry.embedding)?;
            documents.push(entry.document);
        }
        log::info!(
            "Loaded product index from {} ({} chunks)",
            path.display(),
            documents.len()
        );

        Ok(Self {
            store,
            documents,
            embedder,
            built_at: snapshot.built_at,
        })
    }

    /// Loads the snapshot at `path`, or scrapes, builds and saves one when it
    /// is absent or unusable.
    pub async fn ensure_ready(
        path: &Path,
        source: &dyn ProductSource,
        splitter: &TextSplitter,
        embedder: Arc<dyn EmbeddingGenerator>,
    ) -> Result<Self, AgentError> {
        if persist::exists(path).await {
            match Self::load(path, embedder.clone()).await {
                Ok(index) => return Ok(index),
                Err(err) => log::warn!("Rebuilding product index: {}", err),
            }
        } else {
            log::info!("No product index at {}, building one", path.display());
        }
        Self::rebuild(path, source, splitter, embedder).await
    }

    /// Scrapes fresh listings and replaces the snapshot at `path`.
    pub async fn rebuild(
        path: &Path,
        source: &dyn ProductSource,
        splitter: &TextSplitter,
        embedder: Arc<dyn EmbeddingGenerator>,
    ) -> Result<Self, AgentError> {
        let listings = source.fetch_products().await?;
        if listings.is_empty() {
            return Err(AgentError::ScrapeFailure(
                "no products were found".to_string(),
            ));
        }
        let index = Self::build(&listings, splitter, embedder).await?;
        index.save(path).await?;
        Ok(index)
    }
}

#[async_trait]
impl Retriever for ProductIndex {
    async fn query(&self, text: &str, k: usize) -> Result<Vec<Passage>, AgentError> {
        let query_embedding = self.embedder.generate_embedding(text).await?;
        let hits = self.store.search(&query_embedding, k)?;
        log::debug!("Retrieved {} passages for '{}'", hits.len(), text);

        hits.into_iter()
            .map(|hit| {
                let document = self.documents.get(hit.document_id).ok_or_else(|| {
                    AgentError::InternalError(format!("unknown chunk {}", hit.document_id))
                })?;
                Ok(Passage {
                    content: document.content.clone(),
                    source: document.source.clone(),
                    score: hit.score,
                })
            })
            .collect()
    }
}

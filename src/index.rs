//! Vector index facade over a [`VectorDb`] and an [`EmbeddingProvider`].

use crate::document::Document;
use crate::embedding::{Embedding, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::vectordb::{IndexEntry, VectorDb};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Metadata key the chunk text is stored under when contents are included.
///
/// Reserved only in that mode; otherwise a chunk's own `content` metadata is
/// stored and returned untouched.
pub const CONTENT_KEY: &str = "content";

const DEFAULT_BATCH_SIZE: usize = 32;

/// A stored chunk matched by [`Index::query`]
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityResult {
    pub id: String,
    pub score: f32,
    pub content: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl SimilarityResult {
    /// Stored chunk text, or an empty string when contents were not stored
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

pub struct Index {
    db: Arc<dyn VectorDb>,
    embedder: Arc<dyn EmbeddingProvider>,
    dimension: usize,
    include_contents: bool,
    batch_size: usize,
}

impl Index {
    /// Build an index whose vectors must have `dimension` components.
    ///
    /// Fails if the embedding provider produces vectors of another length.
    pub fn new(
        db: Arc<dyn VectorDb>,
        embedder: Arc<dyn EmbeddingProvider>,
        dimension: usize,
    ) -> Result<Self> {
        if embedder.dimension() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: embedder.dimension(),
            });
        }

        Ok(Index {
            db,
            embedder,
            dimension,
            include_contents: false,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Store each chunk's text alongside its vector
    pub fn with_include_contents(mut self, include_contents: bool) -> Self {
        self.include_contents = include_contents;
        self
    }

    /// Number of chunks embedded and upserted per request
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// True when the namespace holds no entries. Creates the index if missing.
    pub async fn is_empty(&self) -> Result<bool> {
        self.db.ensure_index().await?;
        let count = self.db.count().await?;
        debug!("Index holds {} entries", count);
        Ok(count == 0)
    }

    /// Embed and upsert every chunk under a freshly generated id.
    ///
    /// Entries are never deduplicated, so this is meant to be called on an
    /// empty index only.
    pub async fn load_from_documents(&self, chunks: &[Document]) -> Result<()> {
        self.db.ensure_index().await?;

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(RagError::provider(
                    "embedding",
                    format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        embeddings.len()
                    ),
                ));
            }

            let entries = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, vector)| -> Result<IndexEntry> {
                    self.check_dimension(&vector)?;
                    Ok(IndexEntry {
                        id: Uuid::new_v4().to_string(),
                        vector,
                        metadata: self.entry_metadata(chunk),
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            self.db.upsert(entries).await?;
        }

        info!("Loaded {} chunks into the index", chunks.len());
        Ok(())
    }

    /// The `top_k` entries most similar to `text`, best first
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<SimilarityResult>> {
        if top_k == 0 {
            return Err(RagError::Config("top_k must be at least 1".to_string()));
        }

        let vector = self.embedder.embed_query(text).await?;
        self.check_dimension(&vector)?;

        let mut results: Vec<SimilarityResult> = self
            .db
            .search(&vector, top_k)
            .await?
            .into_iter()
            .map(|entry| {
                let mut metadata = entry.metadata;
                let content = if self.include_contents {
                    metadata.remove(CONTENT_KEY)
                } else {
                    None
                };
                SimilarityResult {
                    id: entry.id,
                    score: entry.score,
                    content,
                    metadata,
                }
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

    fn entry_metadata(&self, chunk: &Document) -> HashMap<String, String> {
        let mut metadata = chunk.metadata.clone();
        if self.include_contents {
            metadata.insert(CONTENT_KEY.to_string(), chunk.content.clone());
        }
        metadata
    }

    fn check_dimension(&self, vector: &Embedding) -> Result<()> {
        if vector.dimension() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.dimension(),
            });
        }
        Ok(())
    }
}

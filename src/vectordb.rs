use crate::embedding::Embedding;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// A vector stored in the database
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Embedding,
    pub metadata: HashMap<String, String>,
}

/// A stored entry matched by a query, as returned by the database
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub id: String,
    pub score: f32,
    pub metadata: HashMap<String, String>,
}

/// Storage backend for the index.
///
/// Implementations scope every operation to the namespace they were built with.
#[async_trait]
pub trait VectorDb: Send + Sync {
    /// Create the index or collection if it does not exist yet
    async fn ensure_index(&self) -> Result<()>;

    /// Number of entries stored in the namespace
    async fn count(&self) -> Result<u64>;

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Up to `top_k` entries nearest to `vector`, best match first
    async fn search(&self, vector: &Embedding, top_k: usize) -> Result<Vec<ScoredEntry>>;
}

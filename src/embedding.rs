use crate::error::{RagError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Embedding { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Embedding { values }
    }
}

/// Maps text to fixed-dimension vectors.
///
/// `embed` returns exactly one embedding per input text, in input order.
/// Retries and rate limiting belong to the concrete client, not to callers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;

    /// Embed a single text
    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::provider("embedding", "no embedding returned for query"))
    }
}

/// Checks a provider response against the request size and the expected dimension
pub(crate) fn check_batch(
    provider: &str,
    embeddings: &[Embedding],
    expected_count: usize,
    expected_dimension: usize,
) -> Result<()> {
    if embeddings.len() != expected_count {
        return Err(RagError::provider(
            provider,
            format!(
                "expected {} embeddings, got {}",
                expected_count,
                embeddings.len()
            ),
        ));
    }

    if let Some(bad) = embeddings
        .iter()
        .find(|e| e.dimension() != expected_dimension)
    {
        return Err(RagError::DimensionMismatch {
            expected: expected_dimension,
            actual: bad.dimension(),
        });
    }

    Ok(())
}

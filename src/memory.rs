//! In-process vector database.
//!
//! Each instance holds a single namespace, keyed by entry id behind a
//! `tokio::sync::RwLock`.
//! Search is an exhaustive scan, which is enough for local runs and tests.

use crate::config::Metric;
use crate::embedding::Embedding;
use crate::error::{RagError, Result};
use crate::vectordb::{IndexEntry, ScoredEntry, VectorDb};
use async_trait::async_trait;
use log::debug;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryVectorDb {
    namespace: String,
    dimension: usize,
    metric: Metric,
    entries: RwLock<HashMap<String, IndexEntry>>,
}

impl InMemoryVectorDb {
    pub fn new(namespace: impl Into<String>, dimension: usize, metric: Metric) -> Self {
        InMemoryVectorDb {
            namespace: namespace.into(),
            dimension,
            metric,
            entries: RwLock::new(HashMap::new()),
        }
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

/// Similarity under `metric`; larger is always closer.
///
/// Euclidean distance `d` is reported as `1 / (1 + d)`.
pub fn similarity(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    match metric {
        Metric::DotProduct => dot,
        Metric::Cosine => {
            let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                return 0.0;
            }
            dot / (norm_a * norm_b)
        }
        Metric::Euclidean => {
            let distance: f32 = a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt();
            1.0 / (1.0 + distance)
        }
    }
}

#[async_trait]
impl VectorDb for InMemoryVectorDb {
    async fn ensure_index(&self) -> Result<()> {
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.entries.read().await.len() as u64)
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        for entry in &entries {
            self.check_dimension(&entry.vector)?;
        }

        let mut store = self.entries.write().await;
        let count = entries.len();
        for entry in entries {
            store.insert(entry.id.clone(), entry);
        }

        debug!("Upserted {} entries into namespace {}", count, self.namespace);
        Ok(())
    }

    async fn search(&self, vector: &Embedding, top_k: usize) -> Result<Vec<ScoredEntry>> {
        self.check_dimension(vector)?;

        let store = self.entries.read().await;
        let mut scored: Vec<ScoredEntry> = store
            .values()
            .map(|entry| ScoredEntry {
                id: entry.id.clone(),
                score: similarity(self.metric, &entry.vector.values, &vector.values),
                metadata: entry.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, values: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            vector: Embedding::new(values),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let db = InMemoryVectorDb::new("ns", 2, Metric::Cosine);
        db.upsert(vec![entry("a", vec![1.0, 0.0])]).await.unwrap();
        db.upsert(vec![entry("a", vec![0.0, 1.0])]).await.unwrap();

        assert_eq!(db.count().await.unwrap(), 1);
        let results = db.search(&Embedding::new(vec![0.0, 1.0]), 1).await.unwrap();
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let db = InMemoryVectorDb::new("ns", 2, Metric::Cosine);
        db.upsert(vec![
            entry("far", vec![-1.0, 0.0]),
            entry("near", vec![1.0, 0.1]),
            entry("mid", vec![0.0, 1.0]),
        ])
        .await
        .unwrap();

        let results = db.search(&Embedding::new(vec![1.0, 0.0]), 2).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
    }

    #[tokio::test]
    async fn rejects_wrong_dimension() {
        let db = InMemoryVectorDb::new("ns", 3, Metric::Cosine);
        let err = db.upsert(vec![entry("a", vec![1.0])]).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 1 }));
    }

    #[tokio::test]
    async fn fresh_database_is_empty() {
        let db = InMemoryVectorDb::new("ns", 2, Metric::Cosine);
        db.ensure_index().await.unwrap();
        assert_eq!(db.count().await.unwrap(), 0);
        assert!(db.search(&Embedding::new(vec![1.0, 0.0]), 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ensure_index_keeps_existing_entries() {
        let db = InMemoryVectorDb::new("ns", 2, Metric::Cosine);
        db.upsert(vec![entry("a", vec![1.0, 0.0]), entry("b", vec![0.0, 1.0])])
            .await
            .unwrap();
        db.ensure_index().await.unwrap();

        assert_eq!(db.count().await.unwrap(), 2);
    }

    #[test]
    fn euclidean_similarity_decreases_with_distance() {
        let origin = [0.0, 0.0];
        let close = similarity(Metric::Euclidean, &origin, &[1.0, 0.0]);
        let far = similarity(Metric::Euclidean, &origin, &[3.0, 4.0]);
        assert!((close - 0.5).abs() < 1e-6);
        assert!((far - 1.0 / 6.0).abs() < 1e-6);
        assert_eq!(similarity(Metric::DotProduct, &[2.0, 1.0], &[3.0, 4.0]), 10.0);
    }
}

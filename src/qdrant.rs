use crate::config::{IndexConfig, Metric, QdrantConfig};
use crate::embedding::Embedding;
use crate::error::{RagError, Result};
use crate::vectordb::{IndexEntry, ScoredEntry, VectorDb};
use async_trait::async_trait;
use log::{debug, info};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, Distance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde_json::json;
use std::collections::HashMap;

const PROVIDER: &str = "qdrant";
const NAMESPACE_KEY: &str = "namespace";
const METADATA_KEY: &str = "metadata";

/// Client for one Qdrant collection; namespaces are a payload field
pub struct QdrantDb {
    client: Qdrant,
    index: IndexConfig,
    collection_name: String,
}

impl QdrantDb {
    /// Create a new Qdrant client
    pub fn new(config: QdrantConfig, index: IndexConfig) -> Result<Self> {
        let config_builder = Qdrant::from_url(&config.url);
        let config_builder = if let Some(api_key) = config.api_key {
            config_builder.api_key(api_key)
        } else {
            config_builder
        };

        let client = config_builder.build().map_err(map_err)?;

        Ok(QdrantDb {
            client,
            collection_name: get_collection_name(&index.index_name),
            index,
        })
    }

    /// Check if the collection exists
    pub async fn collection_exists(&self) -> Result<bool> {
        match self.client.collection_info(&self.collection_name).await {
            Ok(_) => Ok(true),
            Err(QdrantError::ResponseError { status })
                if status.code() == tonic::Code::NotFound =>
            {
                Ok(false)
            }
            Err(e) => Err(RagError::provider(
                PROVIDER,
                format!("Failed to check collection existence: {}", e),
            )),
        }
    }

    fn namespace_filter(&self) -> Filter {
        Filter::must([Condition::matches(
            NAMESPACE_KEY,
            self.index.namespace.clone(),
        )])
    }
}

fn map_err(e: QdrantError) -> RagError {
    RagError::provider(PROVIDER, e.to_string())
}

fn distance(metric: Metric) -> Distance {
    match metric {
        Metric::Cosine => Distance::Cosine,
        Metric::Euclidean => Distance::Euclid,
        Metric::DotProduct => Distance::Dot,
    }
}

#[async_trait]
impl VectorDb for QdrantDb {
    async fn ensure_index(&self) -> Result<()> {
        if self.collection_exists().await? {
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(self.collection_name.clone())
            .vectors_config(VectorParamsBuilder::new(
                self.index.dimension as u64,
                distance(self.index.metric),
            ))
            .replication_factor(self.index.replicas);

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| {
                RagError::provider(
                    PROVIDER,
                    format!("Failed to create collection {}: {}", self.collection_name, e),
                )
            })?;

        info!(
            "Created collection {} ({} dimensions, {})",
            self.collection_name, self.index.dimension, self.index.metric
        );
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let response = self
            .client
            .count(
                CountPointsBuilder::new(self.collection_name.clone())
                    .filter(self.namespace_filter())
                    .exact(true),
            )
            .await
            .map_err(map_err)?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let count = entries.len();
        let points = entries
            .into_iter()
            .map(|entry| -> Result<PointStruct> {
                let payload = Payload::try_from(json!({
                    NAMESPACE_KEY: self.index.namespace,
                    METADATA_KEY: entry.metadata,
                }))
                .map_err(map_err)?;

                Ok(PointStruct::new(entry.id, entry.vector.values, payload))
            })
            .collect::<Result<Vec<PointStruct>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection_name.clone(), points).wait(true))
            .await
            .map_err(|e| {
                RagError::provider(
                    PROVIDER,
                    format!(
                        "Failed to upsert points in collection {}: {}",
                        self.collection_name, e
                    ),
                )
            })?;

        debug!("Upserted {} points into {}", count, self.collection_name);
        Ok(())
    }

    async fn search(&self, vector: &Embedding, top_k: usize) -> Result<Vec<ScoredEntry>> {
        let search_response = self
            .client
            .search_points(
                SearchPointsBuilder::new(
                    self.collection_name.clone(),
                    vector.values.clone(),
                    top_k as u64,
                )
                .filter(self.namespace_filter())
                .with_payload(true),
            )
            .await
            .map_err(|e| {
                RagError::provider(
                    PROVIDER,
                    format!("Failed to search collection {}: {}", self.collection_name, e),
                )
            })?;

        let mut results: Vec<ScoredEntry> = search_response
            .result
            .into_iter()
            .map(|scored_point| {
                let id = scored_point
                    .id
                    .and_then(|pid| pid.point_id_options)
                    .map(|options| match options {
                        PointIdOptions::Uuid(s) => s,
                        PointIdOptions::Num(n) => n.to_string(),
                    })
                    .unwrap_or_default();

                let metadata = scored_point
                    .payload
                    .get(METADATA_KEY)
                    .map(struct_to_metadata)
                    .unwrap_or_default();

                ScoredEntry {
                    id,
                    score: normalize_score(self.index.metric, scored_point.score),
                    metadata,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(results)
    }
}

/// Qdrant reports euclidean matches as distances
fn normalize_score(metric: Metric, score: f32) -> f32 {
    match metric {
        Metric::Euclidean => 1.0 / (1.0 + score.max(0.0)),
        _ => score,
    }
}

fn struct_to_metadata(value: &Value) -> HashMap<String, String> {
    match &value.kind {
        Some(Kind::StructValue(s)) => s
            .fields
            .iter()
            .filter_map(|(k, v)| match &v.kind {
                Some(Kind::StringValue(s)) => Some((k.clone(), s.clone())),
                _ => None,
            })
            .collect(),
        _ => HashMap::new(),
    }
}

/// Generate a collection name from an index name
fn get_collection_name(index_name: &str) -> String {
    // Keep alphanumerics and dashes, replace the rest with underscores
    index_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::Struct;

    #[test]
    fn collection_names_are_sanitized() {
        assert_eq!(get_collection_name("test"), "test");
        assert_eq!(get_collection_name("My Index/v2"), "my_index_v2");
        assert_eq!(get_collection_name("state-of-union"), "state-of-union");
    }

    #[test]
    fn metrics_map_to_qdrant_distances() {
        assert_eq!(distance(Metric::Cosine), Distance::Cosine);
        assert_eq!(distance(Metric::Euclidean), Distance::Euclid);
        assert_eq!(distance(Metric::DotProduct), Distance::Dot);
    }

    #[test]
    fn euclidean_distance_becomes_similarity() {
        assert_eq!(normalize_score(Metric::Euclidean, 1.0), 0.5);
        assert_eq!(normalize_score(Metric::Cosine, 0.8), 0.8);
    }

    #[test]
    fn metadata_keeps_string_fields() {
        let string = |s: &str| Value {
            kind: Some(Kind::StringValue(s.to_string())),
        };
        let value = Value {
            kind: Some(Kind::StructValue(Struct {
                fields: HashMap::from([
                    ("source".to_string(), string("a.txt")),
                    ("content".to_string(), string("hello")),
                    (
                        "page".to_string(),
                        Value {
                            kind: Some(Kind::IntegerValue(3)),
                        },
                    ),
                ]),
            })),
        };

        let metadata = struct_to_metadata(&value);
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata["source"], "a.txt");
        assert_eq!(metadata["content"], "hello");
    }
}

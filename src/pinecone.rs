//! Pinecone backend over the REST control and data plane APIs.

use crate::config::{IndexConfig, Metric, PineconeConfig};
use crate::embedding::Embedding;
use crate::error::{RagError, Result};
use crate::vectordb::{IndexEntry, ScoredEntry, VectorDb};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::OnceCell;

const PROVIDER: &str = "pinecone";
const API_VERSION: &str = "2024-07";
const UPSERT_BATCH_SIZE: usize = 100;
const READY_POLL_ATTEMPTS: u32 = 60;
const READY_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Client for a single Pinecone index and namespace
pub struct PineconeDb {
    config: PineconeConfig,
    index: IndexConfig,
    client: reqwest::Client,
    host: OnceCell<String>,
}

impl PineconeDb {
    pub fn new(config: PineconeConfig, index: IndexConfig) -> Self {
        PineconeDb {
            config,
            index,
            client: reqwest::Client::new(),
            host: OnceCell::new(),
        }
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response> {
        let mut request = self
            .client
            .request(method, url)
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", API_VERSION);
        if let Some(body) = body {
            request = request.json(body);
        }

        request
            .send()
            .await
            .map_err(|e| RagError::provider(PROVIDER, format!("request failed: {}", e)))
    }

    async fn request<R: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<R> {
        let method_name = method.to_string();
        let response = self.send(method, url, body).await?;
        parse_response(&method_name, url, response).await
    }

    /// `None` when the control plane does not know the index
    async fn describe_index(&self) -> Result<Option<IndexDescription>> {
        let url = format!(
            "{}/indexes/{}",
            self.config.controller_url, self.index.index_name
        );
        let response = self.send(Method::GET, &url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse_response("GET", &url, response).await.map(Some)
    }

    async fn create_index(&self) -> Result<()> {
        let url = format!("{}/indexes", self.config.controller_url);
        let body = create_index_body(&self.index, &self.config.environment);

        info!(
            "Creating Pinecone index {} ({} dimensions, {})",
            self.index.index_name, self.index.dimension, self.index.metric
        );
        self.request::<Value>(Method::POST, &url, Some(&body)).await?;
        Ok(())
    }

    /// Describe the index, creating it first if needed, and wait until it is ready
    async fn resolve_host(&self) -> Result<String> {
        let mut description = match self.describe_index().await? {
            Some(description) => description,
            None => {
                self.create_index().await?;
                self.wait_until_ready().await?
            }
        };

        if !description.status.ready {
            description = self.wait_until_ready().await?;
        }

        if description.dimension != self.index.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.index.dimension,
                actual: description.dimension,
            });
        }

        Ok(data_plane_url(&description.host))
    }

    async fn wait_until_ready(&self) -> Result<IndexDescription> {
        for attempt in 1..=READY_POLL_ATTEMPTS {
            if let Some(description) = self.describe_index().await? {
                if description.status.ready {
                    return Ok(description);
                }
            }
            debug!(
                "Index {} not ready yet (attempt {})",
                self.index.index_name, attempt
            );
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }

        Err(RagError::provider(
            PROVIDER,
            format!("index {} did not become ready", self.index.index_name),
        ))
    }

    async fn host(&self) -> Result<&str> {
        self.host
            .get_or_try_init(|| self.resolve_host())
            .await
            .map(String::as_str)
    }

    /// Pinecone reports euclidean matches as squared distances
    fn normalize_score(&self, score: f32) -> f32 {
        match self.index.metric {
            Metric::Euclidean => 1.0 / (1.0 + score.max(0.0).sqrt()),
            _ => score,
        }
    }
}

#[async_trait]
impl VectorDb for PineconeDb {
    async fn ensure_index(&self) -> Result<()> {
        self.host().await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let url = format!("{}/describe_index_stats", self.host().await?);
        let stats: IndexStats = self
            .request(Method::POST, &url, Some(&json!({})))
            .await?;

        Ok(stats
            .namespaces
            .get(&self.index.namespace)
            .map(|ns| ns.vector_count)
            .unwrap_or(0))
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let url = format!("{}/vectors/upsert", self.host().await?);

        for batch in entries.chunks(UPSERT_BATCH_SIZE) {
            let vectors: Vec<Vector> = batch
                .iter()
                .map(|entry| Vector {
                    id: &entry.id,
                    values: &entry.vector.values,
                    metadata: &entry.metadata,
                })
                .collect();
            let body = serde_json::to_value(UpsertRequest {
                vectors,
                namespace: &self.index.namespace,
            })
            .map_err(|e| RagError::provider(PROVIDER, format!("invalid upsert body: {}", e)))?;

            let response: UpsertResponse = self
                .request(Method::POST, &url, Some(&body))
                .await?;
            debug!("Pinecone upserted {} vectors", response.upserted_count);
        }

        Ok(())
    }

    async fn search(&self, vector: &Embedding, top_k: usize) -> Result<Vec<ScoredEntry>> {
        let url = format!("{}/query", self.host().await?);
        let body = json!({
            "namespace": self.index.namespace,
            "vector": vector.values,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
        });

        let response: QueryResponse = self
            .request(Method::POST, &url, Some(&body))
            .await?;

        Ok(response
            .matches
            .into_iter()
            .map(|m| ScoredEntry {
                id: m.id,
                score: self.normalize_score(m.score),
                metadata: flatten_metadata(m.metadata),
            })
            .collect())
    }
}

async fn parse_response<R: for<'de> Deserialize<'de>>(
    method: &str,
    url: &str,
    response: Response,
) -> Result<R> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(RagError::provider(
            PROVIDER,
            format!("{} {} returned {}: {}", method, url, status, error_text),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| RagError::provider(PROVIDER, format!("invalid response: {}", e)))
}

fn create_index_body(index: &IndexConfig, environment: &str) -> Value {
    json!({
        "name": index.index_name,
        "dimension": index.dimension,
        "metric": index.metric.as_str(),
        "spec": {
            "pod": {
                "environment": environment,
                "pod_type": index.pod_type,
                "replicas": index.replicas,
                "pods": 1,
            }
        }
    })
}

fn data_plane_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", host.trim_end_matches('/'))
    }
}

/// Pinecone metadata values may be any JSON; non-strings keep their JSON text
fn flatten_metadata(metadata: HashMap<String, Value>) -> HashMap<String, String> {
    metadata
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => (key, s),
            other => (key, other.to_string()),
        })
        .collect()
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<Vector<'a>>,
    namespace: &'a str,
}

#[derive(Serialize)]
struct Vector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a HashMap<String, String>,
}

#[derive(Deserialize, Debug)]
struct IndexDescription {
    host: String,
    dimension: usize,
    status: IndexStatus,
}

#[derive(Deserialize, Debug)]
struct IndexStatus {
    ready: bool,
}

#[derive(Deserialize, Debug)]
struct IndexStats {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceStats>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: u64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: u64,
}

#[derive(Deserialize, Debug)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Deserialize, Debug)]
struct Match {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

use crate::error::{RagError, Result};
use std::env;
use std::fmt;

/// Similarity metric used by the vector index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Metric {
    #[default]
    Cosine,
    Euclidean,
    #[value(name = "dotproduct")]
    DotProduct,
}

impl Metric {
    /// Name as understood by the Pinecone API
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::DotProduct => "dotproduct",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings of the remote index, used when it has to be created
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    pub index_name: String,
    pub namespace: String,
    pub dimension: usize,
    pub replicas: u32,
    pub metric: Metric,
    pub pod_type: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            index_name: "test".to_string(),
            namespace: "test-namespace".to_string(),
            dimension: 1536,
            replicas: 1,
            metric: Metric::Cosine,
            pod_type: "p1.x1".to_string(),
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if self.index_name.is_empty() {
            return Err(RagError::Config("index name must not be empty".to_string()));
        }
        if self.dimension == 0 {
            return Err(RagError::Config(
                "index dimension must be greater than zero".to_string(),
            ));
        }
        if self.replicas == 0 {
            return Err(RagError::Config(
                "replica count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

const DEFAULT_PINECONE_CONTROLLER_URL: &str = "https://api.pinecone.io";
const DEFAULT_PINECONE_ENVIRONMENT: &str = "us-east-1-aws";

/// Credentials and endpoints for Pinecone
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    pub environment: String,
    pub controller_url: String,
}

impl PineconeConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = required_var("PINECONE_API_KEY")?;
        let environment = env::var("PINECONE_ENVIRONMENT")
            .unwrap_or_else(|_| DEFAULT_PINECONE_ENVIRONMENT.to_string());
        let controller_url = env::var("PINECONE_CONTROLLER_URL")
            .unwrap_or_else(|_| DEFAULT_PINECONE_CONTROLLER_URL.to_string());

        Ok(PineconeConfig {
            api_key,
            environment,
            controller_url,
        })
    }
}

/// Configuration for Qdrant
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
}

impl QdrantConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let url = required_var("QDRANT_URL")?;
        let api_key = env::var("QDRANT_API_KEY").ok();

        Ok(QdrantConfig { url, api_key })
    }
}

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for the OpenAI embeddings and completions APIs
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub completion_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        OpenAiConfig {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_dimension: 1536,
            completion_model: "gpt-3.5-turbo-instruct".to_string(),
            temperature: 0.7,
            max_tokens: 256,
        }
    }

    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = OpenAiConfig::new(required_var("OPENAI_API_KEY")?);
        if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }
}

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Configuration for Gemini API
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub generate_model: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        GeminiConfig {
            api_key: api_key.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            embedding_model: "models/text-embedding-004".to_string(),
            embedding_dimension: 768,
            generate_model: "models/gemini-2.0-flash".to_string(),
        }
    }

    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = GeminiConfig::new(required_var("GEMINI_API_KEY")?);
        if let Ok(base_url) = env::var("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }
}

fn required_var(name: &str) -> Result<String> {
    env::var(name).map_err(|_| RagError::Config(format!("{} not set", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_index_config_matches_example_settings() {
        let config = IndexConfig::default();
        assert_eq!(config.index_name, "test");
        assert_eq!(config.namespace, "test-namespace");
        assert_eq!(config.dimension, 1536);
        assert_eq!(config.replicas, 1);
        assert_eq!(config.metric, Metric::Cosine);
        assert_eq!(config.pod_type, "p1.x1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let config = IndexConfig {
            dimension: 0,
            ..IndexConfig::default()
        };
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn metric_names() {
        assert_eq!(Metric::DotProduct.to_string(), "dotproduct");
        assert_eq!(Metric::Euclidean.as_str(), "euclidean");
    }
}

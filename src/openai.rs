use crate::completion::CompletionClient;
use crate::config::OpenAiConfig;
use crate::embedding::{check_batch, Embedding, EmbeddingProvider};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "openai";

/// Client for the OpenAI embeddings and completions endpoints
#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: reqwest::Client,
    verbose: bool,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        OpenAiClient {
            config,
            client: reqwest::Client::new(),
            verbose: false,
        }
    }

    /// Log prompts and completions at info level
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("OpenAI request to {} failed: {}", path, e);
                RagError::provider(PROVIDER, format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!("OpenAI {} returned {}", path, status);
            return Err(RagError::provider(
                PROVIDER,
                format!("API returned {}: {}", status, detail),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| RagError::provider(PROVIDER, format!("failed to parse response: {}", e)))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Embedding {} texts with {}",
            texts.len(),
            self.config.embedding_model
        );

        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: texts,
        };
        let response: EmbeddingResponse = self.post("embeddings", &request).await?;

        // The API tags every vector with its input position
        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        let embeddings: Vec<Embedding> = data
            .into_iter()
            .map(|d| Embedding::new(d.embedding))
            .collect();

        check_batch(
            PROVIDER,
            &embeddings,
            texts.len(),
            self.config.embedding_dimension,
        )?;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dimension
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if self.verbose {
            info!("Prompt:\n{}", prompt);
        }

        let request = CompletionRequest {
            model: &self.config.completion_model,
            prompt,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let response: CompletionResponse = self.post("completions", &request).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.text.trim().to_string())
            .ok_or_else(|| RagError::provider(PROVIDER, "No response generated"))?;

        if self.verbose {
            info!("Completion:\n{}", text);
        }
        Ok(text)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_request_shape() {
        let input = vec!["hello".to_string(), "world".to_string()];
        let request = EmbeddingRequest {
            model: "text-embedding-ada-002",
            input: &input,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "text-embedding-ada-002");
        assert_eq!(value["input"][1], "world");
    }

    #[test]
    fn embedding_response_keeps_indices() {
        let body = r#"{"object":"list","data":[
            {"object":"embedding","index":1,"embedding":[0.5]},
            {"object":"embedding","index":0,"embedding":[0.25]}
        ],"model":"text-embedding-ada-002"}"#;
        let response: EmbeddingResponse = serde_json::from_str(body).unwrap();
        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        assert_eq!(data[0].embedding, vec![0.25]);
    }

    #[test]
    fn parses_completion_and_error_bodies() {
        let body = r#"{"choices":[{"text":"\n\nTo keep the peace.","index":0}]}"#;
        let response: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.choices[0].text.trim(), "To keep the peace.");

        let body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
        let error: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(error.error.message, "Rate limit reached");
    }

    #[test]
    fn defaults_match_ada_embeddings() {
        let client = OpenAiClient::new(OpenAiConfig::new("sk-test"));
        assert_eq!(client.dimension(), 1536);
        assert_eq!(client.config().embedding_model, "text-embedding-ada-002");
    }
}

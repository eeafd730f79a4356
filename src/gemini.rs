use crate::completion::CompletionClient;
use crate::config::GeminiConfig;
use crate::embedding::{check_batch, Embedding, EmbeddingProvider};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "gemini";

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
    verbose: bool,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::new();
        GeminiClient {
            config,
            client,
            verbose: false,
        }
    }

    /// Log prompts and completions at info level
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Get the client configuration
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/{}:{}?key={}",
            self.config.base_url, model, method, self.config.api_key
        )
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, url: &str, body: &B) -> Result<R> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| RagError::provider(PROVIDER, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::provider(
                PROVIDER,
                format!("API request failed: {} {}", status, error_text),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| RagError::provider(PROVIDER, format!("invalid response: {}", e)))
    }

    /// Generate text using the configured Gemini model
    pub async fn generate_text(
        &self,
        prompt: &str,
        temperature: f32,
        top_p: f32,
        top_k: i32,
        max_output_tokens: i32,
    ) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content::new_with_role(prompt, "user")],
            generation_config: GenerationConfig {
                temperature,
                top_p,
                top_k,
                max_output_tokens,
            },
        };

        let url = self.url(&self.config.generate_model, "generateContent");
        let response_data: GenerateResponse = self.post(&url, &request).await?;

        // Extract the generated text from the response
        response_data
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| RagError::provider(PROVIDER, "No response generated"))
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding {} texts with {}", texts.len(), self.config.embedding_model);

        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &self.config.embedding_model,
                    content: Content::new(text),
                })
                .collect(),
        };

        let url = self.url(&self.config.embedding_model, "batchEmbedContents");
        let response_data: BatchEmbedResponse = self.post(&url, &request).await?;

        let embeddings: Vec<Embedding> = response_data
            .embeddings
            .into_iter()
            .map(|e| Embedding::new(e.values))
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
impl CompletionClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if self.verbose {
            info!("Prompt:\n{}", prompt);
        }

        let answer = self.generate_text(prompt, 0.2, 0.8, 40, 1024).await?;

        if self.verbose {
            info!("Completion:\n{}", answer);
        }
        Ok(answer)
    }
}

// Request/response structures for the Gemini API

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Deserialize, Debug)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
}

impl<'a> Content<'a> {
    fn new(text: &'a str) -> Self {
        Content {
            parts: vec![Part { text }],
            role: None,
        }
    }

    fn new_with_role(text: &'a str, role: &'static str) -> Self {
        Content {
            parts: vec![Part { text }],
            role: Some(role),
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_embed_request_shape() {
        let texts = ["a".to_string(), "b".to_string()];
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: "models/text-embedding-004",
                    content: Content::new(text),
                })
                .collect(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "requests": [
                    {"model": "models/text-embedding-004", "content": {"parts": [{"text": "a"}]}},
                    {"model": "models/text-embedding-004", "content": {"parts": [{"text": "b"}]}},
                ]
            })
        );
    }

    #[test]
    fn generate_request_uses_camel_case_config() {
        let request = GenerateRequest {
            contents: vec![Content::new_with_role("hi", "user")],
            generation_config: GenerationConfig {
                temperature: 0.5,
                top_p: 0.5,
                top_k: 40,
                max_output_tokens: 1024,
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(value["generationConfig"]["topK"], 40);
    }

    #[test]
    fn parses_generate_response() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"NATO is..."}],"role":"model"}}]}"#;
        let response: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.candidates[0].content.parts[0].text, "NATO is...");
    }

    #[test]
    fn parses_batch_embed_response() {
        let body = r#"{"embeddings":[{"values":[0.1,0.2]},{"values":[0.3,0.4]}]}"#;
        let response: BatchEmbedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.embeddings.len(), 2);
        assert_eq!(response.embeddings[1].values, vec![0.3, 0.4]);
    }
}

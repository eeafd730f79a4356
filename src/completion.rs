use crate::error::Result;
use async_trait::async_trait;

/// Sends a rendered prompt to a language model and returns the generated text
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

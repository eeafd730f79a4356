use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the loader, the providers, the index and the prompt template
#[derive(Debug, Error)]
pub enum RagError {
    /// A directory or file could not be read
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A remote embedding, vector database or completion call failed
    #[error("{provider} error: {message}")]
    Provider { provider: String, message: String },

    /// A template placeholder had neither an input nor a default
    #[error("missing input for placeholder '{0}'")]
    MissingInput(String),

    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A vector's length differs from the index dimension
    #[error("dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl RagError {
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        RagError::Provider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RagError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

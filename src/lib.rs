pub mod completion;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod gemini;
pub mod index;
pub mod memory;
pub mod openai;
pub mod pinecone;
pub mod prompt;
pub mod qdrant;
pub mod rag;
pub mod splitter;
pub mod vectordb;

pub use error::{RagError, Result};

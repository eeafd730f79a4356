use crate::completion::CompletionClient;
use crate::document::{DirectoryLoader, Document};
use crate::error::Result;
use crate::index::{Index, SimilarityResult};
use crate::prompt::PromptTemplate;
use crate::splitter::TextSplitter;
use log::info;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_QUESTION: &str = "What is the purpose of the NATO Alliance?";

pub const DEFAULT_TEMPLATE: &str =
    "Based on the following context answer to the question.\n\nContext:\n{{context}}\n\nQuestion: {{query}}";

/// Inputs of one ingest-and-answer run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Directory scanned for documents when the index is empty
    pub dir: PathBuf,
    pub extension: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub question: String,
    pub top_k: usize,
    pub template: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            dir: PathBuf::from("."),
            extension: ".txt".to_string(),
            chunk_size: 1000,
            chunk_overlap: 20,
            question: DEFAULT_QUESTION.to_string(),
            top_k: 3,
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Result of answering a question
#[derive(Debug, Clone)]
pub struct Answer {
    pub question: String,
    pub sources: Vec<SimilarityResult>,
    pub text: String,
}

/// RAG (Retrieval-Augmented Generation) engine
pub struct RagEngine {
    index: Index,
    completion: Arc<dyn CompletionClient>,
    settings: PipelineSettings,
}

impl RagEngine {
    /// Create a new RAG engine
    pub fn new(
        index: Index,
        completion: Arc<dyn CompletionClient>,
        settings: PipelineSettings,
    ) -> Self {
        RagEngine {
            index,
            completion,
            settings,
        }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Ingest the configured directory unless the index already holds entries.
    ///
    /// Returns the number of chunks ingested.
    pub async fn ingest_if_empty(&self) -> Result<usize> {
        if !self.index.is_empty().await? {
            info!("Index already populated, skipping ingestion");
            return Ok(0);
        }

        let documents =
            DirectoryLoader::new(&self.settings.dir, self.settings.extension.as_str()).load()?;
        self.ingest(&documents).await
    }

    /// Split documents into chunks and load them into the index
    pub async fn ingest(&self, documents: &[Document]) -> Result<usize> {
        let splitter = TextSplitter::new(self.settings.chunk_size, self.settings.chunk_overlap)?;
        let chunks = splitter.split_documents(documents);
        info!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        for chunk in &chunks {
            println!("{}", chunk.content);
            println!("----------");
            println!("{:?}", chunk.metadata);
            println!("----------");
            println!();
        }

        self.index.load_from_documents(&chunks).await?;
        Ok(chunks.len())
    }

    /// Retrieve context for a question and ask the completion client
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let sources = self.index.query(question, self.settings.top_k).await?;

        for source in &sources {
            println!("Similarity: {}", source.score);
            println!("Document: {}", source.content());
            println!("Metadata: {:?}", source.metadata);
            println!("ID: {}", source.id);
            println!("----------");
        }

        let context = build_context(&sources);

        let mut prompt = PromptTemplate::new(self.settings.template.as_str()).with_inputs(
            HashMap::from([
                ("query".to_string(), question.to_string()),
                ("context".to_string(), context),
            ]),
        );
        prompt.format(&HashMap::new())?;

        let text = self.completion.complete(prompt.as_str()).await?;

        Ok(Answer {
            question: question.to_string(),
            sources,
            text,
        })
    }

    /// Ingest when empty, then answer the configured question
    pub async fn run(&self) -> Result<Answer> {
        self.ingest_if_empty().await?;
        self.answer(&self.settings.question).await
    }
}

/// Concatenate retrieved contents, each followed by a newline
pub fn build_context(sources: &[SimilarityResult]) -> String {
    sources
        .iter()
        .map(|source| format!("{}\n", source.content()))
        .collect()
}

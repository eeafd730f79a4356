use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use corpus_rag::completion::CompletionClient;
use corpus_rag::config::{
    GeminiConfig, IndexConfig, Metric, OpenAiConfig, PineconeConfig, QdrantConfig,
};
use corpus_rag::embedding::EmbeddingProvider;
use corpus_rag::gemini::GeminiClient;
use corpus_rag::index::Index;
use corpus_rag::memory::InMemoryVectorDb;
use corpus_rag::openai::OpenAiClient;
use corpus_rag::pinecone::PineconeDb;
use corpus_rag::qdrant::QdrantDb;
use corpus_rag::rag::{PipelineSettings, RagEngine, DEFAULT_QUESTION, DEFAULT_TEMPLATE};
use corpus_rag::vectordb::VectorDb;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VectorDbKind {
    Pinecone,
    Qdrant,
    Memory,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderKind {
    Openai,
    Gemini,
}

/// Answer a question over a directory of text files with retrieval-augmented generation
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory scanned for documents when the index is empty
    #[arg(long, env = "RAG_DIR", default_value = ".")]
    dir: PathBuf,

    /// File name suffix of the documents to load
    #[arg(long, env = "RAG_EXTENSION", default_value = ".txt")]
    extension: String,

    #[arg(long, env = "RAG_QUESTION", default_value = DEFAULT_QUESTION)]
    question: String,

    /// Number of chunks retrieved as context
    #[arg(long, env = "RAG_TOP_K", default_value_t = 3)]
    top_k: usize,

    #[arg(long, env = "RAG_CHUNK_SIZE", default_value_t = 1000)]
    chunk_size: usize,

    #[arg(long, env = "RAG_CHUNK_OVERLAP", default_value_t = 20)]
    chunk_overlap: usize,

    #[arg(long, env = "RAG_VECTOR_DB", value_enum, default_value_t = VectorDbKind::Pinecone)]
    vector_db: VectorDbKind,

    /// Embedding and completion provider
    #[arg(long, env = "RAG_PROVIDER", value_enum, default_value_t = ProviderKind::Openai)]
    provider: ProviderKind,

    #[arg(long, env = "RAG_INDEX_NAME", default_value = "test")]
    index_name: String,

    #[arg(long, env = "RAG_NAMESPACE", default_value = "test-namespace")]
    namespace: String,

    /// Vector dimension; defaults to the provider's embedding dimension
    #[arg(long, env = "RAG_DIMENSION")]
    dimension: Option<usize>,

    #[arg(long, env = "RAG_REPLICAS", default_value_t = 1)]
    replicas: u32,

    #[arg(long, env = "RAG_METRIC", value_enum, default_value_t = Metric::Cosine)]
    metric: Metric,

    #[arg(long, env = "RAG_POD_TYPE", default_value = "p1.x1")]
    pod_type: String,

    /// Log the prompt and the completion
    #[arg(long, env = "RAG_VERBOSE", default_value_t = true, action = clap::ArgAction::Set)]
    verbose: bool,
}

type Providers = (Arc<dyn EmbeddingProvider>, Arc<dyn CompletionClient>);

fn build_providers(kind: ProviderKind, verbose: bool) -> Result<Providers> {
    match kind {
        ProviderKind::Openai => {
            let config = OpenAiConfig::from_env().context("Missing OPENAI_API_KEY")?;
            let client = Arc::new(OpenAiClient::new(config).with_verbose(verbose));
            let embedder: Arc<dyn EmbeddingProvider> = client.clone();
            let completion: Arc<dyn CompletionClient> = client;
            Ok((embedder, completion))
        }
        ProviderKind::Gemini => {
            let config = GeminiConfig::from_env().context("Missing GEMINI_API_KEY")?;
            let client = Arc::new(GeminiClient::new(config).with_verbose(verbose));
            let embedder: Arc<dyn EmbeddingProvider> = client.clone();
            let completion: Arc<dyn CompletionClient> = client;
            Ok((embedder, completion))
        }
    }
}

fn build_vector_db(kind: VectorDbKind, index: IndexConfig) -> Result<Arc<dyn VectorDb>> {
    let db: Arc<dyn VectorDb> = match kind {
        VectorDbKind::Pinecone => {
            let config = PineconeConfig::from_env().context("Missing PINECONE_API_KEY")?;
            Arc::new(PineconeDb::new(config, index))
        }
        VectorDbKind::Qdrant => {
            let config = QdrantConfig::from_env().context("Missing QDRANT_URL")?;
            Arc::new(QdrantDb::new(config, index).context("Failed to initialize Qdrant client")?)
        }
        VectorDbKind::Memory => Arc::new(InMemoryVectorDb::new(
            index.namespace,
            index.dimension,
            index.metric,
        )),
    };
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let (embedder, completion) = build_providers(args.provider, args.verbose)?;

    let index_config = IndexConfig {
        index_name: args.index_name,
        namespace: args.namespace,
        dimension: args.dimension.unwrap_or_else(|| embedder.dimension()),
        replicas: args.replicas,
        metric: args.metric,
        pod_type: args.pod_type,
    };
    index_config.validate()?;
    info!(
        "Using index {} / {} ({} dimensions, {})",
        index_config.index_name, index_config.namespace, index_config.dimension, index_config.metric
    );

    let dimension = index_config.dimension;
    let db = build_vector_db(args.vector_db, index_config)?;
    let index = Index::new(db, embedder, dimension)
        .context("Embedding provider does not match the index dimension")?
        .with_include_contents(true);

    let settings = PipelineSettings {
        dir: args.dir,
        extension: args.extension,
        chunk_size: args.chunk_size,
        chunk_overlap: args.chunk_overlap,
        question: args.question,
        top_k: args.top_k,
        template: DEFAULT_TEMPLATE.to_string(),
    };

    let rag_engine = RagEngine::new(index, completion, settings);

    let answer = rag_engine.run().await.context("RAG pipeline failed")?;

    println!("\n{}", answer.text);

    Ok(())
}
